//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Intake keys become wizard actions; the
//! wizard decides whether they are allowed.

use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use reception_core::export::ExportKind;
use reception_core::models::Category;
use reception_core::router::View;
use reception_core::wizard::{Action, CountEntry, Step, StrengthStage};

use crate::app::{AdminTab, App, AppState, PersonField, MAIN_MENU_EXTRAS, MAX_MESSAGE_LENGTH, MAX_PASSWORD_LENGTH};

/// Move a list cursor up, stopping at the top.
fn cursor_up(cursor: &mut usize) {
    *cursor = cursor.saturating_sub(1);
}

/// Move a list cursor down, stopping at the last of `len` items.
fn cursor_down(cursor: &mut usize, len: usize) {
    if *cursor + 1 < len {
        *cursor += 1;
    }
}

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    app.router.touch(Instant::now());

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    // Handle delete confirmation
    if let AppState::ConfirmingDelete(record) = app.state.clone() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.state = AppState::Normal;
                app.delete_record(record);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    match app.view() {
        View::Main => handle_main_input(app, key),
        View::Intake(_) => handle_intake_input(app, key),
        View::Members => handle_members_input(app, key),
        View::Completion(_) => app.go(View::Main),
        View::AdminLogin => handle_password_input(app, key, View::Main),
        View::AdminReset => handle_password_input(app, key, View::Admin),
        View::Admin => handle_admin_input(app, key),
    }

    Ok(false)
}

fn main_menu_len() -> usize {
    Category::ALL.len() + MAIN_MENU_EXTRAS.len()
}

fn open_main_entry(app: &mut App, index: usize) {
    let categories = Category::ALL.len();
    if let Some(category) = Category::ALL.get(index) {
        app.start_intake(*category);
    } else if index == categories {
        app.go(View::Members);
    } else if index == categories + 1 {
        app.go(View::AdminLogin);
    }
}

fn handle_main_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => cursor_up(&mut app.main_selection),
        KeyCode::Down | KeyCode::Char('j') => cursor_down(&mut app.main_selection, main_menu_len()),
        KeyCode::Enter => {
            let index = app.main_selection;
            open_main_entry(app, index);
        }
        KeyCode::Char(c) if c.is_ascii_digit() => {
            let index = c.to_digit(10).unwrap_or(0) as usize;
            if (1..=main_menu_len()).contains(&index) {
                app.main_selection = index - 1;
                open_main_entry(app, index - 1);
            }
        }
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        _ => {}
    }
}

fn handle_intake_input(app: &mut App, key: KeyEvent) {
    let Some(step) = app.wizard.as_ref().map(|w| w.step().clone()) else {
        app.go(View::Main);
        return;
    };

    if key.code == KeyCode::Esc {
        app.apply_wizard(Action::Back);
        return;
    }

    match step {
        Step::Count(CountEntry::QuickPick) => {
            let quick = app.catalog.quick_counts.clone();
            match key.code {
                KeyCode::Up | KeyCode::Left => cursor_up(&mut app.intake_cursor),
                KeyCode::Down | KeyCode::Right => cursor_down(&mut app.intake_cursor, quick.len() + 1),
                KeyCode::Enter => match quick.get(app.intake_cursor) {
                    Some(n) => app.apply_wizard(Action::PickCount(*n)),
                    None => app.apply_wizard(Action::OpenKeypad),
                },
                KeyCode::Char(c) => {
                    if let Some(n) = c.to_digit(10).filter(|n| quick.contains(n)) {
                        app.apply_wizard(Action::PickCount(n));
                    }
                }
                _ => {}
            }
        }
        Step::Count(CountEntry::Keypad(_)) => match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() => app.apply_wizard(Action::Digit(c)),
            KeyCode::Backspace => app.apply_wizard(Action::Backspace),
            KeyCode::Delete => app.apply_wizard(Action::Clear),
            KeyCode::Enter => app.apply_wizard(Action::ConfirmCount),
            _ => {}
        },
        Step::ExtraQuestion => match key.code {
            KeyCode::Up | KeyCode::Left => cursor_up(&mut app.intake_cursor),
            KeyCode::Down | KeyCode::Right => cursor_down(&mut app.intake_cursor, 2),
            KeyCode::Char('y') | KeyCode::Char('Y') => app.apply_wizard(Action::Answer(true)),
            KeyCode::Char('n') | KeyCode::Char('N') => app.apply_wizard(Action::Answer(false)),
            KeyCode::Enter => app.apply_wizard(Action::Answer(app.intake_cursor == 0)),
            _ => {}
        },
        Step::Person { .. } => handle_person_input(app, key),
        Step::Strength(StrengthStage::Coarse) => {
            let len = app.catalog.strength_tiers.len();
            match key.code {
                KeyCode::Up => cursor_up(&mut app.intake_cursor),
                KeyCode::Down => cursor_down(&mut app.intake_cursor, len),
                KeyCode::Enter => app.apply_wizard(Action::ChooseTier(app.intake_cursor)),
                _ => {}
            }
        }
        Step::Strength(StrengthStage::Fine { tier }) => {
            let len = app.catalog.tier(tier).map(|t| t.ranks.len()).unwrap_or(0);
            match key.code {
                KeyCode::Up => cursor_up(&mut app.intake_cursor),
                KeyCode::Down => cursor_down(&mut app.intake_cursor, len),
                KeyCode::Enter => app.apply_wizard(Action::ChooseRank(app.intake_cursor)),
                _ => {}
            }
        }
        Step::Confirm => {
            let people = app.wizard.as_ref().map(|w| w.draft().people.len()).unwrap_or(0);
            match key.code {
                KeyCode::Char(' ') => app.apply_wizard(Action::ToggleConsent),
                KeyCode::Enter => app.submit_intake(),
                KeyCode::Up => cursor_up(&mut app.intake_cursor),
                KeyCode::Down => cursor_down(&mut app.intake_cursor, people),
                KeyCode::Char('e') if people > 0 => app.apply_wizard(Action::Edit(app.intake_cursor)),
                _ => {}
            }
        }
        // Keys are ignored until the write finishes
        Step::Submitted => {}
    }
}

fn handle_person_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::BackTab => app.person_field = app.person_field.prev(),
        KeyCode::Down | KeyCode::Tab => app.person_field = app.person_field.next(),
        KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
            let step = |cursor: &mut usize, len: usize| match key.code {
                KeyCode::Left => cursor_up(cursor),
                KeyCode::Right => cursor_down(cursor, len),
                _ => {}
            };
            match app.person_field {
                PersonField::Grade => {
                    step(&mut app.grade_cursor, app.catalog.grades.len());
                    app.apply_wizard(Action::SelectGrade(app.grade_cursor));
                }
                PersonField::Class => {
                    step(&mut app.class_cursor, app.catalog.classes.len());
                    app.apply_wizard(Action::SelectClass(app.class_cursor));
                }
                PersonField::StudentId => {}
            }
        }
        KeyCode::Char(c) if c.is_ascii_digit() => {
            app.person_field = PersonField::StudentId;
            app.apply_wizard(Action::Digit(c));
        }
        KeyCode::Backspace => app.apply_wizard(Action::Backspace),
        KeyCode::Delete => app.apply_wizard(Action::Clear),
        KeyCode::Enter => app.apply_wizard(Action::NextPerson),
        _ => {}
    }
}

fn handle_members_input(app: &mut App, key: KeyEvent) {
    let len = app.catalog.members.len();
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => cursor_up(&mut app.member_selection),
        KeyCode::Down | KeyCode::Char('j') => cursor_down(&mut app.member_selection, len),
        KeyCode::Home => app.member_selection = 0,
        KeyCode::End => app.member_selection = len.saturating_sub(1),
        KeyCode::Enter | KeyCode::Char(' ') => app.toggle_selected_member(),
        KeyCode::Esc => app.go(View::Main),
        _ => {}
    }
}

/// Shared by the login and reset screens.
fn handle_password_input(app: &mut App, key: KeyEvent, back: View) {
    match key.code {
        KeyCode::Esc => {
            app.password_input.clear();
            app.go(back);
        }
        KeyCode::Enter => {
            if app.view() == View::AdminLogin {
                app.submit_login();
            } else {
                app.submit_reset();
            }
        }
        KeyCode::Backspace => {
            app.password_input.pop();
        }
        KeyCode::Char(c) if app.password_input.chars().count() < MAX_PASSWORD_LENGTH => {
            app.password_input.push(c);
        }
        _ => {}
    }
}

fn handle_admin_input(app: &mut App, key: KeyEvent) {
    if app.message_editor.is_some() {
        handle_editor_input(app, key);
        return;
    }

    let rows = app.admin_row_count();
    match key.code {
        KeyCode::Right | KeyCode::Tab => {
            app.admin_tab = app.admin_tab.next();
            app.admin_selection = 0;
        }
        KeyCode::Left | KeyCode::BackTab => {
            app.admin_tab = app.admin_tab.prev();
            app.admin_selection = 0;
        }
        KeyCode::Up | KeyCode::Char('k') => cursor_up(&mut app.admin_selection),
        KeyCode::Down | KeyCode::Char('j') => cursor_down(&mut app.admin_selection, rows),
        KeyCode::Char('d') => {
            if matches!(app.admin_tab, AdminTab::Visitors(_)) {
                app.request_delete_selected();
            }
        }
        KeyCode::Char('x') => match app.admin_tab {
            AdminTab::Visitors(category) => app.export(ExportKind::Category(category)),
            AdminTab::MemberLog => app.export(ExportKind::MemberLog),
            AdminTab::Summary | AdminTab::Messages => app.export(ExportKind::Bundle),
        },
        KeyCode::Char('z') => app.export(ExportKind::Bundle),
        KeyCode::Enter => {
            if app.admin_tab == AdminTab::Messages {
                app.start_message_edit();
            }
        }
        KeyCode::Char('u') => app.refresh(),
        KeyCode::Char('r') => app.go(View::AdminReset),
        KeyCode::Esc | KeyCode::Char('l') => app.logout(),
        _ => {}
    }
}

fn handle_editor_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.message_editor = None,
        KeyCode::Enter => app.save_message_edit(),
        KeyCode::Backspace => {
            if let Some(editor) = app.message_editor.as_mut() {
                editor.text.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(editor) = app.message_editor.as_mut() {
                if editor.text.chars().count() < MAX_MESSAGE_LENGTH {
                    editor.text.push(c);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crossterm::event::KeyModifiers;
    use reception_core::config::{Backend, Config};
    use reception_core::store::{MemoryStore, RecordStore};

    fn test_app() -> (App, Arc<MemoryStore>) {
        let config = Config {
            submit_delay_ms: 0,
            backend: Backend::Memory,
            ..Config::default()
        };
        let store = Arc::new(MemoryStore::new());
        (App::with_store(config, store.clone()), store)
    }

    async fn press(app: &mut App, code: KeyCode) -> bool {
        handle_input(app, KeyEvent::new(code, KeyModifiers::NONE))
            .await
            .expect("input")
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c)).await;
        }
    }

    async fn settle(app: &mut App, done: impl Fn(&App) -> bool) {
        for _ in 0..200 {
            app.check_background_tasks();
            if done(app) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("background work did not settle");
    }

    #[tokio::test]
    async fn test_student_flow_by_keyboard() {
        let (mut app, store) = test_app();

        // 在校生 is the second menu entry
        press(&mut app, KeyCode::Char('2')).await;
        assert_eq!(app.view(), View::Intake(Category::Student));

        press(&mut app, KeyCode::Char('2')).await;
        for id in ['4', '5'] {
            press(&mut app, KeyCode::Char(' ')).await; // grade under cursor
            press(&mut app, KeyCode::Down).await;
            press(&mut app, KeyCode::Right).await; // class B
            press(&mut app, KeyCode::Char(id)).await;
            press(&mut app, KeyCode::Enter).await;
        }

        // 段位 -> 初段
        press(&mut app, KeyCode::Down).await;
        press(&mut app, KeyCode::Down).await;
        press(&mut app, KeyCode::Enter).await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.wizard.as_ref().map(|w| w.step().clone()), Some(Step::Confirm));

        press(&mut app, KeyCode::Enter).await;
        assert!(app.notifier.current(Instant::now()).is_some());
        press(&mut app, KeyCode::Char(' ')).await;
        press(&mut app, KeyCode::Enter).await;

        settle(&mut app, |a| a.view() == View::Completion(Category::Student)).await;
        let snapshot = store.load().await.expect("load");
        let students = &snapshot.visitors.students;
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].class, "B");
        assert_eq!(students[1].student_id, "5");
        assert_eq!(students[0].shogi_strength, "初段");

        press(&mut app, KeyCode::Char('x')).await;
        assert_eq!(app.view(), View::Main);
    }

    #[tokio::test]
    async fn test_person_requires_grade_first() {
        let (mut app, _store) = test_app();
        app.start_intake(Category::Student);
        press(&mut app, KeyCode::Char('1')).await;
        press(&mut app, KeyCode::Char('7')).await;
        press(&mut app, KeyCode::Enter).await;

        let note = app.notifier.current(Instant::now()).map(|n| n.text.clone());
        assert_eq!(note.as_deref(), Some("学年を選択してください。"));
        assert!(matches!(
            app.wizard.as_ref().map(|w| w.step().clone()),
            Some(Step::Person { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_custom_count_keypad() {
        let (mut app, _store) = test_app();
        app.start_intake(Category::External);
        let other = app.catalog.quick_counts.len();
        for _ in 0..other {
            press(&mut app, KeyCode::Down).await;
        }
        press(&mut app, KeyCode::Enter).await;
        type_text(&mut app, "120").await;
        press(&mut app, KeyCode::Backspace).await;
        press(&mut app, KeyCode::Enter).await;

        let wizard = app.wizard.as_ref().expect("wizard");
        assert_eq!(wizard.draft().count, Some(12));
        assert_eq!(wizard.step(), &Step::Strength(StrengthStage::Coarse));
    }

    #[tokio::test]
    async fn test_parent_extra_question() {
        let (mut app, _store) = test_app();
        app.start_intake(Category::Parent);
        press(&mut app, KeyCode::Char('2')).await;
        press(&mut app, KeyCode::Char('n')).await;
        let wizard = app.wizard.as_ref().expect("wizard");
        assert_eq!(wizard.draft().extra_answer, Some(false));
    }

    #[tokio::test]
    async fn test_admin_login_and_delete() {
        let (mut app, store) = test_app();
        store
            .append(reception_core::models::VisitorRecord::External(
                reception_core::models::GroupVisit {
                    count: 4,
                    shogi_strength: "特にない".to_string(),
                    timestamp: "2024-11-02T01:00:00.000Z".to_string(),
                },
            ))
            .await
            .expect("append");

        app.main_selection = Category::ALL.len() + 1;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.view(), View::AdminLogin);
        type_text(&mut app, "shogi").await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.view(), View::Admin);
        settle(&mut app, |a| a.snapshot.visitors.external.len() == 1).await;

        press(&mut app, KeyCode::Right).await;
        assert_eq!(app.admin_tab, AdminTab::Visitors(Category::External));
        press(&mut app, KeyCode::Char('d')).await;
        assert!(matches!(app.state, AppState::ConfirmingDelete(_)));
        press(&mut app, KeyCode::Char('n')).await;
        assert_eq!(app.state, AppState::Normal);

        press(&mut app, KeyCode::Char('d')).await;
        press(&mut app, KeyCode::Char('y')).await;
        settle(&mut app, |a| a.snapshot.visitors.external.is_empty()).await;
        assert!(store.load().await.expect("load").visitors.is_empty());

        press(&mut app, KeyCode::Esc).await;
        assert_eq!(app.view(), View::Main);
        assert!(!app.admin.is_authenticated());
    }

    #[tokio::test]
    async fn test_message_edit() {
        let (mut app, store) = test_app();
        app.go(View::AdminLogin);
        type_text(&mut app, "shogi").await;
        press(&mut app, KeyCode::Enter).await;

        press(&mut app, KeyCode::BackTab).await;
        assert_eq!(app.admin_tab, AdminTab::Messages);
        press(&mut app, KeyCode::Enter).await;
        let editor = app.message_editor.clone().expect("editor");
        assert_eq!(editor.category, Category::ALL[0]);

        app.message_editor = Some(crate::app::MessageEditor {
            category: editor.category,
            text: String::new(),
        });
        type_text(&mut app, "ようこそ").await;
        press(&mut app, KeyCode::Enter).await;
        settle(&mut app, |a| a.snapshot.messages.is_customized(Category::ALL[0])).await;

        let snapshot = store.load().await.expect("load");
        assert_eq!(snapshot.messages.message_for(Category::ALL[0]), "ようこそ");
    }

    #[tokio::test]
    async fn test_quit_needs_confirmation() {
        let (mut app, _store) = test_app();
        assert!(!press(&mut app, KeyCode::Char('q')).await);
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!press(&mut app, KeyCode::Esc).await);
        assert_eq!(app.state, AppState::Normal);
        press(&mut app, KeyCode::Char('q')).await;
        assert!(press(&mut app, KeyCode::Char('y')).await);
    }

    #[tokio::test]
    async fn test_members_escape_returns_to_main() {
        let (mut app, _store) = test_app();
        app.main_selection = Category::ALL.len();
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.view(), View::Members);
        press(&mut app, KeyCode::Down).await;
        assert_eq!(app.member_selection, 1);
        press(&mut app, KeyCode::Esc).await;
        assert_eq!(app.view(), View::Main);
    }
}

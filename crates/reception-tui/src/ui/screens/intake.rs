//! Visitor intake screens, one layout per wizard step.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use reception_core::models::Category;
use reception_core::wizard::{CountEntry, Keypad, Step, StrengthStage, Wizard};

use crate::app::{App, PersonField};
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(wizard) = app.wizard.as_ref() else {
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(Span::styled(
            format!(" {} ", wizard.category().label()),
            styles::title_style(),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(inner);

    let prompt = Paragraph::new(Line::from(Span::styled(
        prompt_text(wizard),
        styles::highlight_style(),
    )))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(prompt, rows[0]);

    let lines = match wizard.step() {
        Step::Count(CountEntry::QuickPick) => count_choices(app, wizard),
        Step::Count(CountEntry::Keypad(keypad)) => keypad_lines(keypad, "名"),
        Step::ExtraQuestion => choice_lines(&["はい", "いいえ"], app.intake_cursor),
        Step::Person { .. } => person_lines(app, wizard),
        Step::Strength(StrengthStage::Coarse) => {
            let labels: Vec<&str> = wizard
                .catalog()
                .strength_tiers
                .iter()
                .map(|t| t.label.as_str())
                .collect();
            choice_lines(&labels, app.intake_cursor)
        }
        Step::Strength(StrengthStage::Fine { tier }) => {
            let labels: Vec<&str> = wizard
                .catalog()
                .tier(*tier)
                .map(|t| t.ranks.iter().map(String::as_str).collect())
                .unwrap_or_default();
            choice_lines(&labels, app.intake_cursor)
        }
        Step::Confirm => confirm_lines(app, wizard),
        Step::Submitted => vec![
            Line::from(""),
            Line::from(Span::styled("送信中です...", styles::muted_style())),
        ],
    };

    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        rows[1],
    );
}

fn prompt_text(wizard: &Wizard) -> String {
    match wizard.step() {
        Step::Count(_) => "何名でご来場ですか？".to_string(),
        Step::ExtraQuestion => wizard
            .category()
            .extra_question()
            .map(|q| q.prompt().to_string())
            .unwrap_or_default(),
        Step::Person { index, editing } => {
            let total = wizard.draft().people.len();
            if *editing {
                format!("{}人目の情報を修正してください", index + 1)
            } else {
                format!("{}人目 / {}人 の学年・クラス・出席番号を入力してください", index + 1, total)
            }
        }
        Step::Strength(StrengthStage::Coarse) => "棋力を教えてください".to_string(),
        Step::Strength(StrengthStage::Fine { .. }) => "もう少し詳しく教えてください".to_string(),
        Step::Confirm => "内容をご確認ください".to_string(),
        Step::Submitted => "受付中".to_string(),
    }
}

fn choice_lines(labels: &[&str], cursor: usize) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from("")];
    for (i, label) in labels.iter().enumerate() {
        let selected = i == cursor;
        let marker = if selected { "▶ " } else { "  " };
        lines.push(Line::from(Span::styled(
            format!("{}{}", marker, label),
            styles::choice_style(selected),
        )));
    }
    lines
}

fn count_choices(app: &App, wizard: &Wizard) -> Vec<Line<'static>> {
    let mut labels: Vec<String> = wizard
        .catalog()
        .quick_counts
        .iter()
        .map(|n| format!("{}名", n))
        .collect();
    labels.push("それ以上 (数字で入力)".to_string());
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    choice_lines(&refs, app.intake_cursor)
}

fn keypad_lines(keypad: &Keypad, unit: &str) -> Vec<Line<'static>> {
    let shown = if keypad.is_empty() { "_" } else { keypad.value() };
    vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(format!("[ {} ]", shown), styles::selected_style()),
            Span::styled(format!(" {}", unit), styles::list_item_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "数字キーで入力 / Backspace: 1文字消す / Delete: クリア / Enter: 決定",
            styles::muted_style(),
        )),
    ]
}

/// One row of options with the saved value marked and the cursor shown when focused.
fn option_row(
    title: &str,
    options: &[String],
    chosen: Option<&String>,
    cursor: usize,
    focused: bool,
) -> Line<'static> {
    let mut spans = vec![Span::styled(format!("{:<6}", title), styles::tab_style(focused))];
    for (i, option) in options.iter().enumerate() {
        let is_chosen = chosen == Some(option);
        let style = if focused && i == cursor {
            styles::selected_style().fg(styles::ACCENT)
        } else if is_chosen {
            styles::success_style()
        } else {
            styles::muted_style()
        };
        let text = if is_chosen {
            format!("[{}]", option)
        } else {
            format!(" {} ", option)
        };
        spans.push(Span::styled(text, style));
    }
    Line::from(spans)
}

fn person_lines(app: &App, wizard: &Wizard) -> Vec<Line<'static>> {
    let catalog = wizard.catalog();
    let current = &wizard.draft().current;
    let id = if current.student_id.is_empty() {
        "__".to_string()
    } else {
        current.student_id.value().to_string()
    };

    vec![
        Line::from(""),
        option_row(
            "学年",
            &catalog.grades,
            current.grade.as_ref(),
            app.grade_cursor,
            app.person_field == PersonField::Grade,
        ),
        Line::from(""),
        option_row(
            "クラス",
            &catalog.classes,
            current.class.as_ref(),
            app.class_cursor,
            app.person_field == PersonField::Class,
        ),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format!("{:<6}", "番号"),
                styles::tab_style(app.person_field == PersonField::StudentId),
            ),
            Span::styled(format!("[ {} ]", id), styles::selected_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "↑↓: 項目  ←→/Space: 選択  数字: 出席番号  Enter: 次へ",
            styles::muted_style(),
        )),
    ]
}

fn confirm_lines(app: &App, wizard: &Wizard) -> Vec<Line<'static>> {
    let draft = wizard.draft();
    let category = wizard.category();
    let mut lines = vec![Line::from("")];

    lines.push(Line::from(vec![
        Span::styled("人数: ", styles::muted_style()),
        Span::styled(
            format!("{}名", draft.count.unwrap_or(0)),
            styles::list_item_style(),
        ),
    ]));

    if category == Category::Student {
        for (i, person) in draft.people.iter().enumerate() {
            let text = match person {
                Some(p) => format!("{}人目: {} {}組 {}番", i + 1, p.grade, p.class, p.student_id),
                None => format!("{}人目: 未入力", i + 1),
            };
            lines.push(Line::from(Span::styled(
                text,
                styles::choice_style(i == app.intake_cursor),
            )));
        }
    }

    if let (Some(question), Some(answer)) = (category.extra_question(), draft.extra_answer) {
        lines.push(Line::from(vec![
            Span::styled(format!("{}: ", question.column_label()), styles::muted_style()),
            Span::styled(
                if answer { "はい" } else { "いいえ" },
                styles::list_item_style(),
            ),
        ]));
    }

    lines.push(Line::from(vec![
        Span::styled("棋力: ", styles::muted_style()),
        Span::styled(
            draft.strength.clone().unwrap_or_default(),
            styles::list_item_style(),
        ),
    ]));

    lines.push(Line::from(""));
    let check = if draft.consent { "[x]" } else { "[ ]" };
    lines.push(Line::from(vec![
        Span::styled(format!("{} ", check), styles::help_key_style()),
        Span::styled(
            "入力内容を受付記録として利用することに同意します",
            styles::list_item_style(),
        ),
    ]));
    lines.push(Line::from(""));

    let submit_style = if wizard.can_submit() {
        styles::selected_style().fg(styles::SECONDARY)
    } else {
        styles::muted_style()
    };
    lines.push(Line::from(Span::styled("  送信する (Enter)  ", submit_style)));
    lines.push(Line::from(""));

    let hint = if category == Category::Student {
        "Space: 同意  e: 選択した人を修正  Enter: 送信  Esc: 戻る"
    } else {
        "Space: 同意  Enter: 送信  Esc: 戻る"
    };
    lines.push(Line::from(Span::styled(hint, styles::muted_style())));
    lines
}

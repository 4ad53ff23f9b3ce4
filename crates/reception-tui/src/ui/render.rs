use std::time::Instant;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use reception_core::notify::Level;
use reception_core::router::View;

use crate::app::{App, AppState};

use super::screens::{admin, intake, members, menu};
use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_main_content(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    match &app.state {
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::ConfirmingDelete(record) => render_delete_overlay(frame, &record.describe()),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn view_title(view: View) -> String {
    match view {
        View::Main => "ようこそ".to_string(),
        View::Intake(category) | View::Completion(category) => format!("{} 受付", category.label()),
        View::Members => "部員 出退勤".to_string(),
        View::AdminLogin => "管理者ログイン".to_string(),
        View::Admin => "管理".to_string(),
        View::AdminReset => "全データリセット".to_string(),
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(inner);

    let title = Line::from(vec![
        Span::styled("  将棋部 受付", styles::title_style()),
        Span::styled("  |  ", styles::muted_style()),
        Span::styled(view_title(app.view()), styles::highlight_style()),
    ]);
    frame.render_widget(Paragraph::new(title), halves[0]);

    let right = format!("{}名来場 / 保存先: {}  ", app.summary.total_visitors, app.store_name());
    frame.render_widget(
        Paragraph::new(Span::styled(right, styles::muted_style())).alignment(Alignment::Right),
        halves[1],
    );
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.view() {
        View::Main => menu::render_main(frame, app, area),
        View::Intake(_) => intake::render(frame, app, area),
        View::Members => members::render(frame, app, area),
        View::Completion(category) => menu::render_completion(frame, app, category, area),
        View::AdminLogin => admin::render_login(frame, app, area),
        View::Admin => admin::render(frame, app, area),
        View::AdminReset => admin::render_reset(frame, app, area),
    }
}

/// Key hints for the status bar, per view.
fn shortcuts(app: &App) -> &'static str {
    match app.view() {
        View::Main => "[↑↓] 選択  [Enter] 決定  [q] 終了",
        View::Intake(_) => "[Enter] 決定  [Esc] 戻る",
        View::Members => "[↑↓] 選択  [Enter] 出勤/退勤  [Esc] 戻る",
        View::Completion(_) => "[任意のキー] トップへ",
        View::AdminLogin | View::AdminReset => "[Enter] 確定  [Esc] 戻る",
        View::Admin if app.message_editor.is_some() => "[Enter] 保存  [Esc] 取消",
        View::Admin => "[←→] タブ  [d] 削除  [x] CSV  [z] ZIP  [r] リセット  [Esc] ログアウト",
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let left = match app.notifier.current(Instant::now()) {
        Some(note) => {
            let style = match note.level {
                Level::Success => styles::success_style(),
                Level::Error => styles::error_style(),
            };
            Span::styled(format!(" {} ", note.text), style)
        }
        None => Span::styled(
            format!(" 受付 {}件 / 出勤中 {}名 ", app.summary.total_receptions, app.summary.members_checked_in),
            styles::muted_style(),
        ),
    };

    frame.render_widget(
        Paragraph::new(Line::from(left))
            .style(styles::status_bar_style())
            .wrap(Wrap { trim: true }),
        halves[0],
    );
    frame.render_widget(
        Paragraph::new(Span::styled(format!("{} ", shortcuts(app)), styles::muted_style()))
            .style(styles::status_bar_style())
            .alignment(Alignment::Right),
        halves[1],
    );
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_confirm_overlay(frame: &mut Frame, question: Line<'static>, detail: Option<String>) {
    let area = centered_rect_fixed(56, if detail.is_some() { 9 } else { 7 }, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from(""), question];
    if let Some(detail) = detail {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(detail, styles::list_item_style())));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("[Y]", styles::help_key_style()),
        Span::styled(" はい   ", styles::help_desc_style()),
        Span::styled("[N]", styles::help_key_style()),
        Span::styled(" いいえ", styles::help_desc_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn render_quit_overlay(frame: &mut Frame) {
    render_confirm_overlay(
        frame,
        Line::from(Span::styled("受付アプリを終了しますか？", styles::highlight_style())),
        None,
    );
}

fn render_delete_overlay(frame: &mut Frame, description: &str) {
    render_confirm_overlay(
        frame,
        Line::from(Span::styled("この記録を削除しますか？", styles::error_style())),
        Some(description.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fixed_clamps_to_area() {
        let outer = Rect::new(0, 0, 40, 10);
        assert_eq!(centered_rect_fixed(20, 4, outer), Rect::new(10, 3, 20, 4));
        assert_eq!(centered_rect_fixed(80, 20, outer), Rect::new(0, 0, 40, 10));
    }
}

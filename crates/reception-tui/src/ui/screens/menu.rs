//! Main menu and the completion screen.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use reception_core::models::Category;

use crate::app::{App, MAIN_MENU_EXTRAS};
use crate::ui::render::centered_rect_fixed;
use crate::ui::styles;

/// Menu labels in display order: visitor categories, then staff entries.
pub fn main_menu_labels() -> Vec<String> {
    Category::ALL
        .iter()
        .map(|c| c.label().to_string())
        .chain(MAIN_MENU_EXTRAS.iter().map(|s| s.to_string()))
        .collect()
}

pub fn render_main(frame: &mut Frame, app: &App, area: Rect) {
    let labels = main_menu_labels();
    let height = labels.len() as u16 * 2 + 6;
    let area = centered_rect_fixed(44, height, area);

    let mut lines = vec![
        Line::from(Span::styled("将棋部へようこそ！", styles::title_style())),
        Line::from(Span::styled("当てはまるものを選んでください", styles::muted_style())),
        Line::from(""),
    ];
    for (i, label) in labels.iter().enumerate() {
        let selected = i == app.main_selection;
        // Staff entries sit below a gap
        if i == Category::ALL.len() {
            lines.push(Line::from(Span::styled("────────────", styles::muted_style())));
        }
        let marker = if selected { "▶ " } else { "  " };
        lines.push(Line::from(vec![
            Span::styled(format!("[{}] ", i + 1), styles::help_key_style()),
            Span::styled(format!("{}{}", marker, label), styles::choice_style(selected)),
        ]));
        if i + 1 < Category::ALL.len() {
            lines.push(Line::from(""));
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(
        Paragraph::new(lines).block(block).alignment(Alignment::Center),
        area,
    );
}

pub fn render_completion(frame: &mut Frame, app: &App, category: Category, area: Rect) {
    let area = centered_rect_fixed(60, 12, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(Span::styled(" 受付完了 ", styles::success_style()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .split(inner);

    let message = Paragraph::new(Line::from(Span::styled(
        app.completion_message(category).to_string(),
        styles::highlight_style(),
    )))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(message, rows[0]);

    frame.render_widget(
        Paragraph::new(Span::styled("何かキーを押すとトップに戻ります", styles::muted_style()))
            .alignment(Alignment::Center),
        rows[1],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_menu_lists_categories_then_staff() {
        let labels = main_menu_labels();
        assert_eq!(labels.len(), Category::ALL.len() + MAIN_MENU_EXTRAS.len());
        assert_eq!(labels[0], Category::ALL[0].label());
        assert_eq!(labels.last().map(String::as_str), Some("管理者"));
    }
}

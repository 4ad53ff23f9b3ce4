//! Member check-in screen: the roster with live in/out state.

use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::ui::styles;
use crate::utils::format_timestamp;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let status = &app.snapshot.member_status;

    let header = Row::new(vec![
        Cell::from("部員名"),
        Cell::from("状態"),
        Cell::from("最終更新"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = app
        .catalog
        .members
        .iter()
        .map(|name| {
            let state = status.get(name);
            let checked_in = state.map(|s| s.checked_in).unwrap_or(false);
            let label = match state {
                Some(s) if s.checked_in => "出勤中",
                Some(_) => "退勤中",
                None => "-",
            };
            let since = state
                .map(|s| format_timestamp(&s.last_changed))
                .unwrap_or_default();
            Row::new(vec![
                Cell::from(name.clone()),
                Cell::from(label),
                Cell::from(since),
            ])
            .style(styles::member_style(checked_in))
        })
        .collect();

    let widths = [
        Constraint::Percentage(40),
        Constraint::Length(8),
        Constraint::Fill(1),
    ];

    let pending = if app.member_toggle_pending { " 記録中..." } else { "" };
    let title = format!(
        " 部員 ({}名中 {}名 出勤中){} ",
        app.catalog.members.len(),
        status.checked_in_count(),
        pending
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.member_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

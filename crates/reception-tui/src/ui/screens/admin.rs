//! Admin login, console tabs and the reset screen.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use reception_core::models::{Category, VisitorRecord};

use crate::app::{AdminTab, App};
use crate::ui::render::centered_rect_fixed;
use crate::ui::styles;
use crate::utils::{format_timestamp, truncate};

/// Characters of a completion message shown in the Messages table.
const MESSAGE_PREVIEW_CHARS: usize = 40;

fn render_password_box(frame: &mut Frame, area: Rect, title: &str, prompt: &str, input: &str) {
    let area = centered_rect_fixed(48, 9, area);
    let masked = "*".repeat(input.chars().count().min(24));

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(prompt.to_string(), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("[", styles::muted_style()),
            Span::styled(format!("{:<24}▌", masked), styles::selected_style()),
            Span::styled("]", styles::muted_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled("Enter: 確定  Esc: 戻る", styles::muted_style())),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(Span::styled(format!(" {} ", title), styles::title_style()));

    frame.render_widget(
        Paragraph::new(lines).block(block).alignment(Alignment::Center),
        area,
    );
}

pub fn render_login(frame: &mut Frame, app: &App, area: Rect) {
    render_password_box(
        frame,
        area,
        "管理者ログイン",
        "パスワードを入力してください",
        &app.password_input,
    );
}

pub fn render_reset(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(9)])
        .split(area);

    let warning = Paragraph::new(vec![
        Line::from(Span::styled(
            "来場者・出退勤の記録をすべて削除します。元に戻せません。",
            styles::error_style(),
        )),
        Line::from(Span::styled(
            "先にエクスポートしておくことをおすすめします。完了メッセージは残ります。",
            styles::muted_style(),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(warning, rows[0]);

    render_password_box(
        frame,
        rows[1],
        "全データリセット",
        "リセット用パスワードを入力してください",
        &app.password_input,
    );
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(5)])
        .split(area);

    render_tabs(frame, app, chunks[0]);

    match app.admin_tab {
        AdminTab::Summary => render_summary(frame, app, chunks[1]),
        AdminTab::Visitors(category) => render_visitors(frame, app, category, chunks[1]),
        AdminTab::MemberLog => render_member_log(frame, app, chunks[1]),
        AdminTab::Messages => render_messages(frame, app, chunks[1]),
    }
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in AdminTab::all().iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let selected = *tab == app.admin_tab;
        let style = if selected {
            styles::tab_style(true)
        } else {
            styles::muted_style()
        };
        spans.push(Span::styled(tab.title(), style));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn table_block(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
}

fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(Category::ALL.len() as u16 + 5),
            Constraint::Min(4),
        ])
        .split(area);

    let summary = &app.summary;
    let header = Row::new(vec![Cell::from("区分"), Cell::from("受付件数"), Cell::from("人数")])
        .style(styles::title_style())
        .height(1);

    let mut rows: Vec<Row> = summary
        .categories
        .iter()
        .map(|c| {
            Row::new(vec![
                Cell::from(c.category.label()),
                Cell::from(format!("{:>6}", c.receptions)),
                Cell::from(format!("{:>6}", c.headcount)),
            ])
            .style(styles::list_item_style())
        })
        .collect();
    rows.push(
        Row::new(vec![
            Cell::from("合計"),
            Cell::from(format!("{:>6}", summary.total_receptions)),
            Cell::from(format!("{:>6}", summary.total_visitors)),
        ])
        .style(styles::highlight_style()),
    );

    let widths = [
        Constraint::Percentage(40),
        Constraint::Length(10),
        Constraint::Length(10),
    ];
    frame.render_widget(
        Table::new(rows, widths)
            .header(header)
            .block(table_block(" 来場者集計 ".to_string())),
        chunks[0],
    );

    let mut lines = vec![
        Line::from(vec![
            Span::styled("出勤中の部員: ", styles::muted_style()),
            Span::styled(
                format!("{}名", summary.members_checked_in),
                styles::success_style(),
            ),
            Span::styled("   出退勤記録: ", styles::muted_style()),
            Span::styled(format!("{}件", summary.log_entries), styles::list_item_style()),
        ]),
        Line::from(vec![
            Span::styled("保存先: ", styles::muted_style()),
            Span::styled(app.store_name(), styles::list_item_style()),
        ]),
    ];
    if let Some(ref path) = app.last_export {
        lines.push(Line::from(vec![
            Span::styled("最後のエクスポート: ", styles::muted_style()),
            Span::styled(path.display().to_string(), styles::list_item_style()),
        ]));
    }
    frame.render_widget(
        Paragraph::new(lines)
            .block(table_block(" 状況 ".to_string()))
            .wrap(Wrap { trim: true }),
        chunks[1],
    );
}

fn visitor_cells(record: &VisitorRecord) -> Vec<String> {
    let mut cells = vec![format_timestamp(record.timestamp())];
    match record {
        VisitorRecord::Student(s) => {
            cells.push(s.grade.clone());
            cells.push(s.class.clone());
            cells.push(s.student_id.clone());
        }
        _ => cells.push(record.headcount().to_string()),
    }
    cells.push(record.shogi_strength().to_string());
    if let Some(answer) = record.extra_answer() {
        cells.push(if answer { "はい" } else { "いいえ" }.to_string());
    }
    cells
}

fn render_visitors(frame: &mut Frame, app: &App, category: Category, area: Rect) {
    let records = app.admin_visitor_rows();

    let mut header_cells = vec!["受付日時"];
    if category.collects_per_person() {
        header_cells.extend(["学年", "クラス", "番号"]);
    } else {
        header_cells.push("人数");
    }
    header_cells.push("棋力");
    if let Some(question) = category.extra_question() {
        header_cells.push(question.column_label());
    }
    let widths: Vec<Constraint> = header_cells
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i == 0 {
                Constraint::Length(21)
            } else {
                Constraint::Fill(1)
            }
        })
        .collect();

    let header = Row::new(header_cells.into_iter().map(Cell::from).collect::<Vec<_>>())
        .style(styles::title_style())
        .height(1);

    let rows: Vec<Row> = records
        .iter()
        .map(|record| {
            Row::new(visitor_cells(record).into_iter().map(Cell::from).collect::<Vec<_>>())
                .style(styles::list_item_style())
        })
        .collect();

    let headcount = app
        .summary
        .for_category(category)
        .map(|c| c.headcount)
        .unwrap_or(0);
    let title = format!(
        " {} ({}件 / {}名, 新しい順) - [d]削除 [x]CSV ",
        category.label(),
        records.len(),
        headcount
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(table_block(title))
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !records.is_empty() {
        state.select(Some(app.admin_selection));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_member_log(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec![Cell::from("日時"), Cell::from("部員名"), Cell::from("種別")])
        .style(styles::title_style())
        .height(1);

    let rows: Vec<Row> = app
        .snapshot
        .member_log
        .iter()
        .rev()
        .map(|entry| {
            Row::new(vec![
                Cell::from(format_timestamp(&entry.timestamp)),
                Cell::from(entry.name.clone()),
                Cell::from(entry.kind.label()),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let widths = [
        Constraint::Length(21),
        Constraint::Fill(1),
        Constraint::Length(6),
    ];
    let title = format!(
        " 出退勤履歴 ({}件, 新しい順) - [x]CSV ",
        app.snapshot.member_log.len()
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(table_block(title))
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !app.snapshot.member_log.is_empty() {
        state.select(Some(app.admin_selection));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_messages(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(6)])
        .split(area);

    let messages = &app.snapshot.messages;
    let header = Row::new(vec![Cell::from("区分"), Cell::from("完了メッセージ"), Cell::from("")])
        .style(styles::title_style())
        .height(1);

    let rows: Vec<Row> = Category::ALL
        .iter()
        .map(|&category| {
            let custom = if messages.is_customized(category) { "変更済" } else { "既定" };
            Row::new(vec![
                Cell::from(category.label()),
                Cell::from(truncate(messages.message_for(category), MESSAGE_PREVIEW_CHARS)),
                Cell::from(custom),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let widths = [
        Constraint::Length(12),
        Constraint::Fill(1),
        Constraint::Length(8),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(table_block(" 完了メッセージ - [Enter]編集 ".to_string()))
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.admin_selection));
    frame.render_stateful_widget(table, chunks[0], &mut state);

    if let Some(ref editor) = app.message_editor {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(styles::border_style(true))
            .title(Span::styled(
                format!(" {} のメッセージを編集 (空にすると既定に戻ります) ", editor.category.label()),
                styles::highlight_style(),
            ));
        frame.render_widget(
            Paragraph::new(format!("{}▌", editor.text))
                .block(block)
                .wrap(Wrap { trim: false }),
            chunks[1],
        );
    }
}

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use super::{detail_line, render_placeholder, table_title, LOADING_TEXT};
use crate::app::{App, InFlight};
use crate::ui::styles;
use crate::utils::{format_timestamp, truncate_string};

/// Render the Users tab - table on the left, selected user on the right
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_user_table(frame, app, chunks[0]);
    render_user_detail(frame, app, chunks[1]);
}

fn render_user_table(frame: &mut Frame, app: &App, area: Rect) {
    let title = table_title("Người dùng", app.users.len(), &app.users_keyword);

    if app.users.is_empty() {
        let message = if !app.users_loaded && app.is_busy(InFlight::UserList) {
            LOADING_TEXT
        } else if app.users_keyword.is_empty() {
            "Chưa có người dùng nào"
        } else {
            "Không tìm thấy người dùng nào"
        };
        render_placeholder(frame, title, message, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("ID"),
        Cell::from("Tên đăng nhập"),
        Cell::from("Thiết bị"),
        Cell::from("Cập nhật"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = app
        .users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let style = if i == app.users_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let device_style = if user.device_id.is_some() {
                style
            } else {
                styles::muted_style()
            };
            let updated = user
                .updated_at
                .as_deref()
                .map(format_timestamp)
                .unwrap_or_default();

            Row::new(vec![
                Cell::from(user.id.to_string()),
                Cell::from(truncate_string(&user.username, 30)),
                Cell::from(truncate_string(&app.device_label(user.device_id.as_ref()), 30))
                    .style(device_style),
                Cell::from(updated),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Length(19),
    ];

    let title_style = if app.is_busy(InFlight::UserList) {
        styles::highlight_style()
    } else {
        styles::muted_style()
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(title_style)
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.users_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_user_detail(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![];

    match app.selected_user() {
        Some(user) => {
            lines.push(Line::from(Span::styled(
                user.username.clone(),
                styles::title_style(),
            )));
            lines.push(Line::from(""));
            lines.push(detail_line("ID:        ", Some(user.id.to_string())));
            lines.push(detail_line(
                "Thiết bị:  ",
                Some(app.device_label(user.device_id.as_ref())),
            ));
            lines.push(detail_line(
                "Cập nhật:  ",
                user.updated_at.as_deref().map(format_timestamp),
            ));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Thao tác", styles::highlight_style())));
            for (key, desc) in [
                ("[n] ", "Tạo người dùng"),
                ("[c] ", "Đổi thiết bị"),
                ("[r] ", "Reset mật khẩu"),
                ("[d] ", "Xóa người dùng"),
            ] {
                lines.push(Line::from(vec![
                    Span::styled(key, styles::help_key_style()),
                    Span::styled(desc, styles::help_desc_style()),
                ]));
            }
        }
        None => {
            lines.push(Line::from(Span::styled(
                "Chọn một người dùng trong danh sách",
                styles::muted_style(),
            )));
            lines.push(Line::from(vec![
                Span::styled("[n] ", styles::help_key_style()),
                Span::styled("Tạo người dùng", styles::help_desc_style()),
            ]));
        }
    }

    let block = Block::default()
        .title(" Chi tiết ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

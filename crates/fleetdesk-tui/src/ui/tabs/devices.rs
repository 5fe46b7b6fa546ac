use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use super::{detail_line, render_placeholder, table_title, LOADING_TEXT};
use crate::app::{App, InFlight};
use crate::ui::styles;
use crate::utils::{format_timestamp, truncate_string};

/// Render the Devices tab
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_device_table(frame, app, chunks[0]);
    render_device_detail(frame, app, chunks[1]);
}

fn render_device_table(frame: &mut Frame, app: &App, area: Rect) {
    let title = table_title("Thiết bị", app.devices.len(), &app.devices_keyword);

    if app.devices.is_empty() {
        let message = if !app.devices_loaded && app.is_busy(InFlight::DeviceList) {
            LOADING_TEXT
        } else if app.devices_keyword.is_empty() {
            "Chưa có thiết bị nào"
        } else {
            "Không tìm thấy thiết bị nào"
        };
        render_placeholder(frame, title, message, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("ID"),
        Cell::from("Mã thiết bị"),
        Cell::from("Tên"),
        Cell::from("Mô tả"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = app
        .devices
        .iter()
        .enumerate()
        .map(|(i, device)| {
            let style = if i == app.devices_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let description = device.description.as_deref().unwrap_or_default();

            Row::new(vec![
                Cell::from(device.id.to_string()),
                Cell::from(truncate_string(&device.external_id, 24)),
                Cell::from(truncate_string(device.name_or_placeholder(), 24)),
                Cell::from(truncate_string(description, 40)).style(styles::muted_style()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Fill(3),
    ];

    let title_style = if app.is_busy(InFlight::DeviceList) {
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
    state.select(Some(app.devices_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_device_detail(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![];

    if let Some(device) = app.selected_device() {
        lines.push(Line::from(Span::styled(
            device.display_name().to_string(),
            styles::title_style(),
        )));
        lines.push(Line::from(""));
        lines.push(detail_line("Mã thiết bị: ", Some(device.external_id.clone())));
        lines.push(detail_line("Tên:         ", device.name.clone()));
        lines.push(detail_line(
            "Cập nhật:    ",
            device.updated_at.as_deref().map(format_timestamp),
        ));

        let assigned = app
            .users
            .iter()
            .filter(|u| u.device_id.as_ref() == Some(&device.id))
            .map(|u| u.username.as_str())
            .collect::<Vec<_>>();
        let assigned = (!assigned.is_empty()).then(|| assigned.join(", "));
        lines.push(detail_line("Người dùng:  ", assigned));

        if let Some(description) = device.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Mô tả", styles::highlight_style())));
            lines.push(Line::from(description.to_string()));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "Chọn một thiết bị trong danh sách",
            styles::muted_style(),
        )));
    }

    let block = Block::default()
        .title(" Chi tiết ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

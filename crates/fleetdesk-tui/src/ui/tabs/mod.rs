//! Tab-specific content rendering.

pub mod devices;
pub mod users;

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::ui::styles;

pub const LOADING_TEXT: &str = "Đang tải...";
const PLACEHOLDER: &str = "-";

/// Bordered message shown in place of an empty or loading table
pub(crate) fn render_placeholder(frame: &mut Frame, title: String, message: &str, area: Rect) {
    let block = Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {}", message), styles::muted_style())),
    ])
    .block(block);
    frame.render_widget(paragraph, area);
}

/// `label: value` line for the detail panes
pub(crate) fn detail_line<'a>(label: &'a str, value: Option<String>) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, styles::muted_style()),
        Span::raw(value.unwrap_or_else(|| PLACEHOLDER.to_string())),
    ])
}

/// Table title with the active search keyword, if any
pub(crate) fn table_title(name: &str, count: usize, keyword: &str) -> String {
    if keyword.is_empty() {
        format!(" {} ({}) ", name, count)
    } else {
        format!(" {} ({}) - \"{}\" ", name, count, keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_title() {
        assert_eq!(table_title("Người dùng", 3, ""), " Người dùng (3) ");
        assert_eq!(table_title("Thiết bị", 1, "kho"), " Thiết bị (1) - \"kho\" ");
    }
}

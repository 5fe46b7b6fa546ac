use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use fleetdesk_core::validation::ValidationErrors;

use crate::app::{App, AppState, InFlight, LoginFocus, Tab};
use crate::forms::{DeviceDraft, DeviceField, DevicePicker, Dialog, UserDraft, UserField};
use crate::utils::{format_role, truncate_string};

use super::styles;
use super::tabs::{devices, users};

/// Width of the notification stack in the top-right corner
const NOTIFICATION_WIDTH: u16 = 44;

/// Visible width of single-line input fields
const FIELD_WIDTH: usize = 24;

const NO_DEVICE_OPTION: &str = "(Không có thiết bị)";

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::Dialog => render_dialog_overlay(frame, app),
        AppState::Confirming => render_confirm_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        _ => {}
    }

    render_notifications(frame, app);
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Fleetdesk";
    let user_text = match app.session.current_user() {
        Some(user) => {
            let role = format_role(user.role.as_deref());
            if role.is_empty() {
                format!("{}  [?] Trợ giúp", user.username)
            } else {
                format!("{} ({})  [?] Trợ giúp", user.username, role)
            }
        }
        None => "[?] Trợ giúp".to_string(),
    };
    let used = title.chars().count() + user_text.chars().count() + 4;

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(user_text, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let tabs = [("[1] ", Tab::Users), ("[2] ", Tab::Devices)];

    let mut spans = vec![Span::raw(" ")];
    for (i, (key, tab)) in tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("{}{}", key, tab.title());
        if app.current_tab == *tab {
            spans.push(Span::styled(label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    if app.state == AppState::Searching || !app.current_keyword().is_empty() {
        let text = if app.state == AppState::Searching {
            format!("Tìm kiếm: {}▌", app.search_input)
        } else {
            format!("Tìm kiếm: {}", app.current_keyword())
        };
        let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
        let padding = (area.width as usize).saturating_sub(used + text.chars().count() + 2);
        spans.push(Span::raw(" ".repeat(padding)));
        spans.push(Span::styled(text, styles::search_style()));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Users => users::render(frame, app, area),
        Tab::Devices => devices::render(frame, app, area),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.current_tab {
        Tab::Users => "[n]ew [c]hange device [r]eset [d]elete | [/] [u] [L]ogout [q]uit",
        Tab::Devices => "[n]ew [e]dit [d]elete | [/] [u] [L]ogout [q]uit",
    };

    let left_text = if app.is_busy(InFlight::UserList) || app.is_busy(InFlight::DeviceList) {
        " Đang tải... ".to_string()
    } else {
        format!(" {} ", app.session.api().base_url())
    };
    let right_text = format!(" {} ", shortcuts);

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(key, styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 26, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled("  Fleetdesk", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Điều hướng", styles::highlight_style())),
        help_line("  1/2 ←/→   ", "Chuyển tab"),
        help_line("  ↑/↓       ", "Di chuyển trong danh sách"),
        help_line("  PgUp/PgDn ", "Cuộn trang"),
        help_line("  Home/End  ", "Đầu/cuối danh sách"),
        Line::from(""),
        Line::from(Span::styled(" Thao tác", styles::highlight_style())),
        help_line("  /         ", "Tìm kiếm"),
        help_line("  u         ", "Tải lại danh sách"),
        help_line("  n         ", "Tạo mới"),
        help_line("  e / Enter ", "Sửa thiết bị"),
        help_line("  c         ", "Đổi thiết bị của người dùng"),
        help_line("  r         ", "Reset mật khẩu"),
        help_line("  d / Del   ", "Xóa"),
        help_line("  L         ", "Đăng xuất"),
        help_line("  q         ", "Thoát"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Nhấn ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" hoặc ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" để đóng", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// `Label: [value▌]` input line
fn input_line(label: &'static str, value: &str, focused: bool, busy: bool) -> Line<'static> {
    let shown = truncate_string(value, FIELD_WIDTH);
    let cursor = if focused && !busy { "▌" } else { "" };
    Line::from(vec![
        Span::styled(label, styles::muted_style()),
        Span::styled("[", styles::muted_style()),
        Span::styled(
            format!("{:<width$}{}", shown, cursor, width = FIELD_WIDTH),
            styles::field_style(focused, busy),
        ),
        Span::styled("]", styles::muted_style()),
    ])
}

fn masked(value: &str) -> String {
    "*".repeat(value.chars().count().min(FIELD_WIDTH))
}

/// Inline error under a field, if any
fn push_field_error(lines: &mut Vec<Line<'static>>, errors: &ValidationErrors, field: &str) {
    if let Some(message) = errors.get(field) {
        lines.push(Line::from(Span::styled(
            format!("              {}", message),
            styles::error_style(),
        )));
    }
}

fn button_line(label: &str, focused: bool, busy: bool) -> Line<'static> {
    let text = if busy {
        format!("   {}...   ", label)
    } else if focused {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    Line::from(vec![
        Span::raw("              ["),
        Span::styled(text, styles::field_style(focused, busy)),
        Span::raw("]"),
    ])
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let busy = app.is_busy(InFlight::Login);
    let mut lines = vec![
        Line::from(Span::styled("  Fleetdesk - Đăng nhập", styles::title_style())),
        Line::from(""),
    ];

    lines.push(input_line(
        "  Tên đăng nhập: ",
        &app.login_username,
        app.login_focus == LoginFocus::Username,
        busy,
    ));
    push_field_error(&mut lines, &app.login_errors, "username");

    lines.push(input_line(
        "  Mật khẩu:      ",
        &masked(&app.login_password),
        app.login_focus == LoginFocus::Password,
        busy,
    ));
    push_field_error(&mut lines, &app.login_errors, "password");

    let checkbox = if app.login_remember { "[x]" } else { "[ ]" };
    lines.push(Line::from(vec![
        Span::raw("                   "),
        Span::styled(
            format!("{} Ghi nhớ tên đăng nhập", checkbox),
            styles::field_style(app.login_focus == LoginFocus::Remember, busy),
        ),
    ]));

    lines.push(Line::from(""));
    lines.push(button_line(
        "Đăng nhập",
        app.login_focus == LoginFocus::Button,
        busy,
    ));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", error),
            styles::error_style(),
        )));
    }

    let height = lines.len() as u16 + 2;
    let area = centered_rect_fixed(50, height, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_dialog_overlay(frame: &mut Frame, app: &App) {
    let Some(dialog) = app.dialog.as_ref() else {
        return;
    };
    let busy = app.is_busy(InFlight::DialogSubmit);

    let (title, lines) = match dialog {
        Dialog::CreateUser(draft) => (" Tạo người dùng ".to_string(), user_lines(app, draft, busy)),
        Dialog::ChangeDevice(picker) => (
            format!(" Đổi thiết bị: {} ", picker.username),
            picker_lines(app, picker),
        ),
        Dialog::Device(draft) => {
            let title = if draft.is_edit() {
                " Sửa thiết bị "
            } else {
                " Tạo thiết bị "
            };
            (title.to_string(), device_lines(draft, busy))
        }
    };

    let height = lines.len() as u16 + 2;
    let area = centered_rect_fixed(56, height, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn device_choice_label(app: &App, choice: usize) -> String {
    match choice.checked_sub(1).and_then(|i| app.devices.get(i)) {
        Some(device) => device.display_name().to_string(),
        None => NO_DEVICE_OPTION.to_string(),
    }
}

fn user_lines(app: &App, draft: &UserDraft, busy: bool) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from("")];
    lines.push(input_line(
        "  Tên đăng nhập: ",
        &draft.username,
        draft.focus == UserField::Username,
        busy,
    ));
    push_field_error(&mut lines, &draft.errors, "username");
    lines.push(input_line(
        "  Mật khẩu:      ",
        &masked(&draft.password),
        draft.focus == UserField::Password,
        busy,
    ));
    push_field_error(&mut lines, &draft.errors, "password");

    let device_focused = draft.focus == UserField::Device;
    lines.push(Line::from(vec![
        Span::styled("  Thiết bị:      ", styles::muted_style()),
        Span::styled(
            format!("◀ {} ▶", device_choice_label(app, draft.device_choice)),
            styles::field_style(device_focused, busy),
        ),
    ]));

    lines.push(Line::from(""));
    lines.push(button_line("Tạo", draft.focus == UserField::Submit, busy || !draft.can_submit()));
    lines.push(dialog_hint());
    lines
}

fn picker_lines(app: &App, picker: &DevicePicker) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from("")];
    let options = std::iter::once(NO_DEVICE_OPTION.to_string())
        .chain(app.devices.iter().map(|d| d.display_name().to_string()));

    for (i, label) in options.enumerate() {
        let selected = i == picker.selection;
        let marker = if selected { "▶ " } else { "  " };
        let style = if selected {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        lines.push(Line::from(Span::styled(
            format!("  {}{}", marker, truncate_string(&label, 44)),
            style,
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("  [Enter] ", styles::help_key_style()),
        Span::styled("Lưu  ", styles::help_desc_style()),
        Span::styled("[Esc] ", styles::help_key_style()),
        Span::styled("Hủy", styles::help_desc_style()),
    ]));
    lines
}

fn device_lines(draft: &DeviceDraft, busy: bool) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from("")];
    lines.push(input_line(
        "  Mã thiết bị:   ",
        &draft.form.external_id,
        draft.focus == DeviceField::ExternalId,
        busy,
    ));
    push_field_error(&mut lines, &draft.errors, "external_id");
    lines.push(input_line(
        "  Tên:           ",
        &draft.form.name,
        draft.focus == DeviceField::Name,
        busy,
    ));
    lines.push(input_line(
        "  Mô tả:         ",
        &draft.form.description,
        draft.focus == DeviceField::Description,
        busy,
    ));

    let label = if draft.is_edit() { "Lưu" } else { "Tạo" };
    lines.push(Line::from(""));
    lines.push(button_line(
        label,
        draft.focus == DeviceField::Submit,
        busy || !draft.can_submit(),
    ));
    lines.push(dialog_hint());
    lines
}

fn dialog_hint() -> Line<'static> {
    Line::from(vec![
        Span::styled("  [Tab] ", styles::help_key_style()),
        Span::styled("Chuyển ô  ", styles::help_desc_style()),
        Span::styled("[Esc] ", styles::help_key_style()),
        Span::styled("Hủy", styles::help_desc_style()),
    ])
}

fn render_confirm_overlay(frame: &mut Frame, app: &App) {
    let Some(action) = app.confirm.as_ref() else {
        return;
    };

    let area = centered_rect_fixed(56, 8, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", action.prompt()),
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Nhấn ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" để xác nhận, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" để hủy", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(" Xác nhận ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Bạn có chắc chắn muốn thoát?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Nhấn ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" để thoát, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" để hủy", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Stack live notifications in the top-right corner, newest first
fn render_notifications(frame: &mut Frame, app: &App) {
    let screen = frame.area();
    let width = NOTIFICATION_WIDTH.min(screen.width);
    let x = screen.x + screen.width.saturating_sub(width + 1);
    let mut y = screen.y + 1;

    for note in app.notifications.iter().rev() {
        let text_width = width.saturating_sub(2).max(1) as usize;
        let body_lines = (note.message.chars().count() / text_width) as u16 + 1;
        let height = body_lines + 2;
        if y + height > screen.y + screen.height {
            break;
        }
        let area = Rect::new(x, y, width, height);
        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(format!(" {} ", note.title))
            .title_style(styles::notification_title_style(note.kind))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(styles::notification_color(note.kind)));

        let paragraph = Paragraph::new(note.message.clone())
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        y += height;
    }
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

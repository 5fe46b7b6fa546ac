//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Network work is only ever started here, never
//! awaited; results arrive through `App::tick`.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, InFlight, LoginFocus, Tab, PAGE_SCROLL_SIZE};
use crate::forms::{
    can_add_password_char, can_add_username_char, ConfirmAction, DeviceField, Dialog, UserField,
};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key),
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
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
        AppState::Confirming => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.accept_confirm(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_confirm(),
                _ => {}
            }
            return Ok(false);
        }
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::Dialog => {
            handle_dialog_input(app, key);
            return Ok(false);
        }
        AppState::Normal | AppState::Quitting => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('1') => app.current_tab = Tab::Users,
        KeyCode::Char('2') => app.current_tab = Tab::Devices,
        KeyCode::Left => app.current_tab = app.current_tab.prev(),
        KeyCode::Right => app.current_tab = app.current_tab.next(),
        KeyCode::Char('/') => app.start_search(),
        KeyCode::Char('u') => app.refresh_current_tab(),
        KeyCode::Char('L') => app.ask_confirm(ConfirmAction::Logout),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::PageUp => app.move_selection(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::PageDown => app.move_selection(PAGE_SCROLL_SIZE as isize),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),
        KeyCode::Esc => {
            // Drop an active filter
            if !app.current_keyword().is_empty() {
                app.search_input.clear();
                app.apply_search();
            }
        }
        _ => match app.current_tab {
            Tab::Users => handle_users_input(app, key),
            Tab::Devices => handle_devices_input(app, key),
        },
    }

    Ok(false)
}

fn handle_users_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('n') => app.open_create_user(),
        KeyCode::Char('c') => app.open_change_device(),
        KeyCode::Char('r') => app.confirm_reset_password(),
        KeyCode::Char('d') | KeyCode::Delete => app.confirm_delete_user(),
        _ => {}
    }
}

fn handle_devices_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('n') => app.open_create_device(),
        KeyCode::Char('e') | KeyCode::Enter => app.open_edit_device(),
        KeyCode::Char('d') | KeyCode::Delete => app.confirm_delete_device(),
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            // Keep the previous filter
            app.search_input.clear();
            app.state = AppState::Normal;
        }
        KeyCode::Enter => app.apply_search(),
        KeyCode::Backspace => {
            app.search_input.pop();
        }
        KeyCode::Char(c) => app.search_input.push(c),
        _ => {}
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    if key.code == KeyCode::Esc {
        app.state = AppState::Quitting;
        return Ok(true);
    }
    // Form is frozen while the request is pending
    if app.is_busy(InFlight::Login) {
        return Ok(false);
    }

    match key.code {
        KeyCode::Down | KeyCode::Tab => app.login_focus = app.login_focus.next(),
        KeyCode::Up | KeyCode::BackTab => app.login_focus = app.login_focus.prev(),
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username | LoginFocus::Password | LoginFocus::Remember => {
                app.login_focus = app.login_focus.next();
            }
            LoginFocus::Button => app.submit_login(),
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Remember | LoginFocus::Button => {}
        },
        KeyCode::Char(' ') if app.login_focus == LoginFocus::Remember => {
            app.login_remember = !app.login_remember;
        }
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Remember | LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}

fn handle_dialog_input(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.close_dialog();
        return;
    }
    if app.is_busy(InFlight::DialogSubmit) {
        return;
    }

    let device_count = app.devices.len();
    let mut submit = false;

    match app.dialog.as_mut() {
        Some(Dialog::CreateUser(draft)) => match key.code {
            KeyCode::Down | KeyCode::Tab => draft.focus = draft.focus.next(),
            KeyCode::Up | KeyCode::BackTab => draft.focus = draft.focus.prev(),
            KeyCode::Left if draft.focus == UserField::Device => {
                draft.cycle_device(device_count, false)
            }
            KeyCode::Right | KeyCode::Char(' ') if draft.focus == UserField::Device => {
                draft.cycle_device(device_count, true)
            }
            KeyCode::Enter => {
                if draft.focus == UserField::Submit {
                    submit = draft.can_submit();
                } else {
                    draft.focus = draft.focus.next();
                }
            }
            KeyCode::Backspace => draft.pop_char(),
            KeyCode::Char(c) => draft.push_char(c),
            _ => {}
        },
        Some(Dialog::ChangeDevice(picker)) => match key.code {
            KeyCode::Up | KeyCode::Char('k') => picker.move_selection(device_count, -1),
            KeyCode::Down | KeyCode::Char('j') => picker.move_selection(device_count, 1),
            KeyCode::Home => picker.selection = 0,
            KeyCode::End => picker.selection = device_count,
            KeyCode::Enter => submit = true,
            _ => {}
        },
        Some(Dialog::Device(draft)) => match key.code {
            KeyCode::Down | KeyCode::Tab => draft.focus = draft.focus.next(),
            KeyCode::Up | KeyCode::BackTab => draft.focus = draft.focus.prev(),
            KeyCode::Enter => {
                if draft.focus == DeviceField::Submit {
                    submit = draft.can_submit();
                } else {
                    draft.focus = draft.focus.next();
                }
            }
            KeyCode::Backspace => draft.pop_char(),
            KeyCode::Char(c) => draft.push_char(c),
            _ => {}
        },
        None => app.state = AppState::Normal,
    }

    if submit {
        app.submit_dialog();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crossterm::event::KeyModifiers;
    use fleetdesk_core::auth::FileCredentialStore;
    use fleetdesk_core::config::Config;
    use fleetdesk_core::models::{RecordId, User};
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_input(app, key(KeyCode::Char(c))).unwrap();
        }
    }

    fn app() -> (App, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            // Nothing listens here; tests never await the spawned requests
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let store = Arc::new(FileCredentialStore::new(dir.path()));
        let app = App::new(&config, store).unwrap();
        (app, dir)
    }

    fn user(id: i64, username: &str) -> User {
        User {
            id: RecordId::Int(id),
            username: username.to_string(),
            device_id: None,
            updated_at: None,
        }
    }

    // -------------------------------------------------------------------------
    // Login
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_form_editing() {
        let (mut app, _dir) = app();
        app.login_username.clear();
        app.login_password.clear();
        app.start_login();
        assert_eq!(app.login_focus, LoginFocus::Username);

        type_text(&mut app, "lan");
        handle_input(&mut app, key(KeyCode::Tab)).unwrap();
        type_text(&mut app, "secret1");
        handle_input(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.login_username, "lan");
        assert_eq!(app.login_password, "secret");

        handle_input(&mut app, key(KeyCode::Tab)).unwrap();
        let remember = app.login_remember;
        handle_input(&mut app, key(KeyCode::Char(' '))).unwrap();
        assert_eq!(app.login_remember, !remember);
    }

    #[tokio::test]
    async fn test_login_ignores_control_chars() {
        let (mut app, _dir) = app();
        app.login_username.clear();
        app.start_login();
        type_text(&mut app, "lan\u{7}");
        assert_eq!(app.login_username, "lan");
    }

    #[tokio::test]
    async fn test_esc_on_login_quits() {
        let (mut app, _dir) = app();
        app.start_login();
        assert!(handle_input(&mut app, key(KeyCode::Esc)).unwrap());
        assert_eq!(app.state, AppState::Quitting);
    }

    // -------------------------------------------------------------------------
    // Normal mode
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_tab_keys() {
        let (mut app, _dir) = app();
        handle_input(&mut app, key(KeyCode::Char('2'))).unwrap();
        assert_eq!(app.current_tab, Tab::Devices);
        handle_input(&mut app, key(KeyCode::Right)).unwrap();
        assert_eq!(app.current_tab, Tab::Users);
    }

    #[tokio::test]
    async fn test_quit_needs_confirmation() {
        let (mut app, _dir) = app();
        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))).unwrap());
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))).unwrap());
        assert_eq!(app.state, AppState::Normal);
        handle_input(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))).unwrap());
    }

    #[tokio::test]
    async fn test_selection_is_clamped() {
        let (mut app, _dir) = app();
        app.users = (1..=15).map(|i| user(i, &format!("u{}", i))).collect();

        handle_input(&mut app, key(KeyCode::Up)).unwrap();
        assert_eq!(app.users_selection, 0);
        handle_input(&mut app, key(KeyCode::PageDown)).unwrap();
        assert_eq!(app.users_selection, 10);
        handle_input(&mut app, key(KeyCode::PageDown)).unwrap();
        assert_eq!(app.users_selection, 14);
        handle_input(&mut app, key(KeyCode::Home)).unwrap();
        assert_eq!(app.users_selection, 0);
        handle_input(&mut app, key(KeyCode::End)).unwrap();
        assert_eq!(app.users_selection, 14);
    }

    #[tokio::test]
    async fn test_search_applies_keyword() {
        let (mut app, _dir) = app();
        handle_input(&mut app, key(KeyCode::Char('/'))).unwrap();
        assert_eq!(app.state, AppState::Searching);
        type_text(&mut app, " kho ");
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();

        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.users_keyword, "kho");
        assert!(app.is_busy(InFlight::UserList));
    }

    #[tokio::test]
    async fn test_search_escape_keeps_previous_keyword() {
        let (mut app, _dir) = app();
        app.users_keyword = "lan".into();
        handle_input(&mut app, key(KeyCode::Char('/'))).unwrap();
        type_text(&mut app, "x");
        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.users_keyword, "lan");
    }

    #[tokio::test]
    async fn test_delete_asks_first() {
        let (mut app, _dir) = app();
        app.users = vec![user(7, "lan")];
        handle_input(&mut app, key(KeyCode::Char('d'))).unwrap();
        assert_eq!(app.state, AppState::Confirming);
        assert_eq!(
            app.confirm,
            Some(ConfirmAction::DeleteUser {
                id: RecordId::Int(7),
                username: "lan".into()
            })
        );

        handle_input(&mut app, key(KeyCode::Char('n'))).unwrap();
        assert_eq!(app.state, AppState::Normal);
        assert!(app.confirm.is_none());
        assert!(!app.is_busy(InFlight::RowMutation));
    }

    #[tokio::test]
    async fn test_row_actions_need_a_selection() {
        let (mut app, _dir) = app();
        handle_input(&mut app, key(KeyCode::Char('r'))).unwrap();
        handle_input(&mut app, key(KeyCode::Char('c'))).unwrap();
        assert_eq!(app.state, AppState::Normal);
        assert!(app.dialog.is_none());
    }

    // -------------------------------------------------------------------------
    // Dialogs
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_user_dialog_flow() {
        let (mut app, _dir) = app();
        handle_input(&mut app, key(KeyCode::Char('n'))).unwrap();
        assert_eq!(app.state, AppState::Dialog);

        type_text(&mut app, "minh");
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        type_text(&mut app, "123456");
        match app.dialog.as_ref() {
            Some(Dialog::CreateUser(draft)) => {
                assert_eq!(draft.username, "minh");
                assert_eq!(draft.password, "123456");
                assert_eq!(draft.focus, UserField::Password);
            }
            other => panic!("unexpected dialog {:?}", other),
        }

        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert!(app.dialog.is_none());
        assert_eq!(app.state, AppState::Normal);
    }

    #[tokio::test]
    async fn test_device_dialog_typing_marks_touched() {
        let (mut app, _dir) = app();
        handle_input(&mut app, key(KeyCode::Char('2'))).unwrap();
        handle_input(&mut app, key(KeyCode::Char('n'))).unwrap();
        type_text(&mut app, "DEV-9");

        match app.dialog.as_ref() {
            Some(Dialog::Device(draft)) => {
                assert_eq!(draft.form.external_id, "DEV-9");
                assert!(draft.touched);
                assert!(!draft.is_edit());
            }
            other => panic!("unexpected dialog {:?}", other),
        }
    }
}

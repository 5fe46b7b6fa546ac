//! Application state management for fleetdesk.
//!
//! This module contains the core `App` struct that manages all application state,
//! including UI state, loaded records, the session and background task coordination.
//!
//! Network calls never run on the UI task. Each one is spawned and reports back
//! through an MPSC channel as a `TaskResult` carrying a `Ticket`. Results whose
//! ticket no longer matches (the session ended, the dialog closed, a newer list
//! load was issued) are dropped.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use fleetdesk_core::api::{ApiError, ErrorKind, Operation};
use fleetdesk_core::auth::{
    CredentialStore, Credentials, LoginGrant, SessionController, SessionEvent,
};
use fleetdesk_core::config::Config;
use fleetdesk_core::models::{Device, RecordId, User};
use fleetdesk_core::validation::{validate_login, ValidationErrors};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::forms::{ConfirmAction, DeviceDraft, DevicePicker, Dialog, UserDraft};
use crate::notify::{NotificationKind, Notifications, TITLE_NOTICE};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// Login form prefill
const ENV_USERNAME: &str = "FLEETDESK_USERNAME";
const ENV_PASSWORD: &str = "FLEETDESK_PASSWORD";

pub const SESSION_EXPIRED_MESSAGE: &str = "Phiên đăng nhập đã hết hạn. Vui lòng đăng nhập lại.";
pub const LOGGED_OUT_MESSAGE: &str = "Đã đăng xuất thành công";
const LOGIN_SUCCESS_TITLE: &str = "Đăng nhập thành công";
const LOGIN_ERROR_TITLE: &str = "Lỗi đăng nhập";
pub const BUSY_MESSAGE: &str = "Đang xử lý thao tác trước, vui lòng đợi";

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Users,
    Devices,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Users => "Người dùng",
            Tab::Devices => "Thiết bị",
        }
    }

    /// Get the next tab (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Tab::Users => Tab::Devices,
            Tab::Devices => Tab::Users,
        }
    }

    /// Get the previous tab (wrapping around)
    pub fn prev(&self) -> Self {
        self.next()
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    ShowingHelp,
    LoggingIn,
    Dialog,
    Confirming,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Remember,
    Button,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Remember,
            LoginFocus::Remember => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Username,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Username,
            LoginFocus::Remember => LoginFocus::Password,
            LoginFocus::Button => LoginFocus::Remember,
        }
    }
}

/// Actions that are disabled while their request is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InFlight {
    Login,
    UserList,
    DeviceList,
    DialogSubmit,
    RowMutation,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Identifies the session and view a background task was started for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    session: Option<u64>,
    view: u64,
}

/// Result types from background tasks.
enum TaskResult {
    LoggedIn {
        result: Result<LoginGrant, ApiError>,
        remember: bool,
    },
    Users {
        ticket: Ticket,
        result: Result<Vec<User>, ApiError>,
    },
    Devices {
        ticket: Ticket,
        result: Result<Vec<Device>, ApiError>,
    },
    /// Fresh copy of the device being edited
    DeviceDetail {
        ticket: Ticket,
        result: Result<Device, ApiError>,
    },
    DialogSaved {
        ticket: Ticket,
        operation: Operation,
        result: Result<(), ApiError>,
        success: String,
    },
    RowMutated {
        ticket: Ticket,
        operation: Operation,
        result: Result<(), ApiError>,
        success: String,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    pub session: SessionController,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_remember: bool,
    pub login_focus: LoginFocus,
    pub login_errors: ValidationErrors,
    pub login_error: Option<String>,

    // Search
    pub search_input: String,
    pub users_keyword: String,
    pub devices_keyword: String,

    // Loaded records
    pub users: Vec<User>,
    pub devices: Vec<Device>,
    pub users_loaded: bool,
    pub devices_loaded: bool,
    pub users_selection: usize,
    pub devices_selection: usize,

    // Dialogs
    pub dialog: Option<Dialog>,
    pub confirm: Option<ConfirmAction>,

    pub in_flight: HashSet<InFlight>,
    pub notifications: Notifications,

    // View epochs for stale-result detection
    dialog_epoch: u64,
    users_epoch: u64,
    devices_epoch: u64,

    // Background task channel
    task_tx: mpsc::Sender<TaskResult>,
    task_rx: mpsc::Receiver<TaskResult>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let session = SessionController::new(config, store)?;
        debug!(api = %config.api_base_url, "Session controller ready");
        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let remembered = session.remembered_username();
        let login_remember = remembered.is_some();
        let login_username = std::env::var(ENV_USERNAME)
            .ok()
            .or(remembered)
            .unwrap_or_default();
        let login_password = std::env::var(ENV_PASSWORD).unwrap_or_default();

        Ok(Self {
            session,

            state: AppState::Normal,
            current_tab: Tab::Users,

            login_username,
            login_password,
            login_remember,
            login_focus: LoginFocus::Username,
            login_errors: ValidationErrors::new(),
            login_error: None,

            search_input: String::new(),
            users_keyword: String::new(),
            devices_keyword: String::new(),

            users: Vec::new(),
            devices: Vec::new(),
            users_loaded: false,
            devices_loaded: false,
            users_selection: 0,
            devices_selection: 0,

            dialog: None,
            confirm: None,

            in_flight: HashSet::new(),
            notifications: Notifications::new(),

            dialog_epoch: 0,
            users_epoch: 0,
            devices_epoch: 0,

            task_tx,
            task_rx,
        })
    }

    /// Load data for a restored session, or show the login form
    pub fn start(&mut self) {
        if let Some(user) = self.session.current_user() {
            let message = format!("Đăng nhập với tài khoản {}", user.username);
            self.notifications
                .push(NotificationKind::Info, TITLE_NOTICE, message);
            self.load_all();
        } else {
            self.start_login();
        }
    }

    /// Once per event-loop tick: apply task results and session events,
    /// expire notifications.
    pub fn tick(&mut self) {
        self.check_background_tasks();
        self.check_session();
        self.notifications.prune(Instant::now());
    }

    pub fn is_busy(&self, action: InFlight) -> bool {
        self.in_flight.contains(&action)
    }

    /// True (with a notice) when `action` is still outstanding
    fn refuse_while_busy(&mut self, action: InFlight) -> bool {
        if !self.is_busy(action) {
            return false;
        }
        debug!(?action, "Refused while in flight");
        self.notifications
            .push(NotificationKind::Warning, TITLE_NOTICE, BUSY_MESSAGE);
        true
    }

    pub fn current_username(&self) -> Option<&str> {
        self.session.current_user().map(|u| u.username.as_str())
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Show the login overlay
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_errors = ValidationErrors::new();
        self.login_error = None;
    }

    /// Validate the login form and send it in the background
    pub fn submit_login(&mut self) {
        if self.is_busy(InFlight::Login) {
            return;
        }
        self.login_error = None;
        if let Err(errors) = validate_login(&self.login_username, &self.login_password) {
            self.login_errors = errors;
            return;
        }
        self.login_errors = ValidationErrors::new();

        if let Err(e) = self.session.begin_login() {
            debug!(error = %e, "Login refused");
            return;
        }
        self.in_flight.insert(InFlight::Login);

        let credentials = Credentials::new(self.login_username.trim(), self.login_password.clone());
        let remember = self.login_remember;
        let api = self.session.api().clone();
        self.spawn_task(async move {
            TaskResult::LoggedIn {
                result: api.login(&credentials).await,
                remember,
            }
        });
    }

    fn finish_login(&mut self, result: Result<LoginGrant, ApiError>, remember: bool) {
        self.in_flight.remove(&InFlight::Login);
        match self.session.complete_login(result, remember) {
            Ok(user) => {
                info!(username = %user.username, "Login successful");
                self.login_password.clear();
                self.state = AppState::Normal;
                self.notifications.push(
                    NotificationKind::Success,
                    LOGIN_SUCCESS_TITLE,
                    format!("Chào mừng {}!", user.username),
                );
                self.load_all();
            }
            Err(e) => {
                let message = e.user_message(Operation::Login);
                self.login_error = Some(message.clone());
                self.notifications
                    .push(NotificationKind::Error, LOGIN_ERROR_TITLE, message);
            }
        }
    }

    /// Log out locally right away, then notify the backend in the background
    pub fn logout(&mut self) {
        let token = self.session.end_session();
        self.reset_session_data();
        self.notifications.success(LOGGED_OUT_MESSAGE);

        if let Some(token) = token {
            let api = self.session.api().clone();
            tokio::spawn(async move {
                if let Err(e) = api.notify_logout(&token).await {
                    debug!(error = %e, "Logout notification failed");
                }
            });
        }
        self.start_login();
    }

    /// React to the backend ending the session
    fn check_session(&mut self) {
        if let Some(SessionEvent::Invalidated { status, .. }) = self.session.sync() {
            info!(status, "Forced logout");
            self.reset_session_data();
            self.notifications
                .push(NotificationKind::Warning, TITLE_NOTICE, SESSION_EXPIRED_MESSAGE);
            self.start_login();
        }
    }

    /// Drop everything tied to the ended session
    fn reset_session_data(&mut self) {
        self.users.clear();
        self.devices.clear();
        self.users_loaded = false;
        self.devices_loaded = false;
        self.users_selection = 0;
        self.devices_selection = 0;
        self.dialog = None;
        self.confirm = None;
        self.in_flight.clear();
        self.dialog_epoch += 1;
        self.users_epoch += 1;
        self.devices_epoch += 1;
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    fn ticket(&self, view: u64) -> Ticket {
        Ticket {
            session: self.session.session_epoch(),
            view,
        }
    }

    fn is_current_session(&self, ticket: &Ticket) -> bool {
        ticket.session.is_some() && ticket.session == self.session.session_epoch()
    }

    /// Helper to send task results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send task result - channel closed");
        }
    }

    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = task.await;
            Self::send_result(&tx, result).await;
        });
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.task_rx.try_recv() {
            results.push(result);
        }
        for result in results {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::LoggedIn { result, remember } => self.finish_login(result, remember),
            TaskResult::Users { ticket, result } => {
                if ticket.view != self.users_epoch || !self.is_current_session(&ticket) {
                    debug!("Dropping stale user list");
                    return;
                }
                self.in_flight.remove(&InFlight::UserList);
                match result {
                    Ok(users) => {
                        self.users = users;
                        self.users_loaded = true;
                        self.users_selection = clamp_selection(self.users_selection, self.users.len());
                    }
                    Err(e) => self.report_error(Operation::ListUsers, &e),
                }
            }
            TaskResult::Devices { ticket, result } => {
                if ticket.view != self.devices_epoch || !self.is_current_session(&ticket) {
                    debug!("Dropping stale device list");
                    return;
                }
                self.in_flight.remove(&InFlight::DeviceList);
                match result {
                    Ok(devices) => {
                        self.devices = devices;
                        self.devices_loaded = true;
                        self.devices_selection =
                            clamp_selection(self.devices_selection, self.devices.len());
                    }
                    Err(e) => self.report_error(Operation::ListDevices, &e),
                }
            }
            TaskResult::DeviceDetail { ticket, result } => {
                if ticket.view != self.dialog_epoch || !self.is_current_session(&ticket) {
                    return;
                }
                match result {
                    Ok(device) => {
                        if let Some(Dialog::Device(draft)) = self.dialog.as_mut() {
                            if !draft.refresh_from(&device) {
                                debug!("Keeping edited device draft");
                            }
                        }
                    }
                    Err(e) => self.report_error(Operation::GetDevice, &e),
                }
            }
            TaskResult::DialogSaved {
                ticket,
                operation,
                result,
                success,
            } => {
                if !self.is_current_session(&ticket) {
                    return;
                }
                // Only one submit is outstanding per session, and this was it
                self.in_flight.remove(&InFlight::DialogSubmit);
                if ticket.view != self.dialog_epoch {
                    debug!(op = %operation, "Dropping result for closed dialog");
                    return;
                }
                match result {
                    Ok(()) => {
                        self.close_dialog();
                        self.notifications.success(success);
                        self.reload_after(operation);
                    }
                    Err(ApiError::Validation(errors)) => self.set_dialog_errors(errors),
                    Err(e) => self.report_error(operation, &e),
                }
            }
            TaskResult::RowMutated {
                ticket,
                operation,
                result,
                success,
            } => {
                if !self.is_current_session(&ticket) {
                    return;
                }
                self.in_flight.remove(&InFlight::RowMutation);
                match result {
                    Ok(()) => {
                        self.notifications.success(success);
                        self.reload_after(operation);
                    }
                    Err(e) => self.report_error(operation, &e),
                }
            }
        }
    }

    /// Surface a failed call. Auth failures are left to the forced-logout path.
    fn report_error(&mut self, operation: Operation, err: &ApiError) {
        if err.kind() == ErrorKind::Auth {
            debug!(op = %operation, "Auth failure, session teardown pending");
            return;
        }
        error!(op = %operation, error = %err, "Request failed");
        self.notifications.error(err.user_message(operation));
    }

    fn reload_after(&mut self, operation: Operation) {
        match operation {
            Operation::CreateDevice | Operation::UpdateDevice | Operation::DeleteDevice => {
                self.load_devices();
                // Device names appear in the user table
                self.load_users();
            }
            _ => self.load_users(),
        }
    }

    // =========================================================================
    // Lists
    // =========================================================================

    pub fn load_all(&mut self) {
        self.load_users();
        self.load_devices();
    }

    pub fn load_users(&mut self) {
        self.users_epoch += 1;
        self.in_flight.insert(InFlight::UserList);
        let ticket = self.ticket(self.users_epoch);
        let keyword = self.users_keyword.clone();
        let api = self.session.api().clone();
        self.spawn_task(async move {
            TaskResult::Users {
                ticket,
                result: api.list_users(&keyword).await,
            }
        });
    }

    pub fn load_devices(&mut self) {
        self.devices_epoch += 1;
        self.in_flight.insert(InFlight::DeviceList);
        let ticket = self.ticket(self.devices_epoch);
        let keyword = self.devices_keyword.clone();
        let api = self.session.api().clone();
        self.spawn_task(async move {
            TaskResult::Devices {
                ticket,
                result: api.list_devices(&keyword).await,
            }
        });
    }

    pub fn refresh_current_tab(&mut self) {
        match self.current_tab {
            Tab::Users => self.load_users(),
            Tab::Devices => self.load_devices(),
        }
    }

    pub fn start_search(&mut self) {
        self.search_input = self.current_keyword().to_string();
        self.state = AppState::Searching;
    }

    /// Apply the search box to the current tab and reload it
    pub fn apply_search(&mut self) {
        let keyword = self.search_input.trim().to_string();
        match self.current_tab {
            Tab::Users => {
                self.users_keyword = keyword;
                self.users_selection = 0;
            }
            Tab::Devices => {
                self.devices_keyword = keyword;
                self.devices_selection = 0;
            }
        }
        self.state = AppState::Normal;
        self.refresh_current_tab();
    }

    pub fn current_keyword(&self) -> &str {
        match self.current_tab {
            Tab::Users => &self.users_keyword,
            Tab::Devices => &self.devices_keyword,
        }
    }

    pub fn selected_user(&self) -> Option<&User> {
        self.users.get(self.users_selection)
    }

    pub fn selected_device(&self) -> Option<&Device> {
        self.devices.get(self.devices_selection)
    }

    /// Move the selection on the current tab by `delta` rows
    pub fn move_selection(&mut self, delta: isize) {
        let (selection, len) = match self.current_tab {
            Tab::Users => (&mut self.users_selection, self.users.len()),
            Tab::Devices => (&mut self.devices_selection, self.devices.len()),
        };
        let max = len.saturating_sub(1) as isize;
        *selection = (*selection as isize + delta).clamp(0, max) as usize;
    }

    pub fn select_first(&mut self) {
        match self.current_tab {
            Tab::Users => self.users_selection = 0,
            Tab::Devices => self.devices_selection = 0,
        }
    }

    pub fn select_last(&mut self) {
        match self.current_tab {
            Tab::Users => self.users_selection = self.users.len().saturating_sub(1),
            Tab::Devices => self.devices_selection = self.devices.len().saturating_sub(1),
        }
    }

    /// Label for a user's device: name, external id, or a marker when the
    /// device is unset or no longer listed
    pub fn device_label(&self, device_id: Option<&RecordId>) -> String {
        match device_id {
            None => "Chưa gán thiết bị".to_string(),
            Some(id) => match self.devices.iter().find(|d| &d.id == id) {
                Some(device) => device.display_name().to_string(),
                None => format!("#{} (không rõ)", id),
            },
        }
    }

    // =========================================================================
    // Dialogs
    // =========================================================================

    /// Show `dialog`, unless an earlier submit has not settled yet
    fn open_dialog(&mut self, dialog: Dialog) -> bool {
        if self.refuse_while_busy(InFlight::DialogSubmit) {
            return false;
        }
        self.dialog_epoch += 1;
        self.dialog = Some(dialog);
        self.state = AppState::Dialog;
        true
    }

    /// Close the dialog. A pending submit stays in flight until it settles.
    pub fn close_dialog(&mut self) {
        self.dialog_epoch += 1;
        self.dialog = None;
        if self.state == AppState::Dialog {
            self.state = AppState::Normal;
        }
    }

    pub fn open_create_user(&mut self) {
        self.open_dialog(Dialog::CreateUser(UserDraft::new()));
    }

    pub fn open_change_device(&mut self) {
        if let Some(user) = self.selected_user() {
            let picker = DevicePicker::for_user(user, &self.devices);
            self.open_dialog(Dialog::ChangeDevice(picker));
        }
    }

    pub fn open_create_device(&mut self) {
        self.open_dialog(Dialog::Device(DeviceDraft::new()));
    }

    /// Open the edit dialog prefilled from the list, then fetch a fresh copy
    pub fn open_edit_device(&mut self) {
        let Some(device) = self.selected_device().cloned() else {
            return;
        };
        if !self.open_dialog(Dialog::Device(DeviceDraft::edit(&device))) {
            return;
        }

        let ticket = self.ticket(self.dialog_epoch);
        let api = self.session.api().clone();
        self.spawn_task(async move {
            TaskResult::DeviceDetail {
                ticket,
                result: api.get_device(&device.id).await,
            }
        });
    }

    fn set_dialog_errors(&mut self, errors: ValidationErrors) {
        match self.dialog.as_mut() {
            Some(Dialog::CreateUser(draft)) => draft.errors = errors,
            Some(Dialog::Device(draft)) => draft.errors = errors,
            Some(Dialog::ChangeDevice(_)) | None => {}
        }
    }

    /// Validate the open dialog and send it
    pub fn submit_dialog(&mut self) {
        if self.is_busy(InFlight::DialogSubmit) {
            return;
        }
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        let api = self.session.api().clone();

        match dialog {
            Dialog::CreateUser(draft) => {
                let user = draft.to_new_user(&self.devices);
                if let Err(errors) = user.validate() {
                    draft.errors = errors;
                    return;
                }
                draft.errors = ValidationErrors::new();
                self.start_dialog_submit(Operation::CreateUser, "Tạo người dùng thành công!".into(), async move {
                    api.create_user(&user).await
                });
            }
            Dialog::ChangeDevice(picker) => {
                let user_id = picker.user_id.clone();
                let device_id = picker.chosen(&self.devices);
                let success = format!("Thay đổi thiết bị cho \"{}\" thành công!", picker.username);
                self.start_dialog_submit(Operation::ChangeDevice, success, async move {
                    api.change_device(&user_id, device_id).await
                });
            }
            Dialog::Device(draft) => {
                if let Err(errors) = draft.form.validate() {
                    draft.errors = errors;
                    return;
                }
                draft.errors = ValidationErrors::new();
                let form = draft.form.clone();
                match draft.id.clone() {
                    Some(id) => {
                        let success = format!("Cập nhật thiết bị \"{}\" thành công!", form.label());
                        self.start_dialog_submit(Operation::UpdateDevice, success, async move {
                            api.update_device(&id, &form).await
                        });
                    }
                    None => {
                        self.start_dialog_submit(
                            Operation::CreateDevice,
                            "Tạo thiết bị thành công!".into(),
                            async move { api.create_device(&form).await },
                        );
                    }
                }
            }
        }
    }

    fn start_dialog_submit<F>(&mut self, operation: Operation, success: String, call: F)
    where
        F: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        self.in_flight.insert(InFlight::DialogSubmit);
        let ticket = self.ticket(self.dialog_epoch);
        self.spawn_task(async move {
            TaskResult::DialogSaved {
                ticket,
                operation,
                result: call.await,
                success,
            }
        });
    }

    // =========================================================================
    // Confirmations
    // =========================================================================

    pub fn ask_confirm(&mut self, action: ConfirmAction) {
        self.confirm = Some(action);
        self.state = AppState::Confirming;
    }

    pub fn confirm_reset_password(&mut self) {
        if let Some(user) = self.selected_user() {
            let action = ConfirmAction::ResetPassword {
                id: user.id.clone(),
                username: user.username.clone(),
            };
            self.ask_confirm(action);
        }
    }

    pub fn confirm_delete_user(&mut self) {
        if let Some(user) = self.selected_user() {
            let action = ConfirmAction::DeleteUser {
                id: user.id.clone(),
                username: user.username.clone(),
            };
            self.ask_confirm(action);
        }
    }

    pub fn confirm_delete_device(&mut self) {
        if let Some(device) = self.selected_device() {
            let action = ConfirmAction::DeleteDevice {
                id: device.id.clone(),
                name: device.name_or_placeholder().to_string(),
            };
            self.ask_confirm(action);
        }
    }

    pub fn cancel_confirm(&mut self) {
        self.confirm = None;
        self.state = AppState::Normal;
    }

    /// Run the confirmed action
    pub fn accept_confirm(&mut self) {
        let Some(action) = self.confirm.take() else {
            return;
        };
        self.state = AppState::Normal;

        if action == ConfirmAction::Logout {
            self.logout();
            return;
        }
        if self.refuse_while_busy(InFlight::RowMutation) {
            return;
        }

        let api = self.session.api().clone();
        match action {
            ConfirmAction::ResetPassword { id, username } => {
                let success = format!("Reset mật khẩu cho \"{}\" thành công!", username);
                self.start_row_mutation(Operation::ResetPassword, success, async move {
                    api.reset_password(&id).await
                });
            }
            ConfirmAction::DeleteUser { id, username } => {
                let success = format!("Xóa người dùng \"{}\" thành công!", username);
                self.start_row_mutation(Operation::DeleteUser, success, async move {
                    api.delete_user(&id).await
                });
            }
            ConfirmAction::DeleteDevice { id, name } => {
                let success = format!("Xóa thiết bị \"{}\" thành công!", name);
                self.start_row_mutation(Operation::DeleteDevice, success, async move {
                    api.delete_device(&id).await
                });
            }
            ConfirmAction::Logout => {}
        }
    }

    fn start_row_mutation<F>(&mut self, operation: Operation, success: String, call: F)
    where
        F: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        self.in_flight.insert(InFlight::RowMutation);
        let ticket = self.ticket(0);
        self.spawn_task(async move {
            TaskResult::RowMutated {
                ticket,
                operation,
                result: call.await,
                success,
            }
        });
    }
}

fn clamp_selection(selection: usize, len: usize) -> usize {
    selection.min(len.saturating_sub(1))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use fleetdesk_core::auth::{FileCredentialStore, Session, UserIdentity};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_for(server: &MockServer, logged_in: bool) -> (App, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        if logged_in {
            store
                .save(&Session::new(
                    UserIdentity::new("voanhdung", Some("admin")),
                    "tok-admin".to_string(),
                ))
                .unwrap();
        }
        let config = Config {
            api_base_url: server.uri(),
            ..Config::default()
        };
        let app = App::new(&config, Arc::new(store)).unwrap();
        (app, dir)
    }

    /// Wait for the next background result and apply it
    async fn settle(app: &mut App) {
        let result = app.task_rx.recv().await.unwrap();
        app.process_task_result(result);
    }

    fn messages(app: &App) -> Vec<String> {
        app.notifications.iter().map(|n| n.message.clone()).collect()
    }

    async fn mount_lists(server: &MockServer, users: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/users"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": users})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [{"id": 4, "external_id": "DEV-04", "name": "Kho A"}]
            })))
            .mount(server)
            .await;
    }

    // -------------------------------------------------------------------------
    // Tab Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_tab_next() {
        assert_eq!(Tab::Users.next(), Tab::Devices);
        assert_eq!(Tab::Devices.next(), Tab::Users);
    }

    #[test]
    fn test_tab_prev() {
        assert_eq!(Tab::Users.prev(), Tab::Devices);
        assert_eq!(Tab::Devices.prev(), Tab::Users);
    }

    #[test]
    fn test_login_focus_cycles() {
        assert_eq!(LoginFocus::Username.next(), LoginFocus::Password);
        assert_eq!(LoginFocus::Button.next(), LoginFocus::Username);
        assert_eq!(LoginFocus::Username.prev(), LoginFocus::Button);
    }

    #[test]
    fn test_clamp_selection() {
        assert_eq!(clamp_selection(5, 3), 2);
        assert_eq!(clamp_selection(1, 3), 1);
        assert_eq!(clamp_selection(4, 0), 0);
    }

    // -------------------------------------------------------------------------
    // Flow Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_shows_welcome_and_loads_lists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("authorization", "tok-1")
                    .set_body_json(json!({
                        "success": true,
                        "data": {"username": "voanhdung", "role": "admin"}
                    })),
            )
            .mount(&server)
            .await;
        mount_lists(&server, json!([{"id": 1, "username": "lan", "device_id": 4}])).await;
        let (mut app, _dir) = app_for(&server, false);

        app.start();
        assert_eq!(app.state, AppState::LoggingIn);
        app.login_username = "voanhdung".into();
        app.login_password = "12345678".into();
        app.submit_login();
        assert!(app.is_busy(InFlight::Login));

        // Duplicate submission is refused while the first is pending
        app.submit_login();

        settle(&mut app).await;
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.current_username(), Some("voanhdung"));
        assert!(messages(&app).contains(&"Chào mừng voanhdung!".to_string()));
        assert!(app.login_password.is_empty());

        settle(&mut app).await;
        settle(&mut app).await;
        assert_eq!(app.users.len(), 1);
        assert_eq!(app.device_label(app.users[0].device_id.as_ref()), "Kho A");
        assert!(app.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_short_password_shows_inline_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, false);
        app.start_login();
        app.login_username = "voanhdung".into();
        app.login_password = "123".into();

        app.submit_login();
        assert!(app.login_errors.get("password").is_some());
        assert!(!app.is_busy(InFlight::Login));
        assert_eq!(app.state, AppState::LoggingIn);
    }

    #[tokio::test]
    async fn test_delete_user_refreshes_list() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/users/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, true);
        app.users = vec![User {
            id: RecordId::Int(7),
            username: "lan".into(),
            device_id: None,
            updated_at: None,
        }];
        mount_lists(&server, json!([{"id": 8, "username": "minh"}])).await;

        app.confirm_delete_user();
        assert_eq!(app.state, AppState::Confirming);
        app.accept_confirm();
        settle(&mut app).await;
        assert!(messages(&app).contains(&"Xóa người dùng \"lan\" thành công!".to_string()));

        settle(&mut app).await;
        assert!(app.users.iter().all(|u| u.id != RecordId::Int(7)));
    }

    #[tokio::test]
    async fn test_empty_external_id_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, true);

        app.open_create_device();
        app.submit_dialog();
        match app.dialog.as_ref() {
            Some(Dialog::Device(draft)) => {
                assert_eq!(
                    draft.errors.get("external_id"),
                    Some("Mã thiết bị không được để trống")
                );
            }
            other => panic!("dialog should stay open, got {:?}", other),
        }
        assert!(!app.is_busy(InFlight::DialogSubmit));
    }

    #[tokio::test]
    async fn test_create_device_failure_keeps_dialog_open() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Mã thiết bị đã tồn tại"
            })))
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, true);

        app.open_create_device();
        if let Some(Dialog::Device(draft)) = app.dialog.as_mut() {
            draft.form.external_id = "DEV-01".into();
        }
        app.submit_dialog();
        settle(&mut app).await;

        assert!(app.dialog.is_some());
        assert_eq!(app.notifications.latest().unwrap().message, "Mã thiết bị đã tồn tại");
        assert_eq!(app.notifications.latest().unwrap().kind, NotificationKind::Error);
    }

    #[tokio::test]
    async fn test_result_for_closed_dialog_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, true);

        app.open_create_device();
        if let Some(Dialog::Device(draft)) = app.dialog.as_mut() {
            draft.form.external_id = "DEV-01".into();
        }
        app.submit_dialog();
        app.close_dialog();
        assert!(app.is_busy(InFlight::DialogSubmit));
        settle(&mut app).await;

        assert!(app.notifications.is_empty());
        assert!(!app.is_busy(InFlight::DeviceList));
        assert!(!app.is_busy(InFlight::DialogSubmit));
    }

    #[tokio::test]
    async fn test_reopening_dialog_waits_for_pending_submit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/devices"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true}))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, true);

        for _ in 0..2 {
            app.open_create_device();
            if let Some(Dialog::Device(draft)) = app.dialog.as_mut() {
                draft.form.external_id = "DEV-01".into();
            }
            app.submit_dialog();
            app.close_dialog();
        }
        assert!(app.dialog.is_none());
        assert_eq!(messages(&app), vec![BUSY_MESSAGE.to_string()]);

        settle(&mut app).await;
        assert!(!app.is_busy(InFlight::DialogSubmit));
        app.open_create_device();
        assert!(app.dialog.is_some());
    }

    #[tokio::test]
    async fn test_confirm_while_row_mutation_pending_shows_notice() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/users/7"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, true);
        app.in_flight.insert(InFlight::RowMutation);

        app.ask_confirm(ConfirmAction::DeleteUser {
            id: RecordId::Int(7),
            username: "lan".into(),
        });
        app.accept_confirm();

        assert_eq!(app.state, AppState::Normal);
        assert!(app.confirm.is_none());
        let notice = app.notifications.latest().unwrap();
        assert_eq!(notice.message, BUSY_MESSAGE);
        assert_eq!(notice.kind, NotificationKind::Warning);
    }

    #[tokio::test]
    async fn test_forced_logout_returns_to_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, true);
        app.state = AppState::Normal;

        app.load_users();
        settle(&mut app).await;
        app.tick();

        assert_eq!(app.state, AppState::LoggingIn);
        assert!(!app.session.is_authenticated());
        assert_eq!(
            app.notifications.latest().unwrap().message,
            SESSION_EXPIRED_MESSAGE
        );
        assert!(app.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let (mut app, _dir) = app_for(&server, true);
        app.users = vec![User {
            id: RecordId::Int(1),
            username: "lan".into(),
            device_id: None,
            updated_at: None,
        }];

        app.ask_confirm(ConfirmAction::Logout);
        app.accept_confirm();

        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.users.is_empty());
        assert!(!app.session.is_authenticated());
        assert_eq!(app.notifications.latest().unwrap().message, LOGGED_OUT_MESSAGE);
    }

    #[tokio::test]
    async fn test_dangling_device_is_labelled() {
        let server = MockServer::start().await;
        let (app, _dir) = app_for(&server, true);
        assert_eq!(app.device_label(None), "Chưa gán thiết bị");
        assert_eq!(app.device_label(Some(&RecordId::Int(99))), "#99 (không rõ)");
    }
}

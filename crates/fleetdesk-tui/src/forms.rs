//! Dialog and confirmation state for the create/edit flows.
//!
//! Each dialog owns a draft of the record being edited, the focused field and
//! the inline validation errors from the last submit attempt.

use fleetdesk_core::models::{Device, DeviceForm, NewUser, RecordId, User};
use fleetdesk_core::validation::ValidationErrors;

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for the login username.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password inputs.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for other dialog text fields
const MAX_FIELD_LENGTH: usize = 100;

/// Maximum length for the device description
const MAX_DESCRIPTION_LENGTH: usize = 255;

// ============================================================================
// Input helpers
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

fn can_add_field_char(current_len: usize, max_len: usize, c: char) -> bool {
    current_len < max_len && is_valid_input_char(c)
}

fn push_char(field: &mut String, max_len: usize, c: char) -> bool {
    if can_add_field_char(field.chars().count(), max_len, c) {
        field.push(c);
        true
    } else {
        false
    }
}

// ============================================================================
// Create user
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Username,
    Password,
    Device,
    Submit,
}

impl UserField {
    pub fn next(&self) -> Self {
        match self {
            UserField::Username => UserField::Password,
            UserField::Password => UserField::Device,
            UserField::Device => UserField::Submit,
            UserField::Submit => UserField::Username,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            UserField::Username => UserField::Submit,
            UserField::Password => UserField::Username,
            UserField::Device => UserField::Password,
            UserField::Submit => UserField::Device,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserDraft {
    pub username: String,
    pub password: String,
    /// 0 means no device, otherwise an index into the device list plus one
    pub device_choice: usize,
    pub focus: UserField,
    pub errors: ValidationErrors,
}

impl UserDraft {
    pub fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            device_choice: 0,
            focus: UserField::Username,
            errors: ValidationErrors::new(),
        }
    }

    /// Both required fields filled in
    pub fn can_submit(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }

    pub fn push_char(&mut self, c: char) {
        match self.focus {
            UserField::Username => {
                push_char(&mut self.username, MAX_FIELD_LENGTH, c);
            }
            UserField::Password => {
                if can_add_password_char(self.password.chars().count(), c) {
                    self.password.push(c);
                }
            }
            UserField::Device | UserField::Submit => {}
        }
    }

    pub fn pop_char(&mut self) {
        match self.focus {
            UserField::Username => {
                self.username.pop();
            }
            UserField::Password => {
                self.password.pop();
            }
            UserField::Device | UserField::Submit => {}
        }
    }

    /// Step through "no device" and every listed device
    pub fn cycle_device(&mut self, device_count: usize, forward: bool) {
        let options = device_count + 1;
        self.device_choice = if forward {
            (self.device_choice + 1) % options
        } else {
            (self.device_choice + options - 1) % options
        };
    }

    pub fn to_new_user(&self, devices: &[Device]) -> NewUser {
        NewUser {
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            device_id: choice_to_device(self.device_choice, devices),
        }
    }
}

// ============================================================================
// Change device
// ============================================================================

#[derive(Debug, Clone)]
pub struct DevicePicker {
    pub user_id: RecordId,
    pub username: String,
    /// 0 means unassign, otherwise an index into the device list plus one
    pub selection: usize,
}

impl DevicePicker {
    /// Start on the user's current device
    pub fn for_user(user: &User, devices: &[Device]) -> Self {
        let selection = user
            .device_id
            .as_ref()
            .and_then(|id| devices.iter().position(|d| &d.id == id))
            .map(|i| i + 1)
            .unwrap_or(0);
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            selection,
        }
    }

    pub fn move_selection(&mut self, device_count: usize, delta: isize) {
        let max = device_count as isize;
        self.selection = (self.selection as isize + delta).clamp(0, max) as usize;
    }

    pub fn chosen(&self, devices: &[Device]) -> Option<RecordId> {
        choice_to_device(self.selection, devices)
    }
}

fn choice_to_device(choice: usize, devices: &[Device]) -> Option<RecordId> {
    choice
        .checked_sub(1)
        .and_then(|i| devices.get(i))
        .map(|d| d.id.clone())
}

// ============================================================================
// Create / edit device
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceField {
    ExternalId,
    Name,
    Description,
    Submit,
}

impl DeviceField {
    pub fn next(&self) -> Self {
        match self {
            DeviceField::ExternalId => DeviceField::Name,
            DeviceField::Name => DeviceField::Description,
            DeviceField::Description => DeviceField::Submit,
            DeviceField::Submit => DeviceField::ExternalId,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            DeviceField::ExternalId => DeviceField::Submit,
            DeviceField::Name => DeviceField::ExternalId,
            DeviceField::Description => DeviceField::Name,
            DeviceField::Submit => DeviceField::Description,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceDraft {
    /// Set when editing an existing device
    pub id: Option<RecordId>,
    pub form: DeviceForm,
    pub focus: DeviceField,
    pub errors: ValidationErrors,
    /// The user changed something since the dialog opened
    pub touched: bool,
}

impl DeviceDraft {
    pub fn new() -> Self {
        Self {
            id: None,
            form: DeviceForm::default(),
            focus: DeviceField::ExternalId,
            errors: ValidationErrors::new(),
            touched: false,
        }
    }

    pub fn edit(device: &Device) -> Self {
        Self {
            id: Some(device.id.clone()),
            form: DeviceForm::from_device(device),
            ..Self::new()
        }
    }

    pub fn is_edit(&self) -> bool {
        self.id.is_some()
    }

    pub fn can_submit(&self) -> bool {
        !self.form.external_id.trim().is_empty()
    }

    pub fn push_char(&mut self, c: char) {
        let changed = match self.focus {
            DeviceField::ExternalId => push_char(&mut self.form.external_id, MAX_FIELD_LENGTH, c),
            DeviceField::Name => push_char(&mut self.form.name, MAX_FIELD_LENGTH, c),
            DeviceField::Description => {
                push_char(&mut self.form.description, MAX_DESCRIPTION_LENGTH, c)
            }
            DeviceField::Submit => false,
        };
        self.touched |= changed;
    }

    pub fn pop_char(&mut self) {
        let removed = match self.focus {
            DeviceField::ExternalId => self.form.external_id.pop(),
            DeviceField::Name => self.form.name.pop(),
            DeviceField::Description => self.form.description.pop(),
            DeviceField::Submit => None,
        };
        self.touched |= removed.is_some();
    }

    /// Replace the draft with a freshly fetched record, unless the user
    /// already started editing. Returns whether it was applied.
    pub fn refresh_from(&mut self, device: &Device) -> bool {
        if self.touched || self.id.as_ref() != Some(&device.id) {
            return false;
        }
        self.form = DeviceForm::from_device(device);
        true
    }
}

// ============================================================================
// Dialogs and confirmations
// ============================================================================

#[derive(Debug, Clone)]
pub enum Dialog {
    CreateUser(UserDraft),
    ChangeDevice(DevicePicker),
    Device(DeviceDraft),
}

/// A destructive action waiting for a yes/no answer
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmAction {
    ResetPassword { id: RecordId, username: String },
    DeleteUser { id: RecordId, username: String },
    DeleteDevice { id: RecordId, name: String },
    Logout,
}

impl ConfirmAction {
    pub fn prompt(&self) -> String {
        match self {
            ConfirmAction::ResetPassword { username, .. } => format!(
                "Bạn có chắc chắn muốn reset mật khẩu cho người dùng \"{}\"?",
                username
            ),
            ConfirmAction::DeleteUser { username, .. } => {
                format!("Bạn có chắc chắn muốn xóa người dùng \"{}\"?", username)
            }
            ConfirmAction::DeleteDevice { name, .. } => {
                format!("Bạn có chắc chắn muốn xóa thiết bị \"{}\"?", name)
            }
            ConfirmAction::Logout => "Bạn có chắc chắn muốn đăng xuất?".to_string(),
        }
    }
}

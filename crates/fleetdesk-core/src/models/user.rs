use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::validation::{require, ValidationErrors};

/// A managed user account as listed by `/api/users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub username: String,
    #[serde(default)]
    pub device_id: Option<RecordId>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of `POST /api/users/register`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    /// Serialized as `null` when no device is assigned
    pub device_id: Option<RecordId>,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(
            &mut errors,
            "username",
            &self.username,
            "Tên đăng nhập không được để trống",
        );
        if self.password.is_empty() {
            errors.add("password", "Mật khẩu không được để trống");
        }
        errors.into_result()
    }
}

/// Body of `PATCH /api/users/changedevice/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAssignment {
    pub device_id: Option<RecordId>,
}

use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::validation::{require, ValidationErrors};

/// Label shown for a device that has neither a name nor an external id.
pub const UNNAMED_DEVICE: &str = "Chưa đặt tên";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: RecordId,
    pub external_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Device {
    /// Name if set, otherwise the external id.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ if !self.external_id.is_empty() => &self.external_id,
            _ => UNNAMED_DEVICE,
        }
    }

    pub fn name_or_placeholder(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => UNNAMED_DEVICE,
        }
    }
}

/// Body of `POST /api/devices` and `PATCH /api/devices/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceForm {
    pub external_id: String,
    pub name: String,
    pub description: String,
}

impl DeviceForm {
    /// Prefill an edit form from an existing device
    pub fn from_device(device: &Device) -> Self {
        Self {
            external_id: device.external_id.clone(),
            name: device.name.clone().unwrap_or_default(),
            description: device.description.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(
            &mut errors,
            "external_id",
            &self.external_id,
            "Mã thiết bị không được để trống",
        );
        errors.into_result()
    }

    /// Label used in notifications after a save
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.external_id
        } else {
            &self.name
        }
    }
}

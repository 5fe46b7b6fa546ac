//! Device endpoints.

use tracing::info;

use super::{ApiClient, ApiError, Operation};
use crate::models::{Device, DeviceForm, RecordId};

impl ApiClient {
    /// List devices, filtered by `keyword` (empty for all)
    pub async fn list_devices(&self, keyword: &str) -> Result<Vec<Device>, ApiError> {
        self.request(
            Operation::ListDevices,
            &["api", "devices"],
            &[("keyword", keyword.trim())],
            None::<&()>,
        )
        .await
    }

    pub async fn get_device(&self, id: &RecordId) -> Result<Device, ApiError> {
        let id = id.to_string();
        self.request(Operation::GetDevice, &["api", "devices", &id], &[], None::<&()>)
            .await
    }

    pub async fn create_device(&self, form: &DeviceForm) -> Result<(), ApiError> {
        form.validate()?;
        self.request_unit(Operation::CreateDevice, &["api", "devices"], Some(form))
            .await?;
        info!(external_id = %form.external_id, "Device created");
        Ok(())
    }

    pub async fn update_device(&self, id: &RecordId, form: &DeviceForm) -> Result<(), ApiError> {
        form.validate()?;
        let id = id.to_string();
        self.request_unit(Operation::UpdateDevice, &["api", "devices", &id], Some(form))
            .await
    }

    pub async fn delete_device(&self, id: &RecordId) -> Result<(), ApiError> {
        let segment = id.to_string();
        self.request_unit(Operation::DeleteDevice, &["api", "devices", &segment], None::<&()>)
            .await?;
        info!(id = %id, "Device deleted");
        Ok(())
    }
}

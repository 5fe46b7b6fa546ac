//! User account endpoints.

use tracing::info;

use super::{ApiClient, ApiError, Operation};
use crate::models::{DeviceAssignment, NewUser, RecordId, User};

impl ApiClient {
    /// List users, filtered by `keyword` (empty for all)
    pub async fn list_users(&self, keyword: &str) -> Result<Vec<User>, ApiError> {
        self.request(
            Operation::ListUsers,
            &["api", "users"],
            &[("keyword", keyword.trim())],
            None::<&()>,
        )
        .await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<(), ApiError> {
        user.validate()?;
        self.request_unit(Operation::CreateUser, &["api", "users", "register"], Some(user))
            .await?;
        info!(username = %user.username, "User created");
        Ok(())
    }

    pub async fn reset_password(&self, id: &RecordId) -> Result<(), ApiError> {
        let id = id.to_string();
        self.request_unit(Operation::ResetPassword, &["api", "users", "reset", &id], None::<&()>)
            .await
    }

    pub async fn delete_user(&self, id: &RecordId) -> Result<(), ApiError> {
        let segment = id.to_string();
        self.request_unit(Operation::DeleteUser, &["api", "users", &segment], None::<&()>)
            .await?;
        info!(id = %id, "User deleted");
        Ok(())
    }

    /// Assign a device to a user, or unassign with `None`
    pub async fn change_device(
        &self,
        user_id: &RecordId,
        device_id: Option<RecordId>,
    ) -> Result<(), ApiError> {
        let user_id = user_id.to_string();
        let body = DeviceAssignment { device_id };
        self.request_unit(
            Operation::ChangeDevice,
            &["api", "users", "changedevice", &user_id],
            Some(&body),
        )
            .await
    }
}

use serde::Deserialize;

use super::{ApiError, Operation};

/// The `{success, data?, message?}` wrapper around every backend response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    fn refused(message: Option<String>, operation: Operation) -> ApiError {
        ApiError::Application {
            message: message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| operation.rejection_message().to_string()),
        }
    }

    /// Unwrap the payload, turning `success: false` into an application error
    pub fn into_data(self, operation: Operation) -> Result<T, ApiError> {
        if !self.success {
            return Err(Self::refused(self.message, operation));
        }
        self.data.ok_or_else(|| {
            ApiError::InvalidResponse(format!("{} response carried no data", operation))
        })
    }

    /// Check the success flag of a response whose payload is not needed
    pub fn into_unit(self, operation: Operation) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(Self::refused(self.message, operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_success_with_data() {
        let env: Envelope<Vec<i64>> =
            serde_json::from_str(r#"{"success":true,"data":[1,2,3]}"#).unwrap();
        assert_eq!(env.into_data(Operation::ListUsers).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_failure_uses_backend_message() {
        let env: Envelope<Value> =
            serde_json::from_str(r#"{"success":false,"message":"Thiết bị đã tồn tại"}"#).unwrap();
        let err = env.into_unit(Operation::CreateDevice).unwrap_err();
        assert_eq!(err.user_message(Operation::CreateDevice), "Thiết bị đã tồn tại");
    }

    #[test]
    fn test_failure_without_message_uses_fallback() {
        let env: Envelope<Value> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        let err = env.into_unit(Operation::DeleteDevice).unwrap_err();
        assert_eq!(err.to_string(), "Không thể xóa thiết bị");
    }

    #[test]
    fn test_missing_success_flag_is_failure() {
        let env: Envelope<Value> = serde_json::from_str(r#"{"data":{}}"#).unwrap();
        assert!(env.into_data(Operation::GetDevice).is_err());
    }

    #[test]
    fn test_success_without_data_is_invalid() {
        let env: Envelope<Value> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        let err = env.into_data(Operation::GetDevice).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}

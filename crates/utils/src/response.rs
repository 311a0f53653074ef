use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Envelope wrapping every JSON body returned by the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_serializes_without_message() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": true, "data": 42, "message": null })
        );
    }

    #[test]
    fn error_carries_message_and_no_data() {
        let response = ApiResponse::<()>::error("Project not found");
        assert!(!response.is_success());
        assert_eq!(response.message(), Some("Project not found"));
        assert!(response.into_data().is_none());
    }
}

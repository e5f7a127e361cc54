use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// 传输层错误；业务失败（`success = false`）不经过这里
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        match error {
            AppErr::Domain(err) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", err.to_string())
            }
            AppErr::Log(err) => {
                error!(error = %err, "持久化日志不可用");
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    err.to_string(),
                )
            }
            AppErr::JoinRejected(reason) | AppErr::LeaveRejected(reason) => {
                ApiError::bad_request(reason)
            }
            AppErr::NotInRoom => ApiError::bad_request("not in any room"),
            other => ApiError::internal_server_error(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::LogError;

    #[test]
    fn log_failures_are_service_unavailable() {
        let err = ApiError::from(ApplicationError::Log(LogError::Connection(
            "refused".into(),
        )));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.body.code, "STORE_UNAVAILABLE");
    }

    #[test]
    fn domain_failures_are_bad_requests() {
        let err = ApiError::from(ApplicationError::Domain(
            domain::DomainError::invalid_argument("name", "must not be empty"),
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

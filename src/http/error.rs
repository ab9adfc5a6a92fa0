use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::CommerceError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": { "code": code, "message": message.into() } }))).into_response()
}

impl CommerceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ProductUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InsufficientStock { .. } | Self::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            Self::InternalInconsistency(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        if self.is_fatal() {
            tracing::error!(code = self.code(), error = %self, "request failed");
            return json_error(self.status(), self.code(), "internal server error");
        }
        json_error(self.status(), self.code(), self.to_string())
    }
}

impl From<JsonRejection> for CommerceError {
    fn from(rejection: JsonRejection) -> Self {
        CommerceError::validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for CommerceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CommerceError::validation(errors.to_string())
    }
}

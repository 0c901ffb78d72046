use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

/// An error the HTTP layer is ready to show the client.
#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

pub fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> AppError {
    AppError {
        status,
        code: code.into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_keeps_its_status() {
        let response = json_error(StatusCode::CONFLICT, "CONFLICT", "已存在").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response =
            json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "不存在").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

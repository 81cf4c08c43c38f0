use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    /// 请求参数有误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: anyhow::Error::msg(message.into()) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.status {
            StatusCode::INTERNAL_SERVER_ERROR => format!("Something went wrong: {}", self.error),
            _ => self.error.to_string(),
        };
        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: err.into() }
    }
}

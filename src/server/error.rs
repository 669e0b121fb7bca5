use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API错误类型
pub struct AppError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl AppError {
    /// 请求参数错误
    pub fn bad_request<M: std::fmt::Display + Send + Sync + 'static>(msg: M) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: anyhow::anyhow!("{}", msg) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, format!("Something went wrong: {}", self.error)).into_response()
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

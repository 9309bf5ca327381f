//! Error type mapping to HTTP status codes

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use tracing::error;

use super::types::ApiResponse;
use crate::errors::ShopRagError;

/// Error returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    /// Missing or wrong bearer token
    Unauthorized,
    /// Request body or parameters rejected
    Validation(String),
    /// Caller exceeded its request budget
    RateLimited,
    /// Everything raised by the service layer
    Service(ShopRagError),
}

impl From<ShopRagError> for ApiError {
    fn from(e: ShopRagError) -> Self {
        Self::Service(e)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::Service(ShopRagError::InvalidSignature) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Validation(_) | Self::Service(ShopRagError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::RateLimited | Self::Service(ShopRagError::RateLimited(_)) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Service(ShopRagError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Service(ShopRagError::ConfigError(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Service(e) if e.is_transient() => StatusCode::BAD_GATEWAY,
            Self::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::RateLimited => "Rate limit exceeded".to_string(),
            Self::Service(e) if status.is_server_error() => {
                error!("Request failed: {}", e);
                "Internal error".to_string()
            }
            Self::Service(e) => e.to_string(),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

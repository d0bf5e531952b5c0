use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use exchange_core::Error as ExchangeError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Identity provider error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for GatewayError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        GatewayError::Internal(format!("Token encoding error: {}", err))
    }
}

impl From<actix_web::error::BlockingError> for GatewayError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        GatewayError::Internal(format!("Blocking task failed: {}", err))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Upstream(err.to_string())
    }
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = if self.is_internal() {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Exchange(err) => match err {
                ExchangeError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
                ExchangeError::Forbidden(_) => StatusCode::FORBIDDEN,
                ExchangeError::NotFound(_) => StatusCode::NOT_FOUND,
                ExchangeError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
                ExchangeError::InsufficientFunds { .. } => StatusCode::FORBIDDEN,
                ExchangeError::Validation(_) => StatusCode::BAD_REQUEST,
                ExchangeError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl GatewayError {
    fn is_internal(&self) -> bool {
        match self {
            GatewayError::Exchange(err) => err.is_internal(),
            GatewayError::Internal(_) => true,
            _ => false,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            GatewayError::Exchange(err) => match err {
                ExchangeError::Unauthenticated(_) => "unauthorized",
                ExchangeError::Forbidden(_) => "forbidden",
                ExchangeError::NotFound(_) => "not_found",
                ExchangeError::InvalidOperation(_) => "invalid_operation",
                ExchangeError::InsufficientFunds { .. } => "insufficient_credits",
                ExchangeError::Validation(_) => "validation_error",
                ExchangeError::Conflict(_) => "conflict",
                _ => "internal_error",
            },
            GatewayError::Validation(_) => "validation_error",
            GatewayError::Unauthorized(_) => "unauthorized",
            GatewayError::Upstream(_) => "identity_provider_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

use actix_web::{HttpResponse, error::ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::ratelimit::RateWindow;
use crate::store::StoreError;

/// Every failure the gate can surface to a caller.
///
/// Validation failures deliberately collapse into the single opaque
/// [`GateError::TokenInvalid`] so that responses never reveal whether a
/// token was malformed, expired, tampered with or signed for another
/// subject. The precise cause is logged server side instead.
#[derive(Debug)]
pub enum GateError {
    Configuration(String),
    Issuance(String),
    TokenInvalid,
    TokenRevoked,
    IdentityMismatch(&'static str),
    QuotaExceeded(RateWindow),
    /// Client is serving a punishment window. `None` means the block is
    /// permanent and only lifts through an explicit absolve.
    ClientPunished(Option<Duration>),
    StoreUnavailable(String),
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    code: u16,
    message: String,
    error_type: String,
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Configuration(e) => write!(f, "Configuration error: {}", e),
            GateError::Issuance(e) => write!(f, "Issuance error: {}", e),
            GateError::TokenInvalid => write!(f, "token is invalid"),
            GateError::TokenRevoked => write!(f, "token is revoked"),
            GateError::IdentityMismatch(what) => write!(f, "current {} is not trusted", what),
            GateError::QuotaExceeded(window) => match window {
                RateWindow::Day => write!(f, "request quota reached, try again next day"),
                RateWindow::Month => write!(f, "request quota reached, try again next month"),
                window => write!(f, "too many requests, {} limit reached", window),
            },
            GateError::ClientPunished(Some(remaining)) => {
                write!(f, "client is blocked, try again in {}s", remaining.as_secs())
            }
            GateError::ClientPunished(None) => write!(f, "client is permanently blocked"),
            GateError::StoreUnavailable(e) => write!(f, "Shared store unavailable: {}", e),
        }
    }
}

impl StdError for GateError {}

impl ResponseError for GateError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_type) = match self {
            GateError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            GateError::Issuance(_) => (StatusCode::BAD_REQUEST, "issuance_error"),
            GateError::TokenInvalid => (StatusCode::UNAUTHORIZED, "token_invalid"),
            GateError::TokenRevoked => (StatusCode::UNAUTHORIZED, "token_revoked"),
            GateError::IdentityMismatch(_) => (StatusCode::UNAUTHORIZED, "identity_mismatch"),
            GateError::QuotaExceeded(_) => (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded"),
            GateError::ClientPunished(_) => (StatusCode::TOO_MANY_REQUESTS, "client_punished"),
            GateError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
        };

        let error_response = ErrorResponse {
            code: status_code.as_u16(),
            message: self.to_string(),
            error_type: error_type.to_string(),
        };

        HttpResponse::build(status_code).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GateError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Issuance(_) => StatusCode::BAD_REQUEST,
            GateError::TokenInvalid => StatusCode::UNAUTHORIZED,
            GateError::TokenRevoked => StatusCode::UNAUTHORIZED,
            GateError::IdentityMismatch(_) => StatusCode::UNAUTHORIZED,
            GateError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            GateError::ClientPunished(_) => StatusCode::TOO_MANY_REQUESTS,
            GateError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for GateError {
    fn from(error: StoreError) -> Self {
        GateError::StoreUnavailable(error.to_string())
    }
}

pub type GateResult<T> = Result<T, GateError>;

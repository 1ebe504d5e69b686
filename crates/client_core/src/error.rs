use reqwest::StatusCode;
use shared::error::ErrorResponse;
use thiserror::Error;

pub const INVALID_REQUEST_MESSAGE: &str = "invalid request";
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown error";
pub const TIMEOUT_MESSAGE: &str = "request timed out";
pub const SESSION_REPLACED_MESSAGE: &str = "signed in on another device; logging out";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    #[error("network failure: {0}")]
    Network(String),
    #[error("request rejected ({status}): {message}")]
    BadRequest { status: u16, message: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    #[error("server error ({status})")]
    Server { status: u16 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("an update for this item is already pending")]
    Pending,
}

impl ClientError {
    /// Maps a non-2xx response onto the client taxonomy.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let server_message = serde_json::from_slice::<ErrorResponse>(body)
            .ok()
            .and_then(|parsed| parsed.message)
            .filter(|message| !message.trim().is_empty());
        let code = status.as_u16();

        if status == StatusCode::UNAUTHORIZED {
            return Self::Unauthorized {
                message: server_message.unwrap_or_else(|| SESSION_REPLACED_MESSAGE.to_string()),
            };
        }
        if status.is_server_error() {
            return Self::Server { status: code };
        }
        Self::BadRequest {
            status: code,
            message: server_message.unwrap_or_else(|| INVALID_REQUEST_MESSAGE.to_string()),
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest { status, .. } | Self::Server { status } => Some(*status),
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::BadRequest { .. } => "bad_request",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Server { .. } => "server",
            Self::Validation(_) => "validation",
            Self::Decode(_) => "decode",
            Self::Pending => "pending",
        }
    }

    /// Text for the transient notification. Server internals stay hidden.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout | Self::Network(_) => TIMEOUT_MESSAGE.to_string(),
            Self::BadRequest { message, .. } | Self::Unauthorized { message } => message.clone(),
            Self::Server { .. } | Self::Decode(_) => UNKNOWN_ERROR_MESSAGE.to_string(),
            Self::Validation(message) => message.clone(),
            Self::Pending => self.to_string(),
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Normalized `{message, code, status}` shape.
    pub fn to_response(&self) -> ErrorResponse {
        let response = ErrorResponse::new(self.user_message()).with_code(self.code());
        match self.status() {
            Some(status) => response.with_status(status),
            None => response,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

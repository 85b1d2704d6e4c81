use shared::{
    domain::{Direction, Mode},
    error::DomainError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("robot unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("robot answered {url} with HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("cannot start {direction}: no connection to the robot")]
    RejectedCommand { direction: Direction },
    #[error("manual control is unavailable while the session is {mode}")]
    ManualModeInactive { mode: Mode },
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },
    #[error("invalid robot url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SessionError {
    /// Transport failures and non-success statuses both mean the robot could
    /// not be reached for practical purposes.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            SessionError::Unreachable { .. }
                | SessionError::HttpStatus { .. }
                | SessionError::InvalidUrl(_)
        )
    }
}

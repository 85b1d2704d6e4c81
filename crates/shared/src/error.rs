use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("speed {0} is outside the accepted range 0..=100")]
    InvalidSpeed(i64),
    #[error("unknown direction '{0}'")]
    UnknownDirection(String),
    #[error("unknown mode '{0}'")]
    UnknownMode(String),
}

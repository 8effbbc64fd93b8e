use thiserror::Error;

/// Failure talking to the remote food API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote API rate limit exceeded")]
    RateLimited,
    #[error("remote API unavailable (HTTP {0})")]
    Unavailable(u16),
    #[error("remote API timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed remote response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Whether retrying later might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NoNutrition(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{0}")]
    Invalid(String),
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("user {0} not found")]
    NotFound(i64),
    #[error("account is deactivated")]
    Inactive,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

use thiserror::Error;

/// Errors raised by key handling, identifier parsing and capability minting.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Malformed encoding or identifier (bad base64/hex, wrong length, bad resourceId)
    #[error("Format error: {0}")]
    Format(String),

    /// Input rejected before any signing took place
    #[error("Validation error: {0}")]
    Validation(String),

    /// Key material that decodes but is inconsistent or unusable
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Error surfaced by the biscuit library while building or parsing a token
    #[error("Biscuit error: {0}")]
    BiscuitError(#[from] biscuit_auth::error::Token),

    /// The token parsed but does not grant what was asked
    #[error("Verification error: {0}")]
    VerificationError(String),
}

impl TokenError {
    pub fn format(msg: impl Into<String>) -> Self {
        TokenError::Format(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        TokenError::Validation(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        TokenError::Crypto(msg.into())
    }

    pub fn verification(msg: impl Into<String>) -> Self {
        TokenError::VerificationError(msg.into())
    }
}

impl From<hex::FromHexError> for TokenError {
    fn from(err: hex::FromHexError) -> Self {
        TokenError::Format(format!("invalid hex: {}", err))
    }
}

impl From<base64::DecodeError> for TokenError {
    fn from(err: base64::DecodeError) -> Self {
        TokenError::Format(format!("invalid base64: {}", err))
    }
}

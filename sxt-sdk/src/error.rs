use std::fmt;

use thiserror::Error;

use sxt_api::ApiError;
use sxt_config::ConfigError;
use sxt_token::TokenError;

use crate::store::StoreError;

/// Errors that can occur in the SxT SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// API error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Token error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Credential store error
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Category of an [`SdkError`], for callers that branch on the kind of
/// failure rather than on its source crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input, rejected before any network call
    Validation,
    /// Malformed encoding or identifier
    Format,
    /// Inconsistent key material or a failed signature check
    Crypto,
    /// The gateway answered with an error status
    Remote,
    /// The session can no longer be refreshed
    Expiry,
    Config,
    Store,
    /// The request never got a usable answer
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Format => "format",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Remote => "remote",
            ErrorKind::Expiry => "expiry",
            ErrorKind::Config => "config",
            ErrorKind::Store => "store",
            ErrorKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::Config(_) => ErrorKind::Config,
            SdkError::Api(e) => api_kind(e),
            SdkError::Token(e) => token_kind(e),
            SdkError::Store(_) => ErrorKind::Store,
        }
    }

    /// Whether the caller must authenticate again from scratch
    pub fn is_expiry(&self) -> bool {
        self.kind() == ErrorKind::Expiry
    }
}

fn api_kind(error: &ApiError) -> ErrorKind {
    match error {
        ApiError::Validation(_) => ErrorKind::Validation,
        ApiError::Remote { .. } => ErrorKind::Remote,
        ApiError::Expiry(_) => ErrorKind::Expiry,
        ApiError::HttpClient(_) | ApiError::InvalidResponse(_) => ErrorKind::Transport,
        ApiError::Token(e) => token_kind(e),
    }
}

fn token_kind(error: &TokenError) -> ErrorKind {
    match error {
        TokenError::Format(_) => ErrorKind::Format,
        TokenError::Validation(_) => ErrorKind::Validation,
        TokenError::Crypto(_) | TokenError::VerificationError(_) => ErrorKind::Crypto,
        TokenError::BiscuitError(_) => ErrorKind::Format,
    }
}

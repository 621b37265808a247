//! Error types for the mc library

use thiserror::Error;

/// Main error type for the mc library
#[derive(Error, Debug)]
pub enum McError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Build error: {0}")]
    Build(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Transaction rejected: {}", .result_codes.join(", "))]
    Rejected { result_codes: Vec<String> },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding a structured request document.
///
/// The whole document is rejected on the first error; no mutators are
/// returned alongside one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed document: {0}")]
    Syntax(String),

    #[error("missing required field \"{field}\"")]
    MissingField { field: String },

    #[error("invalid field \"{field}\": {reason}")]
    Field { field: String, reason: String },

    #[error("field \"{0}\" may only be declared once")]
    Duplicate(String),

    #[error("\"{0}\" is not a valid transaction operation")]
    UnknownOperation(String),
}

/// Failures between us and the network endpoint.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<base64::DecodeError> for McError {
    fn from(err: base64::DecodeError) -> Self {
        McError::Encoding(err.to_string())
    }
}

impl From<reqwest::Error> for McError {
    fn from(err: reqwest::Error) -> Self {
        McError::Transport(TransportError::Http(err))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, McError>;

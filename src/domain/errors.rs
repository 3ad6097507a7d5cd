//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these. A fetch failure is always an
//! `Err`, never an empty result, so callers can tell "no revenue yet" from
//! "could not load revenue".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Transport failure or non-success status from the remote backend.
    #[error("Data gateway error: {0}")]
    Gateway(String),

    /// Backend rejected our credentials (401/403).
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Could not decode backend response: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("UI error: {0}")]
    Ui(String),

    /// A multi-step write stopped halfway; the message names what was stored.
    #[error("Write only partially applied: {0}")]
    PartialWrite(String),
}

impl DomainError {
    /// True for errors raised while talking to the backend (as opposed to local/input errors).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            DomainError::Gateway(_) | DomainError::Auth(_) | DomainError::Decode(_)
        )
    }
}

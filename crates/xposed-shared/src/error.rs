use thiserror::Error;

/// A stored or submitted string did not name a known enum variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Malformed principal token")]
    InvalidFormat,

    #[error("Principal token has expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid identity provider key")]
    InvalidKey,

    #[error("Claims serialization error: {0}")]
    Claims(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppealError {
    #[error("Appeal is already {0}")]
    AlreadyResolved(&'static str),

    #[error("Invalid action: {0:?}")]
    InvalidAction(String),
}

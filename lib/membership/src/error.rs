//! Error types for membership identifiers.

use ssfi_core::{ErrorKind, Role};
use std::fmt;

/// Errors from identifier formatting and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// A hierarchy code the role requires was not supplied.
    InvalidScope { role: Role, missing: &'static str },
    /// A hierarchy code is not 2–3 alphanumeric characters, or is the sentinel.
    InvalidCode { value: String, reason: &'static str },
    /// A prefix is empty or not uppercase alphanumeric.
    InvalidPrefix { value: String },
    /// Club-owner and student identifiers would share a prefix.
    AmbiguousPrefixes { prefix: String },
    /// The per-scope sequence ran past four digits.
    SequenceExhausted { scope: String },
    /// A string does not have the identifier shape.
    Malformed { value: String },
}

impl IdentifierError {
    /// Returns the client-visible classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidScope { .. } => ErrorKind::InvalidScope,
            Self::InvalidCode { .. }
            | Self::InvalidPrefix { .. }
            | Self::AmbiguousPrefixes { .. }
            | Self::Malformed { .. } => ErrorKind::Validation,
            Self::SequenceExhausted { .. } => ErrorKind::Conflict,
        }
    }
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidScope { role, missing } => {
                write!(f, "role {role} requires a {missing} code")
            }
            Self::InvalidCode { value, reason } => {
                write!(f, "invalid scope code '{value}': {reason}")
            }
            Self::InvalidPrefix { value } => {
                write!(f, "invalid identifier prefix '{value}'")
            }
            Self::AmbiguousPrefixes { prefix } => {
                write!(f, "club owner and student identifiers cannot share prefix '{prefix}'")
            }
            Self::SequenceExhausted { scope } => {
                write!(f, "identifier sequence exhausted for scope {scope}")
            }
            Self::Malformed { value } => {
                write!(f, "malformed membership identifier '{value}'")
            }
        }
    }
}

impl std::error::Error for IdentifierError {}

//! Error types surfaced by tracker operations.
//!
//! Every failure here is user-visible and leaves the encounter untouched.
//! Corrupt tracker documents are not errors: the store recovers them into an
//! empty encounter and reports that through [`crate::store::LoadOrigin`].

use crate::dice::DiceError;
use crate::store::MediumError;
use std::fmt;
use thiserror::Error;

/// What kind of thing a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Combatant,
    Ability,
    Kit,
    Effect,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Missing::Combatant => "Combatant",
            Missing::Ability => "Ability",
            Missing::Kit => "Kit",
            Missing::Effect => "Effect",
        };
        write!(f, "{label}")
    }
}

/// Coarse classification of a [`TrackerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Storage,
}

/// Errors from tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{what} '{name}' not found")]
    NotFound { what: Missing, name: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] MediumError),
}

impl TrackerError {
    pub fn not_found(what: Missing, name: impl Into<String>) -> Self {
        TrackerError::NotFound {
            what,
            name: name.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TrackerError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        TrackerError::Conflict(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::NotFound { .. } => ErrorKind::NotFound,
            TrackerError::Validation(_) => ErrorKind::Validation,
            TrackerError::Conflict(_) => ErrorKind::Conflict,
            TrackerError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<DiceError> for TrackerError {
    fn from(err: DiceError) -> Self {
        TrackerError::Validation(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TrackerError>;

//! Error types for the progression engine

use thiserror::Error;

/// Errors surfaced by the progression engine
#[derive(Debug, Error)]
pub enum ProgressionError {
    /// The achievement system (or the level system, for XP) is switched off
    #[error("progression system is disabled")]
    Disabled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("achievement already completed: {0}")]
    AlreadyCompleted(String),

    #[error("requirements not met for achievement: {0}")]
    RequirementsNotMet(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fact provider error: {0}")]
    FactSource(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The reward cascade ran past its iteration cap and was rolled back
    #[error("reward cascade exceeded {limit} steps")]
    CascadeLimitExceeded { limit: usize },

    #[error("progression database lock poisoned")]
    LockPoisoned,
}

impl ProgressionError {
    /// Whether this error is a user-facing refusal rather than an internal failure
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::AlreadyCompleted(_) | Self::RequirementsNotMet(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProgressionError>;

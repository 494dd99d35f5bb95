//! Error taxonomy for the recommendation engine.
//!
//! Mirrors the shape of the teacher's error enum (variants with constructors
//! and a classification method) but carries the engine's own taxonomy:
//! `InputInvalid`, `GenreUnresolved`, `NotFound`, `Conflict`, `Integrity`, and
//! a wrapped `Repository` fault for transient faults a collaborator could
//! not recover from locally. `Transient` itself is never a variant here: the
//! core recovers from cache misses and absent optional signals inline and
//! never surfaces them.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Body shape wrong, out-of-range rating, non-numeric preference value,
    /// too many genres. No state changed.
    #[error("invalid input: {message}")]
    InputInvalid { message: String },

    /// Public genre-name input could not be mapped unambiguously.
    #[error("could not resolve {} genre name(s)", not_found.len() + ambiguous.len())]
    GenreUnresolved {
        not_found: Vec<String>,
        ambiguous: Vec<String>,
        available_genres: Vec<String>,
    },

    /// Item id not present in the catalog.
    #[error("item not found: {item_id}")]
    NotFound { item_id: String },

    /// Registration-time duplicate (surface-contract only; core never raises
    /// this itself).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// A violated invariant. Fatal for the current operation; must not be
    /// caught inside the core.
    #[error("integrity violation: {message}")]
    Integrity { message: String },

    /// A repository or cache call failed in a way the core could not
    /// recover from locally (e.g. a hard storage timeout). The caller's
    /// concern per the engine's concurrency model.
    #[error("repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl Error {
    pub fn input_invalid(message: impl Into<String>) -> Self {
        Error::InputInvalid {
            message: message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Error::Integrity {
            message: message.into(),
        }
    }

    pub fn not_found(item_id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            item_id: item_id.to_string(),
        }
    }

    /// Whether this variant is safe to retry at the caller (used by batch
    /// evaluation to decide whether to skip a user or abort the run).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Repository(_))
    }
}

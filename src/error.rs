//! Domain errors that callers branch on.
//!
//! Everything else in the crate travels as `anyhow::Error`; these variants
//! convert into it transparently and can be recovered with
//! `err.downcast_ref::<DecodeError>()`.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// Fewer than two pseudo-trial bins per class, so no train/test split exists.
    #[error("too few trials: {n_per_class} per class gives {n_bins} bin(s) of {bin_size}, need at least 2")]
    TooFewTrials {
        n_per_class: usize,
        bin_size: usize,
        n_bins: usize,
    },

    /// The label vector does not hold exactly two classes.
    #[error("expected exactly 2 classes, found {found}")]
    ClassCount { found: usize },

    /// Two arrays that must agree along an axis do not.
    #[error("shape mismatch: {what} ({left} vs {right})")]
    ShapeMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    /// A required variable is absent from a MAT file.
    #[error("variable '{0}' not found in MAT file")]
    MissingVariable(String),

    /// A channel name was requested that the recording does not have.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
}

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the analysis routines.
///
/// Every failure terminates the single call that raised it. Apart from the
/// cell flip, which prepares all of its writes before committing any of them,
/// no routine mutates the scene, so an error leaves it untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied an argument outside the accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs periodic boundary conditions.
    #[error("{0} requires a periodic cell, but the scene is aperiodic")]
    NotPeriodic(&'static str),

    /// The inputs have no meaningful result (empty averages, singular bases).
    #[error("domain error: {0}")]
    Domain(String),

    /// No registered driver provides a required capability.
    #[error("missing capability: {0}")]
    MissingCapability(String),

    /// Error reported by an external collaborator (contact derivers, colliders).
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

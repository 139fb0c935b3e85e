use std::time::Duration;

use thiserror::Error;

use crate::accessor::AccessorError;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while waiting for the service to converge.
#[derive(Debug, Error)]
pub enum Error {
    /// The attempt budget ran out before the condition was reached. Carries
    /// the last observed value for diagnostics; always fatal to the calling
    /// scenario.
    #[error(
        "condition not reached after {attempts} attempts ({interval:?} apart), last observed: {last_observed}"
    )]
    ConvergenceTimeout {
        /// Number of attempts made.
        attempts: u32,
        /// Sleep between attempts.
        interval: Duration,
        /// Rendered last observation, or `"nothing"` when no attempt produced one.
        last_observed: String,
    },

    /// The condition is unknowable: the predicate classified an observation
    /// as unrecoverable, so no further attempts were made.
    #[error("fatal service error: {0}")]
    Fatal(String),

    /// The state accessor failed in a way the predicate did not classify as
    /// transient.
    #[error(transparent)]
    Accessor(#[from] AccessorError),
}

//! Replication error abstractions.

use thiserror::Error;

use crate::models::ConfigKind;

/// A result type where the error is a replication `Error`.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Replication error variants.
///
/// Variants are split by who may recover from them. `Auth`, `Transport`, `ResponseParse` and
/// `ObjectNotFound` abort a run when raised against the source deployment, while `Apply`, `Upload`
/// and `Commit` are scoped to a single target worker group and are recorded in the run's report.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The request could not be completed at the network level after all attempts.
    #[error("request to {url} failed after {attempts} attempt(s): {last_error}")]
    Transport { url: String, attempts: u32, last_error: String },
    /// Login against a deployment failed.
    #[error("authentication against {url} failed: {reason}")]
    Auth { url: String, reason: String },
    /// A response body could not be interpreted.
    #[error("unable to interpret response from {url}: {reason}")]
    ResponseParse { url: String, reason: String },
    /// The source deployment returned an empty result set for the requested object.
    #[error("{kind} '{id}' was not found at {url}")]
    ObjectNotFound { kind: ConfigKind, id: String, url: String },
    /// Applying an object to a target worker group failed.
    #[error("applying {kind} '{id}' to worker group '{worker_group}' failed: {cause}")]
    Apply { kind: ConfigKind, id: String, worker_group: String, cause: String },
    /// Uploading lookup content to a target worker group failed.
    #[error("uploading lookup '{id}' to worker group '{worker_group}' failed: {cause}")]
    Upload { id: String, worker_group: String, cause: String },
    /// Registering uploaded lookup content on a target worker group failed.
    #[error("committing lookup '{id}' on worker group '{worker_group}' failed: {cause}")]
    Commit { id: String, worker_group: String, cause: String },
    /// The given input was invalid.
    #[error("validation error: {0}")]
    InvalidInput(String),
}

use std::path::PathBuf;

use shale_util::PortError;
use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from snapshot migration and equivalence verification.
#[derive(Debug, Error)]
pub enum Error {
    /// The source snapshot is structurally incomplete; migration never
    /// starts.
    #[error("snapshot {snapshot} is missing required artifact {artifact:?}")]
    MissingSnapshotArtifact {
        /// Snapshot directory that was inspected.
        snapshot: PathBuf,
        /// Missing file or directory, relative to the snapshot root.
        artifact: String,
    },

    /// After rewriting, some copied file still references the original
    /// snapshot location. Fatal: a stale absolute path would silently corrupt
    /// the service start that follows.
    #[error("files still reference the original snapshot path {needle:?}: {files:?}")]
    StalePathReference {
        /// The literal path that must not appear.
        needle: String,
        /// Files that still contain it.
        files: Vec<PathBuf>,
    },

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("failed to parse {path}: {source}")]
    TomlDe {
        /// Offending file.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: toml::de::Error,
    },

    /// A configuration file could not be re-serialized.
    #[error("failed to serialize {path}: {source}")]
    TomlSer {
        /// Target file.
        path: PathBuf,
        /// Serialization failure.
        #[source]
        source: toml::ser::Error,
    },

    /// Port allocation failed while rewriting listen addresses.
    #[error(transparent)]
    Port(#[from] PortError),

    /// A compatibility check found a difference and the scenario does not
    /// tolerate breakage.
    #[error("compatibility checks failed: {0}")]
    EquivalenceMismatch(String),

    /// Breakage was declared allowed, but neither check found a difference —
    /// the override is unused and most likely wrong.
    #[error("breaking changes are allowed, but no compatibility check found a difference")]
    BreakageOverrideUnused,
}

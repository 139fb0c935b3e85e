//! Cross-version snapshot migration and equivalence verification.
//!
//! A snapshot is a stopped, persisted copy of a service instance. This crate
//! rewrites such a snapshot so a different service version can load it
//! ([`migrate`]), and proves the migrated instance is logically identical by
//! comparing data dumps ([`dump_differs`]). Migration correctness is defined
//! by convergence: the migrated instance must reach the same observable
//! state, verified through the convergence crate's wait operations.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod manifest;
mod migrate;
mod profile;
mod verify;

pub use error::{Error, Result};
pub use manifest::{
    BrokerConfig, EtcdBrokerConfig, MANIFEST_FILE_NAME, PageserverSection, SafekeeperSection,
    SnapshotManifest,
};
pub use migrate::migrate;
pub use profile::{
    BrokerEra, MIGRATION_PROFILES, MigrationProfile, RuntimeDescriptor, RuntimeVersion,
    VersionPredicate, profile_for,
};
pub use verify::{EquivalenceReport, dump_differs};

use tracing::warn;

/// The two independent compatibility checks of one migration scenario.
///
/// Both are evaluated before either is asserted: a migration bug and a
/// WAL-replay bug are independent defects, and both must surface in one run.
#[derive(Debug, Clone)]
pub struct CompatOutcome {
    /// Pre-migration dump vs. dump taken after the target version loaded the
    /// migrated snapshot.
    pub initial_dump: EquivalenceReport,
    /// Post-migration dump vs. dump taken after rebuilding the timeline from
    /// the write-ahead log alone.
    pub dump_from_wal: EquivalenceReport,
}

/// Asserts the scenario's final verdict over both checks.
///
/// `breaking_changes_allowed` is the explicit override for an intentional
/// format break. It must earn its keep: when set but neither check found a
/// difference, the override itself is flagged as unused.
///
/// # Errors
///
/// [`Error::EquivalenceMismatch`] naming the failing checks when breakage is
/// not allowed; [`Error::BreakageOverrideUnused`] when it is allowed but
/// nothing broke.
pub fn assert_no_breakage(outcome: &CompatOutcome, breaking_changes_allowed: bool) -> Result<()> {
    let mut failed = Vec::new();
    if outcome.initial_dump.differs {
        failed.push("initial dump differs");
    }
    if outcome.dump_from_wal.differs {
        failed.push("dump from WAL differs");
    }

    match (failed.is_empty(), breaking_changes_allowed) {
        (true, false) => Ok(()),
        (true, true) => Err(Error::BreakageOverrideUnused),
        (false, true) => {
            warn!("breaking changes allowed, tolerating: {}", failed.join("; "));
            Ok(())
        }
        (false, false) => Err(Error::EquivalenceMismatch(failed.join("; "))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(differs: bool) -> EquivalenceReport {
        EquivalenceReport {
            differs,
            diff_path: PathBuf::from("/tmp/diff"),
        }
    }

    fn outcome(initial: bool, from_wal: bool) -> CompatOutcome {
        CompatOutcome {
            initial_dump: report(initial),
            dump_from_wal: report(from_wal),
        }
    }

    #[test]
    fn clean_outcome_passes() {
        assert!(assert_no_breakage(&outcome(false, false), false).is_ok());
    }

    #[test]
    fn mismatch_without_override_names_failing_checks() {
        let err = assert_no_breakage(&outcome(true, true), false).unwrap_err();
        match err {
            Error::EquivalenceMismatch(msg) => {
                assert!(msg.contains("initial dump differs"));
                assert!(msg.contains("dump from WAL differs"));
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn override_tolerates_breakage() {
        assert!(assert_no_breakage(&outcome(false, true), true).is_ok());
    }

    #[test]
    fn unused_override_is_flagged() {
        assert!(matches!(
            assert_no_breakage(&outcome(false, false), true),
            Err(Error::BreakageOverrideUnused)
        ));
    }
}

//! Migration profiles: which coordination-protocol era a runtime speaks.
//!
//! The broker has had two incompatible wire formats across service versions.
//! Rather than string-comparing version identifiers at every branch point,
//! the mapping lives in one closed profile table; supporting a third era is
//! a new table entry.

use std::path::PathBuf;

/// Build identifier of a service runtime (the `git:` hash its binaries
/// report).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVersion(pub String);

/// Identifies the runtime a snapshot is being migrated towards.
#[derive(Debug, Clone)]
pub struct RuntimeDescriptor {
    /// Build identifier of the target binaries.
    pub version: RuntimeVersion,
    /// Directory holding the target service binaries.
    pub distrib_dir: PathBuf,
    /// Postgres distribution to pair with the target, when it differs from
    /// the snapshot's.
    pub pg_distrib_dir: Option<PathBuf>,
}

/// Coordination-protocol era of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerEra {
    /// Legacy format: components discover each other through a list of etcd
    /// endpoints.
    EtcdEndpointList,
    /// Modern format: a single dedicated broker listener.
    SingleListener,
}

/// Structured predicate deciding whether a profile applies to a version.
#[derive(Debug, Clone, Copy)]
pub enum VersionPredicate {
    /// Applies to exactly this build identifier.
    Exact(&'static str),
    /// Applies to everything not matched earlier in the table.
    Default,
}

impl VersionPredicate {
    fn matches(self, version: &RuntimeVersion) -> bool {
        match self {
            Self::Exact(id) => id == version.0,
            Self::Default => true,
        }
    }
}

/// One entry of the migration profile table.
#[derive(Debug, Clone, Copy)]
pub struct MigrationProfile {
    /// Human-readable profile name, used in logs.
    pub name: &'static str,
    /// Coordination era the runtime speaks.
    pub broker_era: BrokerEra,
    predicate: VersionPredicate,
}

/// The closed set of known migration profiles, checked in order. The last
/// entry must carry [`VersionPredicate::Default`].
pub const MIGRATION_PROFILES: &[MigrationProfile] = &[
    MigrationProfile {
        name: "etcd-coordination",
        broker_era: BrokerEra::EtcdEndpointList,
        predicate: VersionPredicate::Exact("49da498f651b9f3a53b56c7c0697636d880ddfe0"),
    },
    MigrationProfile {
        name: "storage-broker",
        broker_era: BrokerEra::SingleListener,
        predicate: VersionPredicate::Default,
    },
];

/// The profile governing migration towards the given runtime version.
#[must_use]
pub fn profile_for(version: &RuntimeVersion) -> &'static MigrationProfile {
    MIGRATION_PROFILES
        .iter()
        .find(|profile| profile.predicate.matches(version))
        .unwrap_or(&MIGRATION_PROFILES[MIGRATION_PROFILES.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_version_selects_etcd_era() {
        let version = RuntimeVersion("49da498f651b9f3a53b56c7c0697636d880ddfe0".into());
        assert_eq!(profile_for(&version).broker_era, BrokerEra::EtcdEndpointList);
    }

    #[test]
    fn unknown_version_selects_modern_era() {
        let version = RuntimeVersion("deadbeef".into());
        let profile = profile_for(&version);
        assert_eq!(profile.broker_era, BrokerEra::SingleListener);
        assert_eq!(profile.name, "storage-broker");
    }

    #[test]
    fn table_ends_with_a_default() {
        assert!(matches!(
            MIGRATION_PROFILES[MIGRATION_PROFILES.len() - 1].predicate,
            VersionPredicate::Default
        ));
    }
}

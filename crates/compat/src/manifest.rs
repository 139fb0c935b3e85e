//! The persisted service manifest inside a snapshot: a TOML document at
//! `<repo>/config` describing listen addresses, the coordination-protocol
//! descriptor, filesystem paths, and the branch-name mapping.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shale_types::{TenantId, TimelineId};

use crate::error::{Error, Result};

/// File name of the manifest inside a snapshot's repo directory.
pub const MANIFEST_FILE_NAME: &str = "config";

/// The full persisted configuration of a stopped service instance.
///
/// Exactly one of `broker` / `etcd_broker` is present in a consistent
/// manifest; which one depends on the coordination-protocol era of the
/// runtime that wrote (or will load) it. Unknown keys pass through `extra`
/// so migrating with a newer harness never drops fields it does not model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// The deployment's default tenant.
    pub default_tenant_id: TenantId,

    /// Modern coordination descriptor: a single broker listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<BrokerConfig>,

    /// Legacy coordination descriptor: an etcd endpoint list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcd_broker: Option<EtcdBrokerConfig>,

    /// Page-serving tier configuration.
    pub pageserver: PageserverSection,

    /// WAL-serving tier members.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safekeepers: Vec<SafekeeperSection>,

    /// Postgres distribution the compute nodes run from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pg_distrib_dir: Option<PathBuf>,

    /// Service binaries the instance runs from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shale_distrib_dir: Option<PathBuf>,

    /// Branch name to (tenant, timeline) pairs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branch_name_mappings: BTreeMap<String, Vec<(TenantId, TimelineId)>>,

    /// Fields this harness does not model, preserved verbatim.
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// Modern single-listener broker descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Address the broker listens on, `host:port`.
    pub listen_addr: String,
    /// Unmodeled fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// Legacy etcd-based broker descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtcdBrokerConfig {
    /// Path to the etcd binary, when one is installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcd_binary_path: Option<PathBuf>,
    /// Endpoints storage-tier components reach etcd at.
    pub broker_endpoints: Vec<String>,
    /// Unmodeled fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// The `[pageserver]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageserverSection {
    /// Management API listen address.
    pub listen_http_addr: String,
    /// Page service listen address.
    pub listen_pg_addr: String,
    /// Authentication token; stripped during migration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Authentication scheme; stripped during migration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    /// Unmodeled fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// One `[[safekeepers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafekeeperSection {
    /// Member id within the deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Management API port.
    pub http_port: u16,
    /// WAL service port.
    pub pg_port: u16,
    /// Unmodeled fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl SnapshotManifest {
    /// Reads a manifest from disk.
    ///
    /// # Errors
    ///
    /// IO or TOML parse failures.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Io("reading manifest", e))?;
        toml::from_str(&text).map_err(|source| Error::TomlDe {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the manifest back to disk.
    ///
    /// # Errors
    ///
    /// IO or TOML serialization failures.
    pub fn store(&self, path: &Path) -> Result<()> {
        let text = toml::to_string(self).map_err(|source| Error::TomlSer {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|e| Error::Io("writing manifest", e))
    }

    /// The timeline a branch maps to for the given tenant.
    #[must_use]
    pub fn timeline_for(&self, branch: &str, tenant: TenantId) -> Option<TimelineId> {
        self.branch_name_mappings
            .get(branch)?
            .iter()
            .find(|(t, _)| *t == tenant)
            .map(|(_, timeline)| *timeline)
    }

    /// Removes every authentication-related field. Migration scenarios run
    /// without auth.
    pub fn strip_auth(&mut self) {
        self.pageserver.auth_token = None;
        self.pageserver.auth_type = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
default_tenant_id = "a6343b08755ff4e5e3346fa1e7a5aba5"
custom_flag = true

[etcd_broker]
broker_endpoints = ["http://localhost:2379/"]

[pageserver]
listen_http_addr = "127.0.0.1:9898"
listen_pg_addr = "127.0.0.1:6400"
auth_token = "secret"

[[safekeepers]]
id = 1
http_port = 7676
pg_port = 5454

[branch_name_mappings]
main = [["a6343b08755ff4e5e3346fa1e7a5aba5", "de6fe0e20a2a6f3c1a5e600b80cbd486"]]
"#;

    #[test]
    fn parses_and_round_trips_unknown_keys() {
        let manifest: SnapshotManifest = toml::from_str(FIXTURE).unwrap();
        assert!(manifest.etcd_broker.is_some());
        assert!(manifest.broker.is_none());
        assert_eq!(manifest.extra["custom_flag"], toml::Value::Boolean(true));

        let rendered = toml::to_string(&manifest).unwrap();
        let back: SnapshotManifest = toml::from_str(&rendered).unwrap();
        assert_eq!(back.extra["custom_flag"], toml::Value::Boolean(true));
        assert_eq!(back.safekeepers.len(), 1);
    }

    #[test]
    fn timeline_lookup_follows_branch_mapping() {
        let manifest: SnapshotManifest = toml::from_str(FIXTURE).unwrap();
        let tenant = manifest.default_tenant_id;
        let timeline = manifest.timeline_for("main", tenant).unwrap();
        assert_eq!(
            timeline.to_string(),
            "de6fe0e20a2a6f3c1a5e600b80cbd486"
        );
        assert!(manifest.timeline_for("missing", tenant).is_none());
    }

    #[test]
    fn strip_auth_removes_credentials() {
        let mut manifest: SnapshotManifest = toml::from_str(FIXTURE).unwrap();
        manifest.strip_auth();
        assert!(manifest.pageserver.auth_token.is_none());
        let rendered = toml::to_string(&manifest).unwrap();
        assert!(!rendered.contains("auth_token"));
    }
}

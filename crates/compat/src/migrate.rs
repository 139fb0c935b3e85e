//! Snapshot migration: rewrites a persisted snapshot produced by one service
//! version into a form loadable by another.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use shale_util::PortAllocator;
use toml::Table;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::manifest::{BrokerConfig, EtcdBrokerConfig, MANIFEST_FILE_NAME, SnapshotManifest};
use crate::profile::{BrokerEra, RuntimeDescriptor, profile_for};

const PAGESERVER_CONFIG_NAME: &str = "pageserver.toml";
const WAL_REDO_SCRATCH_DIR: &str = "wal-redo-datadir.___temp";

/// Migrates the snapshot in `from_dir` into `to_dir` so the runtime described
/// by `target` can load it, and returns the path of the rewritten manifest.
///
/// The copy is full, not incremental: snapshots are small and migration is a
/// rare, test-time operation. Every listening address is rewritten through
/// `ports`, absolute filesystem paths are re-rooted under `to_dir`, the
/// coordination descriptor is switched to the target's era (both upgrade and
/// downgrade directions), and authentication fields are stripped.
///
/// # Errors
///
/// [`Error::MissingSnapshotArtifact`] when `from_dir` lacks the repo
/// directory or the data-dump marker; [`Error::StalePathReference`] when any
/// rewritten file still references `from_dir`; filesystem and TOML errors
/// propagate unmodified. Migration never starts the target service, so every
/// failure leaves only dead files behind.
pub fn migrate(
    from_dir: &Path,
    to_dir: &Path,
    target: &RuntimeDescriptor,
    ports: &PortAllocator,
) -> Result<PathBuf> {
    for artifact in ["repo", "dump.sql"] {
        if !from_dir.join(artifact).exists() {
            return Err(Error::MissingSnapshotArtifact {
                snapshot: from_dir.to_path_buf(),
                artifact: artifact.to_string(),
            });
        }
    }

    info!("copying snapshot from {} to {}", from_dir.display(), to_dir.display());
    copy_dir_all(from_dir, to_dir)?;

    let repo_dir = to_dir.join("repo");
    purge_version_noise(&repo_dir)?;

    let profile = profile_for(&target.version);
    info!(profile = profile.name, "rewriting snapshot for target runtime");

    // The endpoint list is shared between the service manifest and the
    // pageserver config in the legacy era.
    let etcd_endpoints = match profile.broker_era {
        BrokerEra::EtcdEndpointList => {
            vec![format!("http://localhost:{}/", ports.get_port()?)]
        }
        BrokerEra::SingleListener => Vec::new(),
    };

    rewrite_pageserver_config(&repo_dir, target, ports, &etcd_endpoints)?;
    let manifest_path =
        rewrite_manifest(&repo_dir, target, ports, profile.broker_era, &etcd_endpoints)?;

    assert_no_stale_paths(&repo_dir, from_dir)?;
    Ok(manifest_path)
}

/// Removes artifacts that are version-specific noise: stale logs, per-tenant
/// compute datadirs, and scratch directories of the removed wal-redo
/// mechanism.
fn purge_version_noise(repo_dir: &Path) -> Result<()> {
    let log_pattern = format!("{}/**/*.log", repo_dir.display());
    for entry in glob::glob(&log_pattern).map_err(|e| {
        Error::Io(
            "globbing log files",
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        )
    })? {
        let logfile = entry.map_err(|e| Error::Io("globbing log files", e.into_error()))?;
        debug!("removing stale log {}", logfile.display());
        fs::remove_file(&logfile).map_err(|e| Error::Io("removing stale log", e))?;
    }

    let compute_tenants = repo_dir.join("pgdatadirs").join("tenants");
    if compute_tenants.is_dir() {
        for entry in list_dir(&compute_tenants)? {
            debug!("removing compute datadir {}", entry.display());
            fs::remove_dir_all(&entry).map_err(|e| Error::Io("removing compute datadir", e))?;
        }
    }

    // Newer pageserver versions no longer create these; old ones did.
    let tenants = repo_dir.join("tenants");
    if tenants.is_dir() {
        for tenant in list_dir(&tenants)? {
            let scratch = tenant.join(WAL_REDO_SCRATCH_DIR);
            if scratch.is_dir() {
                debug!("removing wal-redo scratch dir {}", scratch.display());
                fs::remove_dir_all(&scratch)
                    .map_err(|e| Error::Io("removing wal-redo scratch dir", e))?;
            }
        }
    }
    Ok(())
}

fn rewrite_pageserver_config(
    repo_dir: &Path,
    target: &RuntimeDescriptor,
    ports: &PortAllocator,
    etcd_endpoints: &[String],
) -> Result<()> {
    let path = repo_dir.join(PAGESERVER_CONFIG_NAME);
    let text = fs::read_to_string(&path).map_err(|e| Error::Io("reading pageserver config", e))?;
    let mut config: Table = toml::from_str(&text).map_err(|source| Error::TomlDe {
        path: path.clone(),
        source,
    })?;

    if let Some(remote) = config
        .get_mut("remote_storage")
        .and_then(toml::Value::as_table_mut)
    {
        remote.insert(
            "local_path".into(),
            repo_dir
                .join("local_fs_remote_storage")
                .display()
                .to_string()
                .into(),
        );
    }

    for key in ["listen_http_addr", "listen_pg_addr"] {
        if let Some(addr) = config.get(key).and_then(toml::Value::as_str) {
            let rewritten = ports.replace_port(addr)?;
            config.insert(key.into(), rewritten.into());
        }
    }

    // The service rewrites these on start since the broker split; drop both
    // so an unknown option never reaches an older runtime, then re-add the
    // era-appropriate one.
    config.remove("broker_endpoint");
    config.remove("broker_endpoints");
    if !etcd_endpoints.is_empty() {
        config.insert(
            "broker_endpoints".into(),
            etcd_endpoints
                .iter()
                .map(|e| toml::Value::from(e.as_str()))
                .collect::<Vec<_>>()
                .into(),
        );
    }

    // Older versions had one auth_type knob, newer ones split it per port.
    // Migration scenarios run without auth, so all of them go.
    for key in ["auth_type", "pg_auth_type", "http_auth_type"] {
        config.remove(key);
    }

    if let Some(pg_distrib_dir) = &target.pg_distrib_dir {
        config.insert(
            "pg_distrib_dir".into(),
            pg_distrib_dir.display().to_string().into(),
        );
    }

    let rendered = toml::to_string(&config).map_err(|source| Error::TomlSer {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, rendered).map_err(|e| Error::Io("writing pageserver config", e))
}

fn rewrite_manifest(
    repo_dir: &Path,
    target: &RuntimeDescriptor,
    ports: &PortAllocator,
    era: BrokerEra,
    etcd_endpoints: &[String],
) -> Result<PathBuf> {
    let path = repo_dir.join(MANIFEST_FILE_NAME);
    let mut manifest = SnapshotManifest::load(&path)?;

    match era {
        BrokerEra::EtcdEndpointList => {
            manifest.etcd_broker = Some(EtcdBrokerConfig {
                etcd_binary_path: find_in_path("etcd"),
                broker_endpoints: etcd_endpoints.to_vec(),
                extra: Table::new(),
            });
            manifest.broker = None;
        }
        BrokerEra::SingleListener => {
            manifest.broker = Some(BrokerConfig {
                listen_addr: format!("127.0.0.1:{}", ports.get_port()?),
                extra: Table::new(),
            });
            manifest.etcd_broker = None;
        }
    }

    manifest.pageserver.listen_http_addr =
        ports.replace_port(&manifest.pageserver.listen_http_addr)?;
    manifest.pageserver.listen_pg_addr =
        ports.replace_port(&manifest.pageserver.listen_pg_addr)?;
    for safekeeper in &mut manifest.safekeepers {
        safekeeper.http_port = ports.get_port()?;
        safekeeper.pg_port = ports.get_port()?;
    }

    manifest.strip_auth();
    manifest.shale_distrib_dir = Some(target.distrib_dir.clone());
    if let Some(pg_distrib_dir) = &target.pg_distrib_dir {
        manifest.pg_distrib_dir = Some(pg_distrib_dir.clone());
    }

    manifest.store(&path)?;
    Ok(path)
}

/// Correctness gate: no file in the rewritten tree may still reference the
/// original snapshot location textually. Binary files (containing NUL) are
/// skipped, matching what a text search over the tree would do.
fn assert_no_stale_paths(repo_dir: &Path, from_dir: &Path) -> Result<()> {
    let needle = from_dir.display().to_string();
    let mut stale = Vec::new();
    scan_for_needle(repo_dir, needle.as_bytes(), &mut stale)?;
    if stale.is_empty() {
        Ok(())
    } else {
        Err(Error::StalePathReference {
            needle,
            files: stale,
        })
    }
}

fn scan_for_needle(dir: &Path, needle: &[u8], stale: &mut Vec<PathBuf>) -> Result<()> {
    for entry in list_dir(dir)? {
        if entry.is_dir() {
            scan_for_needle(&entry, needle, stale)?;
        } else {
            let bytes = fs::read(&entry).map_err(|e| Error::Io("scanning for stale paths", e))?;
            if bytes.contains(&0) {
                continue;
            }
            if bytes.windows(needle.len()).any(|w| w == needle) {
                stale.push(entry);
            }
        }
    }
    Ok(())
}

fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| Error::Io("copying snapshot", e))?;
    let entries = fs::read_dir(src).map_err(|e| Error::Io("copying snapshot", e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::Io("copying snapshot", e))?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir_all(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| Error::Io("copying snapshot", e))?;
        }
    }
    Ok(())
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::Io("listing directory", e))?;
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| Error::Io("listing directory", e))?.path());
    }
    Ok(paths)
}

/// Resolves a binary name against `PATH`, like `which`.
fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tenant tuning knobs relevant to harness scenarios.
///
/// The service accepts these as a string-valued map at tenant creation time;
/// [`TenantTuning::to_wire`] produces that form. Scenarios that want many
/// small layers (aggressive checkpointing, no background gc/compaction) pass
/// [`TenantTuning::many_small_layers`] explicitly instead of relying on an
/// ambient process-wide preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantTuning {
    /// Period between garbage collection runs.
    pub gc_period: Duration,
    /// Period between compaction runs.
    pub compaction_period: Duration,
    /// Bytes of WAL between checkpoints.
    pub checkpoint_distance: u64,
    /// Number of delta layers before an image layer is created.
    pub image_creation_threshold: u32,
}

impl TenantTuning {
    /// Preset producing many small layers: gc and compaction disabled, a
    /// checkpoint every mebibyte, image creation effectively off.
    #[must_use]
    pub const fn many_small_layers() -> Self {
        Self {
            gc_period: Duration::ZERO,
            compaction_period: Duration::ZERO,
            checkpoint_distance: 1024 * 1024,
            image_creation_threshold: 100,
        }
    }

    /// Renders the knobs in the string-valued map form the service's tenant
    /// configuration endpoint accepts.
    #[must_use]
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("gc_period".into(), format!("{}s", self.gc_period.as_secs())),
            (
                "compaction_period".into(),
                format!("{}s", self.compaction_period.as_secs()),
            ),
            (
                "checkpoint_distance".into(),
                self.checkpoint_distance.to_string(),
            ),
            (
                "image_creation_threshold".into(),
                self.image_creation_threshold.to_string(),
            ),
        ])
    }
}

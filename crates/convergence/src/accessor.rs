use std::collections::BTreeMap;

use serde::Deserialize;
use shale_types::{Lsn, TenantId, TimelineId};
use thiserror::Error;

/// Errors a [`StateAccessor`] implementation can report. The wait operations
/// decide per call site which of these are transient and which abort the wait.
#[derive(Debug, Clone, Error)]
pub enum AccessorError {
    /// The request never produced a usable response (connection refused,
    /// reset, timed out).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The service answered with a non-success status other than not-found.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP-equivalent status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
}

/// Tenant status as reported by the service. Never cached locally; every read
/// re-queries the service.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantStatus {
    /// Current lifecycle state.
    pub state: TenantState,
    /// Remaining response fields, kept for diagnostics.
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

/// The `state` object inside a tenant status response.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantState {
    /// State tag, e.g. `Loading`, `Attaching`, `Active`, `Broken`, `Stopping`.
    /// The exact set is owned by the service.
    pub slug: String,
    /// Opaque diagnostic payload accompanying the tag.
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl TenantStatus {
    /// Builds a status with just a state tag. Intended for mock accessors.
    #[must_use]
    pub fn with_slug(slug: impl Into<String>) -> Self {
        Self {
            state: TenantState {
                slug: slug.into(),
                data: serde_json::Map::new(),
            },
            detail: serde_json::Map::new(),
        }
    }

    /// The current state tag.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.state.slug
    }
}

/// Timeline state on the wire is polymorphic: either a plain tag or a record
/// keyed by tag. [`RawTimelineState::slug`] is the single normalization every
/// wait operation goes through, so a future shape change touches one place.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimelineState {
    /// Plain tag form, e.g. `"Active"`.
    Tag(String),
    /// Structured form keyed by tag, e.g. `{"Active": true}`.
    Flags(BTreeMap<String, bool>),
}

impl RawTimelineState {
    /// Normalizes either wire shape to the current state tag.
    #[must_use]
    pub fn slug(&self) -> Option<&str> {
        match self {
            Self::Tag(tag) => Some(tag.as_str()),
            Self::Flags(flags) => flags
                .iter()
                .find_map(|(tag, set)| set.then_some(tag.as_str())),
        }
    }
}

/// Timeline status and replication positions for one (tenant, timeline) pair.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineDetail {
    /// Current lifecycle state, in either wire shape.
    pub state: RawTimelineState,
    /// Last WAL record durably processed locally. `None` right after
    /// creation, before anything has been ingested.
    pub last_record_lsn: Option<Lsn>,
    /// Upload high-water mark; `None` until the first successful upload.
    pub remote_consistent_lsn: Option<Lsn>,
    /// Remaining response fields, kept for diagnostics.
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

impl TimelineDetail {
    /// Builds a detail with just a state tag. Intended for mock accessors.
    #[must_use]
    pub fn with_state(state: RawTimelineState) -> Self {
        Self {
            state,
            last_record_lsn: None,
            remote_consistent_lsn: None,
            detail: serde_json::Map::new(),
        }
    }
}

/// Snapshot of a timeline's durability positions.
///
/// Invariant: `remote_consistent_lsn <= last_record_lsn`. Uploads lag local
/// durability, never precede it; [`StateAccessor::remote_consistency`]
/// rejects a response that violates this, so a constructed record always
/// holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteConsistencyRecord {
    /// Owning tenant.
    pub tenant: TenantId,
    /// Timeline within the tenant.
    pub timeline: TimelineId,
    /// Last WAL record durably processed locally.
    pub last_record_lsn: Lsn,
    /// Everything up to here has been durably uploaded; [`Lsn::INVALID`]
    /// until the first successful upload.
    pub remote_consistent_lsn: Lsn,
}

/// One reported instance of the `upload_calls_unfinished` gauge.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadQueueMetric {
    /// Metric labels as reported (includes `tenant_id` / `timeline_id`).
    pub labels: BTreeMap<String, String>,
    /// Gauge value; the queue is drained iff every instance reads exactly 0.
    pub value: f64,
}

/// Synchronous read/delete access to the service's externally queried state.
///
/// All reads are idempotent. Not-found is a first-class outcome (`Ok(None)`),
/// not an error: the delete-confirmation flows poll for it.
pub trait StateAccessor {
    /// Queries the status of a tenant; `Ok(None)` when the tenant does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Any [`AccessorError`] other than a not-found response.
    fn tenant_status(&self, tenant: TenantId) -> Result<Option<TenantStatus>, AccessorError>;

    /// Queries the detail of a timeline; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Any [`AccessorError`] other than a not-found response.
    fn timeline_detail(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> Result<Option<TimelineDetail>, AccessorError>;

    /// Queries the `upload_calls_unfinished` gauge instances for one
    /// (tenant, timeline) pair.
    ///
    /// # Errors
    ///
    /// Any [`AccessorError`].
    fn upload_queue_metrics(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> Result<Vec<UploadQueueMetric>, AccessorError>;

    /// Requests deletion of a tenant. Deleting an absent tenant succeeds.
    ///
    /// # Errors
    ///
    /// Any [`AccessorError`].
    fn delete_tenant(&self, tenant: TenantId) -> Result<(), AccessorError>;

    /// Requests deletion of a timeline. Deleting an absent timeline succeeds.
    ///
    /// # Errors
    ///
    /// Any [`AccessorError`].
    fn delete_timeline(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> Result<(), AccessorError>;

    /// Reads both durability positions for a timeline in one query.
    ///
    /// # Errors
    ///
    /// [`AccessorError::Api`] with status 404 when the timeline does not
    /// exist; [`AccessorError::Malformed`] when the response claims an upload
    /// position ahead of local durability, which the service can never
    /// truthfully report; plus anything [`Self::timeline_detail`] reports.
    fn remote_consistency(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> Result<RemoteConsistencyRecord, AccessorError> {
        let detail = self.timeline_detail(tenant, timeline)?.ok_or_else(|| {
            AccessorError::Api {
                status: 404,
                message: format!("timeline {tenant}/{timeline} not found"),
            }
        })?;
        let last_record_lsn = detail.last_record_lsn.unwrap_or(Lsn::INVALID);
        let remote_consistent_lsn = detail.remote_consistent_lsn.unwrap_or(Lsn::INVALID);
        if remote_consistent_lsn > last_record_lsn {
            return Err(AccessorError::Malformed(format!(
                "remote_consistent_lsn {remote_consistent_lsn} ahead of \
                 last_record_lsn {last_record_lsn} for {tenant}/{timeline}"
            )));
        }
        Ok(RemoteConsistencyRecord {
            tenant,
            timeline,
            last_record_lsn,
            remote_consistent_lsn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_status_wire_shape() {
        let status: TenantStatus = serde_json::from_str(
            r#"{"state": {"slug": "Attaching", "data": {"attempt": 2}}, "current_physical_size": 0}"#,
        )
        .unwrap();
        assert_eq!(status.slug(), "Attaching");
        assert!(status.detail.contains_key("current_physical_size"));
    }

    #[test]
    fn timeline_state_plain_tag() {
        let detail: TimelineDetail = serde_json::from_str(
            r#"{"state": "Active", "last_record_lsn": "0/169C3D8", "remote_consistent_lsn": null}"#,
        )
        .unwrap();
        assert_eq!(detail.state.slug(), Some("Active"));
        assert_eq!(detail.last_record_lsn, Some(Lsn(0x0169_C3D8)));
        assert_eq!(detail.remote_consistent_lsn, None);
    }

    #[test]
    fn timeline_state_structured_record() {
        let detail: TimelineDetail =
            serde_json::from_str(r#"{"state": {"Stopping": true, "Active": false}}"#).unwrap();
        assert_eq!(detail.state.slug(), Some("Stopping"));
    }

    #[test]
    fn structured_record_with_no_set_flag_has_no_slug() {
        let state: RawTimelineState =
            serde_json::from_str(r#"{"Active": false}"#).unwrap();
        assert_eq!(state.slug(), None);
    }
}

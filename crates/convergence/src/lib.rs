//! Convergence observation for the shale storage service.
//!
//! The service is eventually consistent: tenant activation, remote uploads,
//! and deletions all complete asynchronously. This crate answers "has state X
//! been reached yet?" without races, through a generic bounded-retry poller
//! ([`await_condition`]), a synchronous [`StateAccessor`] interface over the
//! service's status API, and pre-built lifecycle wait operations.
//!
//! The harness never owns or transitions service state; it only observes
//! transitions driven by the external service.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod accessor;
mod error;
mod poll;
mod waits;

pub use accessor::{
    AccessorError, RawTimelineState, RemoteConsistencyRecord, StateAccessor, TenantState,
    TenantStatus, TimelineDetail, UploadQueueMetric,
};
pub use error::{Error, Result};
pub use poll::{PollOutcome, await_condition};
pub use waits::{
    LAST_RECORD_WAIT_ATTEMPTS, StorageBackendKind, TENANT_ACTIVE_ATTEMPTS, UPLOAD_WAIT_ATTEMPTS,
    assert_tenant_state, poll_delete_iterations, tenant_delete_wait_completed,
    timeline_delete_wait_completed, wait_for_last_record_lsn, wait_for_last_record_lsn_with,
    wait_for_upload, wait_for_upload_queue_empty, wait_for_upload_with, wait_tenant_gone,
    wait_timeline_gone, wait_until_tenant_active, wait_until_tenant_state,
    wait_until_timeline_state,
};

use std::thread;
use std::time::Duration;

use shale_types::{Lsn, TenantId, TimelineId};
use tracing::{debug, info};

use crate::accessor::{StateAccessor, TenantStatus, TimelineDetail};
use crate::error::{Error, Result};
use crate::poll::{PollOutcome, await_condition};

/// Default attempt budget for [`wait_for_upload`].
pub const UPLOAD_WAIT_ATTEMPTS: u32 = 20;
/// Default attempt budget for [`wait_for_last_record_lsn`].
pub const LAST_RECORD_WAIT_ATTEMPTS: u32 = 10;
/// Default attempt budget for [`wait_until_tenant_active`].
pub const TENANT_ACTIVE_ATTEMPTS: u32 = 30;

const SECOND: Duration = Duration::from_secs(1);
const DELETE_POLL_INTERVAL: Duration = Duration::from_millis(250);
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Kind of backing store the service uploads to. Deletion is asynchronous on
/// real networked stores, so delete-confirmation budgets depend on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// Local filesystem remote storage.
    LocalFs,
    /// In-process mock of an object store.
    MockS3,
    /// Real networked object store.
    RealS3,
}

/// Delete-confirmation iteration budget appropriate to the backing store.
#[must_use]
pub const fn poll_delete_iterations(backend: StorageBackendKind) -> u32 {
    match backend {
        StorageBackendKind::RealS3 => 20,
        StorageBackendKind::LocalFs | StorageBackendKind::MockS3 => 8,
    }
}

/// Waits until everything up to `lsn` has been durably uploaded, with the
/// default budget of 20 attempts one second apart.
///
/// # Errors
///
/// [`Error::ConvergenceTimeout`] carrying the last observed
/// `remote_consistent_lsn` (and `last_record_lsn`, for diagnostics only);
/// accessor errors are fatal and propagate immediately.
pub fn wait_for_upload<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    timeline: TimelineId,
    lsn: Lsn,
) -> Result<()> {
    wait_for_upload_with(accessor, tenant, timeline, lsn, UPLOAD_WAIT_ATTEMPTS, SECOND)
}

/// [`wait_for_upload`] with an explicit budget.
///
/// # Errors
///
/// Same as [`wait_for_upload`].
pub fn wait_for_upload_with<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    timeline: TimelineId,
    lsn: Lsn,
    attempts: u32,
    interval: Duration,
) -> Result<()> {
    await_condition(
        || {
            let record = accessor.remote_consistency(tenant, timeline)?;
            if record.remote_consistent_lsn >= lsn {
                info!(%tenant, %timeline, "upload caught up to {lsn}");
                return Ok(PollOutcome::Reached(()));
            }
            info!(
                %tenant, %timeline,
                "waiting for remote_consistent_lsn to reach {lsn}, now {}, last_record_lsn={}",
                record.remote_consistent_lsn, record.last_record_lsn,
            );
            Ok(PollOutcome::NotYet(Some(format!(
                "remote_consistent_lsn={}, last_record_lsn={}",
                record.remote_consistent_lsn, record.last_record_lsn
            ))))
        },
        attempts,
        interval,
    )
}

/// Waits until the local `last_record_lsn` reaches `lsn`, with the default
/// budget of 10 attempts one second apart. Returns the observed LSN so
/// callers can chain it into [`wait_for_upload`].
///
/// # Errors
///
/// [`Error::ConvergenceTimeout`] carrying the last observed value; accessor
/// errors are fatal.
pub fn wait_for_last_record_lsn<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    timeline: TimelineId,
    lsn: Lsn,
) -> Result<Lsn> {
    wait_for_last_record_lsn_with(accessor, tenant, timeline, lsn, LAST_RECORD_WAIT_ATTEMPTS, SECOND)
}

/// [`wait_for_last_record_lsn`] with an explicit budget.
///
/// # Errors
///
/// Same as [`wait_for_last_record_lsn`].
pub fn wait_for_last_record_lsn_with<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    timeline: TimelineId,
    lsn: Lsn,
    attempts: u32,
    interval: Duration,
) -> Result<Lsn> {
    await_condition(
        || {
            let record = accessor.remote_consistency(tenant, timeline)?;
            let current = record.last_record_lsn;
            if current >= lsn {
                return Ok(PollOutcome::Reached(current));
            }
            info!(%tenant, %timeline, "waiting for last_record_lsn to reach {lsn}, now {current}");
            Ok(PollOutcome::NotYet(Some(format!(
                "last_record_lsn={current}"
            ))))
        },
        attempts,
        interval,
    )
}

/// Waits until a tenant reports the expected state tag.
///
/// Read errors and not-found are logged at debug and treated as not-yet: the
/// only failure mode expected here is "service still bootstrapping", so this
/// is deliberately looser than the generic poller contract.
///
/// # Errors
///
/// [`Error::ConvergenceTimeout`] carrying the last observed state.
pub fn wait_until_tenant_state<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    expected: &str,
    iterations: u32,
    period: Duration,
) -> Result<TenantStatus> {
    await_condition(
        || {
            match accessor.tenant_status(tenant) {
                Ok(Some(status)) => {
                    debug!(%tenant, state = status.slug(), "tenant status");
                    if status.slug() == expected {
                        return Ok(PollOutcome::Reached(status));
                    }
                    Ok(PollOutcome::NotYet(Some(format!(
                        "state {:?}",
                        status.slug()
                    ))))
                }
                Ok(None) => Ok(PollOutcome::NotYet(Some("not found".into()))),
                Err(e) => {
                    debug!(%tenant, "tenant state retrieval failure: {e}");
                    Ok(PollOutcome::NotYet(Some(e.to_string())))
                }
            }
        },
        iterations,
        period,
    )
}

/// Waits until a tenant becomes `Active`, with the default budget of 30
/// attempts one second apart.
///
/// # Errors
///
/// Same as [`wait_until_tenant_state`].
pub fn wait_until_tenant_active<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
) -> Result<TenantStatus> {
    wait_until_tenant_state(accessor, tenant, "Active", TENANT_ACTIVE_ATTEMPTS, SECOND)
}

/// Waits until a timeline reports the expected state tag, normalizing both
/// wire shapes of the state field before comparing. Same looseness as
/// [`wait_until_tenant_state`]; no sleep on the final failed attempt.
///
/// # Errors
///
/// [`Error::ConvergenceTimeout`] carrying the last observed state.
pub fn wait_until_timeline_state<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    timeline: TimelineId,
    expected: &str,
    iterations: u32,
    period: Duration,
) -> Result<TimelineDetail> {
    await_condition(
        || {
            match accessor.timeline_detail(tenant, timeline) {
                Ok(Some(detail)) => {
                    debug!(%tenant, %timeline, state = ?detail.state.slug(), "timeline status");
                    if detail.state.slug() == Some(expected) {
                        return Ok(PollOutcome::Reached(detail));
                    }
                    Ok(PollOutcome::NotYet(Some(format!(
                        "state {:?}",
                        detail.state.slug()
                    ))))
                }
                Ok(None) => Ok(PollOutcome::NotYet(Some("not found".into()))),
                Err(e) => {
                    debug!(%tenant, %timeline, "timeline state retrieval failure: {e}");
                    Ok(PollOutcome::NotYet(Some(e.to_string())))
                }
            }
        },
        iterations,
        period,
    )
}

/// Blocks until every reported `upload_calls_unfinished` gauge instance for
/// the timeline reads exactly 0, polling every 200ms.
///
/// There is deliberately no attempt budget: queue drains always terminate on
/// a healthy service, and the scenario-level wall-clock limit bounds total
/// runtime. Callers must run under such an external bound.
///
/// # Errors
///
/// [`Error::Fatal`] when the metric set is empty — a timeline that reports no
/// upload queue gauge at all is misconfigured, not "not yet"; accessor errors
/// propagate.
pub fn wait_for_upload_queue_empty<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    timeline: TimelineId,
) -> Result<()> {
    loop {
        let metrics = accessor.upload_queue_metrics(tenant, timeline)?;
        if metrics.is_empty() {
            return Err(Error::Fatal(format!(
                "no upload queue metrics reported for {tenant}/{timeline}"
            )));
        }
        info!(%tenant, %timeline, "upload queue: {metrics:?}");
        if metrics.iter().all(|m| m.value == 0.0) {
            return Ok(());
        }
        thread::sleep(QUEUE_POLL_INTERVAL);
    }
}

/// Polls until a timeline status query observes not-found, every 250ms.
///
/// A still-present timeline and a transient read failure are both treated as
/// not-yet; deletion is eventually observable, and running out of budget is
/// the failure signal.
///
/// # Errors
///
/// [`Error::ConvergenceTimeout`] carrying the last observed state.
pub fn wait_timeline_gone<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    timeline: TimelineId,
    iterations: u32,
) -> Result<()> {
    await_condition(
        || {
            match accessor.timeline_detail(tenant, timeline) {
                Ok(None) => Ok(PollOutcome::Reached(())),
                Ok(Some(detail)) => {
                    info!(%tenant, %timeline, "timeline still exists, state {:?}", detail.state.slug());
                    Ok(PollOutcome::NotYet(Some(format!(
                        "timeline exists, state {:?}",
                        detail.state.slug()
                    ))))
                }
                Err(e) => {
                    debug!(%tenant, %timeline, "timeline detail retrieval failure: {e}");
                    Ok(PollOutcome::NotYet(Some(e.to_string())))
                }
            }
        },
        iterations,
        DELETE_POLL_INTERVAL,
    )
}

/// Polls until a tenant status query observes not-found, every 250ms.
///
/// # Errors
///
/// [`Error::ConvergenceTimeout`] carrying the last observed state.
pub fn wait_tenant_gone<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    iterations: u32,
) -> Result<()> {
    await_condition(
        || {
            match accessor.tenant_status(tenant) {
                Ok(None) => Ok(PollOutcome::Reached(())),
                Ok(Some(status)) => {
                    info!(%tenant, "tenant still exists, state {:?}", status.slug());
                    Ok(PollOutcome::NotYet(Some(format!(
                        "tenant exists, state {:?}",
                        status.slug()
                    ))))
                }
                Err(e) => {
                    debug!(%tenant, "tenant status retrieval failure: {e}");
                    Ok(PollOutcome::NotYet(Some(e.to_string())))
                }
            }
        },
        iterations,
        DELETE_POLL_INTERVAL,
    )
}

/// Issues a timeline delete, then waits until the deletion is observable.
/// Budgets come from [`poll_delete_iterations`]: asynchronous backing-store
/// deletion needs a larger one than a local mock.
///
/// Deleting an already-deleted timeline succeeds immediately — the first
/// poll already observes not-found.
///
/// # Errors
///
/// The delete call's accessor error, or [`Error::ConvergenceTimeout`] when
/// the deletion never becomes observable within the budget.
pub fn timeline_delete_wait_completed<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    timeline: TimelineId,
    iterations: u32,
) -> Result<()> {
    accessor.delete_timeline(tenant, timeline)?;
    wait_timeline_gone(accessor, tenant, timeline, iterations)
}

/// Issues a tenant delete, then waits until the deletion is observable.
///
/// # Errors
///
/// Same shape as [`timeline_delete_wait_completed`].
pub fn tenant_delete_wait_completed<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    iterations: u32,
) -> Result<()> {
    accessor.delete_tenant(tenant)?;
    wait_tenant_gone(accessor, tenant, iterations)
}

/// One-shot assertion that a tenant currently reports the expected state.
///
/// # Errors
///
/// [`Error::Fatal`] when the tenant is missing or in a different state;
/// accessor errors propagate.
pub fn assert_tenant_state<A: StateAccessor>(
    accessor: &A,
    tenant: TenantId,
    expected: &str,
) -> Result<()> {
    let status = accessor
        .tenant_status(tenant)?
        .ok_or_else(|| Error::Fatal(format!("tenant {tenant} not found")))?;
    info!(%tenant, state = status.slug(), "tenant status");
    if status.slug() == expected {
        Ok(())
    } else {
        Err(Error::Fatal(format!(
            "tenant {tenant} in state {:?}, expected {expected:?}",
            status.slug()
        )))
    }
}

//! Common test setup for integration tests

use std::cell::RefCell;
use std::collections::VecDeque;

use shale_convergence::{
    AccessorError, StateAccessor, TenantStatus, TimelineDetail, UploadQueueMetric,
};
use shale_types::{TenantId, TimelineId};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber for all tests
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .with_test_writer()
            .init();
    });
}

type Script<T> = RefCell<VecDeque<Result<T, AccessorError>>>;

/// Scripted accessor: each query pops the next canned response for its kind.
/// When only one response is left it becomes sticky and repeats, so unbounded
/// polls see a stable final state.
#[derive(Default)]
pub struct ScriptedAccessor {
    tenant_statuses: Script<Option<TenantStatus>>,
    timeline_details: Script<Option<TimelineDetail>>,
    metrics: Script<Vec<UploadQueueMetric>>,
    pub deleted_tenants: RefCell<Vec<TenantId>>,
    pub deleted_timelines: RefCell<Vec<(TenantId, TimelineId)>>,
}

fn pop_sticky<T: Clone>(script: &Script<T>) -> Result<T, AccessorError> {
    let mut queue = script.borrow_mut();
    assert!(!queue.is_empty(), "scripted accessor ran out of responses");
    if queue.len() == 1 {
        queue.front().unwrap().clone()
    } else {
        queue.pop_front().unwrap()
    }
}

impl ScriptedAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_tenant_status(
        &self,
        response: Result<Option<TenantStatus>, AccessorError>,
    ) -> &Self {
        self.tenant_statuses.borrow_mut().push_back(response);
        self
    }

    pub fn script_timeline_detail(
        &self,
        response: Result<Option<TimelineDetail>, AccessorError>,
    ) -> &Self {
        self.timeline_details.borrow_mut().push_back(response);
        self
    }

    pub fn script_metrics(
        &self,
        response: Result<Vec<UploadQueueMetric>, AccessorError>,
    ) -> &Self {
        self.metrics.borrow_mut().push_back(response);
        self
    }
}

impl StateAccessor for ScriptedAccessor {
    fn tenant_status(&self, _tenant: TenantId) -> Result<Option<TenantStatus>, AccessorError> {
        pop_sticky(&self.tenant_statuses)
    }

    fn timeline_detail(
        &self,
        _tenant: TenantId,
        _timeline: TimelineId,
    ) -> Result<Option<TimelineDetail>, AccessorError> {
        pop_sticky(&self.timeline_details)
    }

    fn upload_queue_metrics(
        &self,
        _tenant: TenantId,
        _timeline: TimelineId,
    ) -> Result<Vec<UploadQueueMetric>, AccessorError> {
        pop_sticky(&self.metrics)
    }

    fn delete_tenant(&self, tenant: TenantId) -> Result<(), AccessorError> {
        self.deleted_tenants.borrow_mut().push(tenant);
        Ok(())
    }

    fn delete_timeline(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> Result<(), AccessorError> {
        self.deleted_timelines.borrow_mut().push((tenant, timeline));
        Ok(())
    }
}

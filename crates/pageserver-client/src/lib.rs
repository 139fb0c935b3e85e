//! Blocking HTTP client for the pageserver management API.
//!
//! Implements the [`StateAccessor`] interface the convergence waits consume:
//! tenant/timeline status queries, the upload queue gauge, and the delete
//! endpoints, plus the timeline create/checkpoint calls the migration
//! scenarios need.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
pub mod metrics;

pub use error::{Error, Result};

use std::collections::BTreeMap;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde_json::json;
use shale_convergence::{
    AccessorError, StateAccessor, TenantStatus, TimelineDetail, UploadQueueMetric,
};
use shale_types::{TenantId, TimelineId};
use tracing::debug;

use crate::metrics::{MetricSample, parse_metrics, query_all};

/// Gauge counting outstanding upload operations per (tenant, timeline).
pub const UPLOAD_QUEUE_GAUGE: &str = "upload_calls_unfinished";

/// Client for one pageserver's management port.
pub struct PageserverClient {
    client: Client,
    http_port: u16,
}

impl PageserverClient {
    /// Creates a client for the management API listening on `http_port`.
    #[must_use]
    pub fn new(http_port: u16) -> Self {
        Self {
            client: Client::new(),
            http_port,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("http://localhost:{}/v1/{path}", self.http_port)
    }

    /// Fetches the status of a tenant; `Ok(None)` on a 404.
    ///
    /// # Errors
    ///
    /// Any transport, API, or decode failure other than a 404.
    pub fn tenant_status(&self, tenant: TenantId) -> Result<Option<TenantStatus>> {
        let response = self.client.get(self.api_url(&format!("tenant/{tenant}"))).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = expect_success(response)?;
        debug!(%tenant, "raw tenant status: {body}");
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Fetches the detail of a timeline; `Ok(None)` on a 404.
    ///
    /// # Errors
    ///
    /// Any transport, API, or decode failure other than a 404.
    pub fn timeline_detail(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> Result<Option<TimelineDetail>> {
        let response = self
            .client
            .get(self.api_url(&format!("tenant/{tenant}/timeline/{timeline}")))
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = expect_success(response)?;
        debug!(%tenant, %timeline, "raw timeline detail: {body}");
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Creates (or recreates) a timeline with the given id. The WAL-replay
    /// compatibility flow deletes a timeline and recreates it under the same
    /// id to force a rebuild from the write-ahead log.
    ///
    /// # Errors
    ///
    /// Any transport or API failure.
    pub fn timeline_create(&self, tenant: TenantId, timeline: TimelineId) -> Result<()> {
        let response = self
            .client
            .post(self.api_url(&format!("tenant/{tenant}/timeline")))
            .json(&json!({ "new_timeline_id": timeline.to_string() }))
            .send()?;
        expect_success(response)?;
        Ok(())
    }

    /// Forces a checkpoint of a timeline so pending uploads are scheduled.
    ///
    /// # Errors
    ///
    /// Any transport or API failure.
    pub fn timeline_checkpoint(&self, tenant: TenantId, timeline: TimelineId) -> Result<()> {
        let response = self
            .client
            .put(self.api_url(&format!(
                "tenant/{tenant}/timeline/{timeline}/checkpoint"
            )))
            .send()?;
        expect_success(response)?;
        Ok(())
    }

    /// Deletes a timeline. A 404 counts as success: the entity is already
    /// gone, which is all the caller wants.
    ///
    /// # Errors
    ///
    /// Any transport or API failure other than a 404.
    pub fn timeline_delete(&self, tenant: TenantId, timeline: TimelineId) -> Result<()> {
        let response = self
            .client
            .delete(self.api_url(&format!("tenant/{tenant}/timeline/{timeline}")))
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        expect_success(response)?;
        Ok(())
    }

    /// Deletes a tenant. A 404 counts as success.
    ///
    /// # Errors
    ///
    /// Any transport or API failure other than a 404.
    pub fn tenant_delete(&self, tenant: TenantId) -> Result<()> {
        let response = self
            .client
            .delete(self.api_url(&format!("tenant/{tenant}")))
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        expect_success(response)?;
        Ok(())
    }

    /// Fetches and parses the whole metrics exposition.
    ///
    /// # Errors
    ///
    /// Any transport or API failure.
    pub fn get_metrics(&self) -> Result<Vec<MetricSample>> {
        let response = self
            .client
            .get(format!("http://localhost:{}/metrics", self.http_port))
            .send()?;
        let body = expect_success(response)?;
        Ok(parse_metrics(&body))
    }
}

fn expect_success(response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text()?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::Api {
            status: status.as_u16(),
            message: body,
        })
    }
}

impl StateAccessor for PageserverClient {
    fn tenant_status(
        &self,
        tenant: TenantId,
    ) -> std::result::Result<Option<TenantStatus>, AccessorError> {
        Self::tenant_status(self, tenant).map_err(Into::into)
    }

    fn timeline_detail(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> std::result::Result<Option<TimelineDetail>, AccessorError> {
        Self::timeline_detail(self, tenant, timeline).map_err(Into::into)
    }

    fn upload_queue_metrics(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> std::result::Result<Vec<UploadQueueMetric>, AccessorError> {
        let samples = self.get_metrics().map_err(AccessorError::from)?;
        let filter = BTreeMap::from([
            ("tenant_id".to_string(), tenant.to_string()),
            ("timeline_id".to_string(), timeline.to_string()),
        ]);
        Ok(query_all(&samples, UPLOAD_QUEUE_GAUGE, &filter)
            .into_iter()
            .map(|s| UploadQueueMetric {
                labels: s.labels.clone(),
                value: s.value,
            })
            .collect())
    }

    fn delete_tenant(&self, tenant: TenantId) -> std::result::Result<(), AccessorError> {
        self.tenant_delete(tenant).map_err(Into::into)
    }

    fn delete_timeline(
        &self,
        tenant: TenantId,
        timeline: TimelineId,
    ) -> std::result::Result<(), AccessorError> {
        self.timeline_delete(tenant, timeline).map_err(Into::into)
    }
}

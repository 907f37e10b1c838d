//! The two capabilities the scan pipeline depends on. Anything that talks to
//! a cloud provider lives behind these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::ResourceMetrics;
use crate::window::TimeWindow;

/// A candidate resource under a grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_id: String,
    pub resource_name: String,
}

impl ResourceRef {
    pub fn new(resource_id: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_name: resource_name.into(),
        }
    }
}

/// Enumerates the resources under a grouping, in a stable order.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    /// Fails with [`crate::Error::GroupingNotFound`] when the grouping does
    /// not exist.
    async fn list(&self, grouping_key: &str) -> Result<Vec<ResourceRef>>;
}

/// Retrieves metric series for one resource over a window.
#[async_trait]
pub trait ResourceMetricsFetcher: Send + Sync {
    /// Returns at most one series per requested name; names the provider
    /// does not recognize may be missing from the result. Fails with
    /// [`crate::Error::MetricsUnavailable`] when the provider cannot answer.
    async fn fetch(
        &self,
        resource_id: &str,
        window: &TimeWindow,
        metric_names: &[String],
    ) -> Result<ResourceMetrics>;
}

use futures::stream::{self, StreamExt};

use crate::classify;
use crate::error::Result;
use crate::metrics::{default_metric_names, ResourceMetrics};
use crate::report::{ClassificationResult, Report, ReportBuilder};
use crate::source::{ResourceLister, ResourceMetricsFetcher, ResourceRef};
use crate::window::TimeWindow;

/// Options controlling a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub metric_names: Vec<String>,
    pub window: TimeWindow,
    /// Maximum metric fetches in flight. 1 means strictly sequential.
    pub concurrency: usize,
}

impl ScanOptions {
    /// Default metric names, sequential fetching.
    pub fn new(window: TimeWindow) -> Self {
        Self {
            metric_names: default_metric_names(),
            window,
            concurrency: 1,
        }
    }
}

/// Callback trait for reporting scan progress.
pub trait ScanProgress: Send + Sync {
    fn on_resources_listed(&self, _grouping_key: &str, _count: usize) {}
    /// Called in listing order, regardless of fetch completion order.
    fn on_resource_complete(&self, _result: &ClassificationResult, _index: usize, _total: usize) {}
}

/// No-op progress implementation for callers that don't need progress reporting.
pub struct NoopProgress;

impl ScanProgress for NoopProgress {}

/// Drives list → fetch → classify → report for one grouping.
pub struct Scanner {
    lister: Box<dyn ResourceLister>,
    fetcher: Box<dyn ResourceMetricsFetcher>,
}

impl Scanner {
    pub fn new(
        lister: impl ResourceLister + 'static,
        fetcher: impl ResourceMetricsFetcher + 'static,
    ) -> Self {
        Self {
            lister: Box::new(lister),
            fetcher: Box::new(fetcher),
        }
    }

    /// Classify every resource under `grouping_key`.
    ///
    /// Listing failures abort the run. A fetch failure only affects its own
    /// resource, which is then reported as not deallocatable.
    pub async fn run(
        &self,
        grouping_key: &str,
        options: &ScanOptions,
        progress: &dyn ScanProgress,
    ) -> Result<Report> {
        let resources = self.lister.list(grouping_key).await?;
        let total = resources.len();
        log::info!(
            "Found {total} resources under {grouping_key}; evaluating {} ({} buckets)",
            options.window,
            options.window.bucket_count()
        );
        progress.on_resources_listed(grouping_key, total);

        // `buffered` yields in input order even when later fetches finish first.
        let mut evaluations = stream::iter(resources.iter().enumerate())
            .map(|(i, resource)| async move { (i, self.evaluate(resource, options).await) })
            .buffered(options.concurrency.max(1));

        let mut results = Vec::with_capacity(total);
        while let Some((i, result)) = evaluations.next().await {
            progress.on_resource_complete(&result, i, total);
            results.push(result);
        }

        Ok(ReportBuilder::build(grouping_key, results))
    }

    async fn evaluate(&self, resource: &ResourceRef, options: &ScanOptions) -> ClassificationResult {
        let fetched = self
            .fetcher
            .fetch(&resource.resource_id, &options.window, &options.metric_names)
            .await;

        let (metrics, unavailable_reason) = match fetched {
            Ok(metrics) => (metrics, None),
            Err(e) => {
                log::warn!("Treating {} as active: {e}", resource.resource_name);
                (ResourceMetrics::empty(&resource.resource_id), Some(e.to_string()))
            }
        };

        let verdict = classify::evaluate(&metrics);
        log::debug!(
            "{}: {verdict} ({} series, {} samples)",
            resource.resource_name,
            metrics.series.len(),
            metrics.sample_count()
        );

        ClassificationResult {
            resource_id: resource.resource_id.clone(),
            resource_name: resource.resource_name.clone(),
            idle: verdict.is_idle(),
            metrics,
            unavailable_reason,
        }
    }
}

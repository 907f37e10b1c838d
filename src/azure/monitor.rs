use async_trait::async_trait;

use super::client::AzureClient;
use super::models::{Metric, MetricsResponse};
use crate::error::{Error, Result};
use crate::metrics::{default_aggregations, MetricSample, MetricSeries, ResourceMetrics};
use crate::source::ResourceMetricsFetcher;
use crate::window::TimeWindow;

/// API version for `Microsoft.Insights/metrics`.
pub const MONITOR_API_VERSION: &str = "2018-01-01";

/// Fetches platform metrics from Azure Monitor.
pub struct MonitorMetricsFetcher {
    client: AzureClient,
    aggregations: Vec<String>,
}

impl MonitorMetricsFetcher {
    /// Requests `Average` and `Total` aggregations.
    pub fn new(client: AzureClient) -> Self {
        Self {
            client,
            aggregations: default_aggregations(),
        }
    }

    pub fn with_aggregations(mut self, aggregations: Vec<String>) -> Self {
        if !aggregations.is_empty() {
            self.aggregations = aggregations;
        }
        self
    }

    async fn query(
        &self,
        resource_id: &str,
        window: &TimeWindow,
        metric_names: &[String],
    ) -> Result<Option<MetricsResponse>> {
        let path = format!(
            "{}/providers/Microsoft.Insights/metrics",
            resource_id.trim_end_matches('/')
        );
        let timespan = window.timespan();
        let interval = window.interval_iso8601();
        let names = metric_names.join(",");
        let aggregation = self.aggregations.join(",");
        let query = [
            ("api-version", MONITOR_API_VERSION),
            ("timespan", timespan.as_str()),
            ("interval", interval.as_str()),
            ("metricnames", names.as_str()),
            ("aggregation", aggregation.as_str()),
        ];
        self.client.get_optional(&path, &query).await
    }
}

#[async_trait]
impl ResourceMetricsFetcher for MonitorMetricsFetcher {
    async fn fetch(
        &self,
        resource_id: &str,
        window: &TimeWindow,
        metric_names: &[String],
    ) -> Result<ResourceMetrics> {
        let unavailable = |reason: String| Error::MetricsUnavailable {
            resource_id: resource_id.to_string(),
            reason,
        };

        let response = self
            .query(resource_id, window, metric_names)
            .await
            .map_err(|e| unavailable(e.to_string()))?
            .ok_or_else(|| unavailable("resource not found".into()))?;

        log::debug!(
            "{resource_id}: {} metrics over {} at {}",
            response.value.len(),
            response.timespan.as_deref().unwrap_or("?"),
            response.interval.as_deref().unwrap_or("?")
        );

        let series = response.value.into_iter().map(into_series).collect();
        let metrics = ResourceMetrics::new(resource_id, series);
        for name in metric_names {
            if metrics.series_named(name).is_none() {
                log::debug!("{resource_id}: no {name} series in the response");
            }
        }
        Ok(metrics)
    }
}

/// One series per metric, concatenating the `data` of every timeseries
/// element. If any element carries no `data` the whole series is left empty,
/// which classifies the resource as active.
fn into_series(metric: Metric) -> MetricSeries {
    if let Some(code) = metric.error_code.as_deref().filter(|c| *c != "Success") {
        log::warn!("Metric {} reported error code {code}", metric.name.value);
    }

    let mut samples = Vec::new();
    for element in metric.timeseries {
        let Some(data) = element.data else {
            log::debug!("Metric {} has a timeseries without data", metric.name.value);
            samples.clear();
            break;
        };
        samples.extend(
            data.into_iter()
                .map(|v| MetricSample::new(v.time_stamp, v.average, v.total)),
        );
    }

    MetricSeries::new(metric.name.value, metric.unit, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use std::time::Duration;

    const SITE: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Web/sites/app";

    fn fetcher(base: &str) -> MonitorMetricsFetcher {
        let client = AzureClient::new(base, "token", "sub", Duration::from_secs(5)).unwrap();
        MonitorMetricsFetcher::new(client)
    }

    fn window() -> TimeWindow {
        TimeWindow::default_at(Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap())
    }

    fn names() -> Vec<String> {
        crate::metrics::default_metric_names()
    }

    fn metrics_path() -> String {
        format!("{SITE}/providers/Microsoft.Insights/metrics")
    }

    #[tokio::test]
    async fn test_fetch_maps_series() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "cost": 0,
            "timespan": "2025-01-01T00:00:00Z/2025-01-31T00:00:00Z",
            "interval": "PT1H",
            "value": [
                {
                    "id": "x",
                    "type": "Microsoft.Insights/metrics",
                    "name": {"value": "Requests", "localizedValue": "Requests"},
                    "unit": "Count",
                    "timeseries": [{
                        "metadatavalues": [],
                        "data": [
                            {"timeStamp": "2025-01-01T00:00:00Z", "total": 0.0},
                            {"timeStamp": "2025-01-01T01:00:00Z", "total": 4.0, "average": 1.0}
                        ]
                    }],
                    "errorCode": "Success"
                },
                {
                    "name": {"value": "MemoryWorkingSet"},
                    "unit": "Bytes",
                    "timeseries": [{"metadatavalues": []}]
                },
                {
                    "name": {"value": "AverageMemoryWorkingSet"},
                    "unit": "Bytes",
                    "timeseries": []
                }
            ]
        });
        let mock = server
            .mock("GET", metrics_path().as_str())
            .match_header("authorization", "Bearer token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api-version".into(), MONITOR_API_VERSION.into()),
                Matcher::UrlEncoded(
                    "timespan".into(),
                    "2025-01-01T00:00:00Z/2025-01-31T00:00:00Z".into(),
                ),
                Matcher::UrlEncoded("interval".into(), "PT1H".into()),
                Matcher::UrlEncoded(
                    "metricnames".into(),
                    "Requests,MemoryWorkingSet,AverageMemoryWorkingSet".into(),
                ),
                Matcher::UrlEncoded("aggregation".into(), "Average,Total".into()),
            ]))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let metrics = fetcher(&server.url())
            .fetch(SITE, &window(), &names())
            .await
            .unwrap();

        assert_eq!(metrics.resource_id, SITE);
        assert_eq!(metrics.series.len(), 3);

        let requests = metrics.series_named("requests").unwrap();
        assert_eq!(requests.unit, "Count");
        assert_eq!(requests.samples.len(), 2);
        assert_eq!(requests.samples[0].total, Some(0.0));
        assert_eq!(requests.samples[0].average, None);
        assert_eq!(requests.samples[1].average, Some(1.0));
        assert_eq!(
            requests.samples[1].timestamp,
            Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap()
        );

        assert!(metrics.series_named("MemoryWorkingSet").unwrap().samples.is_empty());
        assert!(metrics
            .series_named("AverageMemoryWorkingSet")
            .unwrap()
            .samples
            .is_empty());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_custom_aggregations() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", metrics_path().as_str())
            .match_query(Matcher::UrlEncoded("aggregation".into(), "Maximum".into()))
            .with_status(200)
            .with_body(r#"{"value": []}"#)
            .create_async()
            .await;

        let metrics = fetcher(&server.url())
            .with_aggregations(vec!["Maximum".into()])
            .fetch(SITE, &window(), &names())
            .await
            .unwrap();
        assert!(metrics.series.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_failures_are_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", metrics_path().as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = fetcher(&server.url())
            .fetch(SITE, &window(), &names())
            .await
            .unwrap_err();
        match err {
            Error::MetricsUnavailable { resource_id, reason } => {
                assert_eq!(resource_id, SITE);
                assert_eq!(reason, "resource not found");
            }
            e => panic!("expected MetricsUnavailable, got {e:?}"),
        }

        let other = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Web/sites/broken";
        let _broken = server
            .mock("GET", format!("{other}/providers/Microsoft.Insights/metrics").as_str())
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error": {"code": "BadRequest", "message": "Invalid timespan"}}"#)
            .create_async()
            .await;

        let err = fetcher(&server.url())
            .fetch(other, &window(), &names())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::MetricsUnavailable { reason, .. } if reason.contains("Invalid timespan")),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_undecodable_body_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", metrics_path().as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = fetcher(&server.url())
            .fetch(SITE, &window(), &names())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MetricsUnavailable { .. }));
    }

    #[test]
    fn test_timeseries_elements_are_joined() {
        let metric: Metric = serde_json::from_value(serde_json::json!({
            "name": {"value": "Requests"},
            "unit": "Count",
            "timeseries": [
                {"data": [{"timeStamp": "2025-01-01T00:00:00Z", "total": 0.0}]},
                {"data": [{"timeStamp": "2025-01-01T00:00:00Z", "total": 2.0}]}
            ]
        }))
        .unwrap();
        let series = into_series(metric);
        assert_eq!(series.metric_name, "Requests");
        assert_eq!(series.samples.len(), 2);
        assert_eq!(series.samples[1].total, Some(2.0));
    }

    #[test]
    fn test_element_without_data_empties_series() {
        let metric: Metric = serde_json::from_value(serde_json::json!({
            "name": {"value": "Requests"},
            "unit": "Count",
            "timeseries": [
                {"data": [{"timeStamp": "2025-01-01T00:00:00Z", "total": 0.0}]},
                {"metadatavalues": []}
            ]
        }))
        .unwrap();
        let series = into_series(metric);
        assert_eq!(series.metric_name, "Requests");
        assert!(series.samples.is_empty());

        let metrics = ResourceMetrics::new(SITE, vec![series]);
        assert!(!crate::classify::classify(&metrics));
    }
}

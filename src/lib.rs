pub mod azure;
pub mod classify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod scan;
pub mod source;
pub mod window;

pub use classify::{classify, evaluate, Verdict};
pub use config::Settings;
pub use error::{Error, Result};
pub use metrics::{MetricSample, MetricSeries, ResourceMetrics};
pub use report::{ClassificationResult, Report, ReportBuilder};
pub use scan::{NoopProgress, ScanOptions, ScanProgress, Scanner};
pub use source::{ResourceLister, ResourceMetricsFetcher, ResourceRef};
pub use window::TimeWindow;

use std::time::Duration;

use azure::{AppServicePlanLister, AzureClient, MonitorMetricsFetcher};

/// Main entry point: scans App Service Plans in one subscription.
pub struct AppIdle {
    scanner: Scanner,
    settings: Settings,
}

impl AppIdle {
    /// Wire the Azure collaborators from resolved settings and an ARM token.
    pub fn new(settings: Settings, token: &str) -> Result<Self> {
        let subscription_id = settings.subscription_id.clone().ok_or_else(|| {
            Error::Config(
                "no subscription ID. Pass --subscription, set AZURE_SUBSCRIPTION_ID, or run: appidle config set subscription_id <ID>"
                    .into(),
            )
        })?;

        let client = AzureClient::new(
            &settings.api_base,
            token,
            subscription_id,
            Duration::from_secs(settings.timeout_secs),
        )?;
        let lister = AppServicePlanLister::new(client.clone(), settings.resource_group.clone());
        let fetcher = MonitorMetricsFetcher::new(client).with_aggregations(settings.aggregations.clone());

        Ok(Self {
            scanner: Scanner::new(lister, fetcher),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Scan options for a run starting now.
    pub fn scan_options(&self) -> Result<ScanOptions> {
        if self.settings.metric_names.is_empty() {
            return Err(Error::Config("no metric names to request".into()));
        }
        Ok(ScanOptions {
            metric_names: self.settings.metric_names.clone(),
            window: self.settings.time_window()?,
            concurrency: self.settings.concurrency.max(1),
        })
    }

    /// Classify every web app on `plan` over the configured window.
    pub async fn scan_plan(&self, plan: &str, progress: &dyn ScanProgress) -> Result<Report> {
        let options = self.scan_options()?;
        self.scanner.run(plan, &options, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_subscription() {
        let err = AppIdle::new(Settings::default(), "token").err().unwrap();
        assert!(matches!(err, Error::Config(msg) if msg.contains("subscription")));
    }

    #[test]
    fn test_scan_options_follow_settings() {
        let mut settings = Settings::default();
        settings.set("subscription_id", "sub").unwrap();
        settings.set("window", "7d").unwrap();
        settings.set("concurrency", "4").unwrap();
        settings.set("metric_names", "Requests").unwrap();

        let app = AppIdle::new(settings, "token").unwrap();
        let options = app.scan_options().unwrap();
        assert_eq!(options.metric_names, vec!["Requests"]);
        assert_eq!(options.concurrency, 4);
        assert_eq!((options.window.end - options.window.start).num_days(), 7);
    }

    #[test]
    fn test_scan_options_need_metric_names() {
        let mut settings = Settings::default();
        settings.set("subscription_id", "sub").unwrap();
        settings.metric_names.clear();

        let app = AppIdle::new(settings, "token").unwrap();
        assert!(matches!(app.scan_options(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_scan_plan_end_to_end() {
        use mockito::Matcher;

        let mut server = mockito::Server::new_async().await;
        let plan = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Web/serverfarms/plan";
        let site = |n: &str| format!("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Web/sites/{n}");

        let _plan = server
            .mock("GET", plan)
            .match_query(Matcher::Any)
            .with_body(format!(r#"{{"id": "{plan}", "name": "plan"}}"#))
            .create_async()
            .await;
        let _sites = server
            .mock("GET", format!("{plan}/sites").as_str())
            .match_query(Matcher::Any)
            .with_body(
                serde_json::json!({
                    "value": [
                        {"id": site("idle"), "name": "idle"},
                        {"id": site("gone"), "name": "gone"},
                        {"id": site("busy"), "name": "busy"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let metrics_body = |total: f64| {
            serde_json::json!({
                "value": [{
                    "name": {"value": "Requests"},
                    "unit": "Count",
                    "timeseries": [{"data": [
                        {"timeStamp": "2025-01-01T00:00:00Z", "total": 0.0},
                        {"timeStamp": "2025-01-01T01:00:00Z", "total": total}
                    ]}]
                }]
            })
            .to_string()
        };
        let _idle = server
            .mock("GET", format!("{}/providers/Microsoft.Insights/metrics", site("idle")).as_str())
            .match_query(Matcher::Any)
            .with_body(metrics_body(0.0))
            .create_async()
            .await;
        let _gone = server
            .mock("GET", format!("{}/providers/Microsoft.Insights/metrics", site("gone")).as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let _busy = server
            .mock("GET", format!("{}/providers/Microsoft.Insights/metrics", site("busy")).as_str())
            .match_query(Matcher::Any)
            .with_body(metrics_body(12.0))
            .create_async()
            .await;

        let mut settings = Settings::default();
        settings.set("subscription_id", "sub").unwrap();
        settings.set("resource_group", "rg").unwrap();
        settings.set("api_base", &server.url()).unwrap();
        settings.set("concurrency", "2").unwrap();

        let app = AppIdle::new(settings, "token").unwrap();
        let report = app.scan_plan("plan", &NoopProgress).await.unwrap();

        assert_eq!(report.grouping_name, "plan");
        assert_eq!(
            report.summary_lines(),
            vec![
                "Resource idle can be deallocated.",
                "Resource gone cannot be deallocated.",
                "Resource busy cannot be deallocated.",
            ]
        );
        assert!(report.results[1].unavailable_reason.is_some());
    }
}

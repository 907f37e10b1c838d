use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One aggregation bucket as reported by the metrics provider.
///
/// Either field may be absent depending on which aggregation types were
/// requested and what the provider populated for this metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, average: Option<f64>, total: Option<f64>) -> Self {
        Self {
            average,
            total,
            timestamp,
        }
    }

    /// True when either aggregate is strictly positive.
    pub fn shows_activity(&self) -> bool {
        self.average.is_some_and(|v| v > 0.0) || self.total.is_some_and(|v| v > 0.0)
    }
}

/// A named metric's samples over the evaluation window, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub metric_name: String,
    pub unit: String,
    #[serde(default)]
    pub samples: Vec<MetricSample>,
}

impl MetricSeries {
    pub fn new(metric_name: impl Into<String>, unit: impl Into<String>, samples: Vec<MetricSample>) -> Self {
        Self {
            metric_name: metric_name.into(),
            unit: unit.into(),
            samples,
        }
    }
}

/// Every series collected for one resource in one evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    pub resource_id: String,
    #[serde(default)]
    pub series: Vec<MetricSeries>,
}

impl ResourceMetrics {
    pub fn new(resource_id: impl Into<String>, series: Vec<MetricSeries>) -> Self {
        Self {
            resource_id: resource_id.into(),
            series,
        }
    }

    /// No series at all. Stands in for metrics that could not be fetched.
    pub fn empty(resource_id: impl Into<String>) -> Self {
        Self::new(resource_id, Vec::new())
    }

    pub fn sample_count(&self) -> usize {
        self.series.iter().map(|s| s.samples.len()).sum()
    }

    pub fn series_named(&self, metric_name: &str) -> Option<&MetricSeries> {
        self.series
            .iter()
            .find(|s| s.metric_name.eq_ignore_ascii_case(metric_name))
    }
}

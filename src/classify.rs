use chrono::{DateTime, Utc};

use crate::metrics::ResourceMetrics;

/// Why a resource was or was not judged idle.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No series came back, so idleness cannot be asserted.
    NoSeries,
    /// A series had no samples; absence of data is not evidence of inactivity.
    EmptySeries { metric: String },
    /// First strictly positive sample found.
    Activity {
        metric: String,
        timestamp: DateTime<Utc>,
    },
    /// Every sample in every series was absent, zero or negative.
    Idle,
}

impl Verdict {
    pub fn is_idle(&self) -> bool {
        matches!(self, Verdict::Idle)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::NoSeries => write!(f, "no metric series returned"),
            Verdict::EmptySeries { metric } => write!(f, "series {metric} has no samples"),
            Verdict::Activity { metric, timestamp } => {
                write!(f, "{metric} active at {}", timestamp.to_rfc3339())
            }
            Verdict::Idle => write!(f, "no activity in any series"),
        }
    }
}

/// Walk the series in order and stop at the first thing that rules out
/// idleness. Empty series are checked before any sample is scanned.
pub fn evaluate(metrics: &ResourceMetrics) -> Verdict {
    if metrics.series.is_empty() {
        return Verdict::NoSeries;
    }

    if let Some(series) = metrics.series.iter().find(|s| s.samples.is_empty()) {
        return Verdict::EmptySeries {
            metric: series.metric_name.clone(),
        };
    }

    for series in &metrics.series {
        if let Some(sample) = series.samples.iter().find(|s| s.shows_activity()) {
            return Verdict::Activity {
                metric: series.metric_name.clone(),
                timestamp: sample.timestamp,
            };
        }
    }

    Verdict::Idle
}

/// True iff the resource can be deallocated.
pub fn classify(metrics: &ResourceMetrics) -> bool {
    evaluate(metrics).is_idle()
}

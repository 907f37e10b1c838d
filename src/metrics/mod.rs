pub mod types;

pub use types::*;

/// Metric names requested when none are configured.
pub const DEFAULT_METRIC_NAMES: &[&str] = &["Requests", "MemoryWorkingSet", "AverageMemoryWorkingSet"];

/// Aggregation types requested when none are configured.
pub const DEFAULT_AGGREGATIONS: &[&str] = &["Average", "Total"];

pub fn default_metric_names() -> Vec<String> {
    DEFAULT_METRIC_NAMES.iter().map(|s| s.to_string()).collect()
}

pub fn default_aggregations() -> Vec<String> {
    DEFAULT_AGGREGATIONS.iter().map(|s| s.to_string()).collect()
}

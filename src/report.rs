use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::ResourceMetrics;

/// The outcome for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub resource_id: String,
    pub resource_name: String,
    #[serde(rename = "canBeDeallocated")]
    pub idle: bool,
    pub metrics: ResourceMetrics,
    /// Set when the metrics could not be fetched and an empty set was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
}

impl ClassificationResult {
    /// Console line for this resource.
    pub fn summary_line(&self) -> String {
        if self.idle {
            format!("Resource {} can be deallocated.", self.resource_name)
        } else {
            format!("Resource {} cannot be deallocated.", self.resource_name)
        }
    }
}

/// Root of the JSON output. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub grouping_name: String,
    pub results: Vec<ClassificationResult>,
}

impl Report {
    pub fn summary_lines(&self) -> Vec<String> {
        self.results.iter().map(|r| r.summary_line()).collect()
    }

    pub fn idle_count(&self) -> usize {
        self.results.iter().filter(|r| r.idle).count()
    }

    pub fn unavailable_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.unavailable_reason.is_some())
            .count()
    }
}

/// Assembles and serializes reports.
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn build(grouping_name: impl Into<String>, results: Vec<ClassificationResult>) -> Report {
        Report {
            grouping_name: grouping_name.into(),
            results,
        }
    }

    /// Pretty-printed JSON with two-space indentation.
    ///
    /// JSON has no NaN or infinity, so a report holding one is rejected
    /// rather than written with `null` in its place.
    pub fn serialize(report: &Report) -> Result<String> {
        for result in &report.results {
            for series in &result.metrics.series {
                let non_finite = series
                    .samples
                    .iter()
                    .flat_map(|s| [s.average, s.total])
                    .flatten()
                    .find(|v| !v.is_finite());
                if let Some(v) = non_finite {
                    return Err(Error::Serialization(format!(
                        "{} {} has non-finite value {v}",
                        result.resource_name, series.metric_name
                    )));
                }
            }
        }
        Ok(serde_json::to_string_pretty(report)?)
    }

    pub fn deserialize(json: &str) -> Result<Report> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the whole report, then replace `path` in one rename.
    ///
    /// The report is borrowed, so a failed write can be retried without
    /// rerunning the scan.
    pub fn write(report: &Report, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = Self::serialize(report)?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        set_report_permissions(tmp.as_file(), path)?;
        tmp.persist(path).map_err(|e| e.error)?;

        log::info!("Wrote report for {} to {}", report.grouping_name, path.display());
        Ok(())
    }
}

/// Temp files are created owner-only; give the report the mode of the file it
/// replaces, or `0644` for a new one.
#[cfg(unix)]
fn set_report_permissions(file: &std::fs::File, path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o7777)
        .unwrap_or(0o644);
    file.set_permissions(std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_report_permissions(_file: &std::fs::File, _path: &Path) -> Result<()> {
    Ok(())
}

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::azure::DEFAULT_API_BASE;
use crate::error::{Error, Result};
use crate::metrics::{default_aggregations, default_metric_names};
use crate::window::{TimeWindow, DEFAULT_INTERVAL, DEFAULT_WINDOW};

/// Keys accepted by `config get` / `config set`.
pub const KEYS: &[&str] = &[
    "subscription_id",
    "resource_group",
    "metric_names",
    "aggregations",
    "window",
    "interval",
    "output",
    "concurrency",
    "api_base",
    "timeout_secs",
];

/// Persistent settings, stored as JSON under `~/.appidle/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub metric_names: Vec<String>,
    pub aggregations: Vec<String>,
    pub window: String,
    pub interval: String,
    pub output: PathBuf,
    pub concurrency: usize,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subscription_id: None,
            resource_group: None,
            metric_names: default_metric_names(),
            aggregations: default_aggregations(),
            window: DEFAULT_WINDOW.to_string(),
            interval: DEFAULT_INTERVAL.to_string(),
            output: PathBuf::from("output.json"),
            concurrency: 1,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Settings {
    /// `~/.appidle/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?;
        Ok(home.join(".appidle").join("config.json"))
    }

    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))?;
        settings
            .validate()
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))?;
        Ok(settings)
    }

    /// The checks `set` applies to each key, over the whole struct.
    pub fn validate(&self) -> Result<()> {
        for (key, list) in [
            ("metric_names", &self.metric_names),
            ("aggregations", &self.aggregations),
        ] {
            if list.is_empty() || list.iter().any(|v| v.trim().is_empty()) {
                return Err(Error::Config(format!("{key} needs at least one value")));
            }
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be a positive integer, got '0'".into()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be a positive integer, got '0'".into()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::Config("output path cannot be empty".into()));
        }
        url::Url::parse(&self.api_base)?;
        self.time_window()?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `AZURE_SUBSCRIPTION_ID`, `AZURE_RESOURCE_GROUP` and `APPIDLE_API_BASE`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("AZURE_SUBSCRIPTION_ID") {
            self.subscription_id = Some(v);
        }
        if let Some(v) = non_empty("AZURE_RESOURCE_GROUP") {
            self.resource_group = Some(v);
        }
        if let Some(v) = non_empty("APPIDLE_API_BASE") {
            self.api_base = v;
        }
    }

    /// The evaluation window ending now.
    pub fn time_window(&self) -> Result<TimeWindow> {
        TimeWindow::parse(&self.window, &self.interval, Utc::now())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = match key {
            "subscription_id" => self.subscription_id.clone(),
            "resource_group" => self.resource_group.clone(),
            "metric_names" => Some(self.metric_names.join(",")),
            "aggregations" => Some(self.aggregations.join(",")),
            "window" => Some(self.window.clone()),
            "interval" => Some(self.interval.clone()),
            "output" => Some(self.output.display().to_string()),
            "concurrency" => Some(self.concurrency.to_string()),
            "api_base" => Some(self.api_base.clone()),
            "timeout_secs" => Some(self.timeout_secs.to_string()),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Set a key from its string form, validating the value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "subscription_id" => self.subscription_id = optional(value),
            "resource_group" => self.resource_group = optional(value),
            "metric_names" => self.metric_names = non_empty_list(key, value)?,
            "aggregations" => self.aggregations = non_empty_list(key, value)?,
            "window" => {
                TimeWindow::parse(value, &self.interval, Utc::now())?;
                self.window = value.to_string();
            }
            "interval" => {
                TimeWindow::parse(&self.window, value, Utc::now())?;
                self.interval = value.to_string();
            }
            "output" => {
                if value.is_empty() {
                    return Err(Error::Config("output path cannot be empty".into()));
                }
                self.output = PathBuf::from(value);
            }
            "concurrency" => {
                self.concurrency = value
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| Error::Config(format!("concurrency must be a positive integer, got '{value}'")))?;
            }
            "api_base" => {
                url::Url::parse(value)?;
                self.api_base = value.to_string();
            }
            "timeout_secs" => {
                self.timeout_secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| Error::Config(format!("timeout_secs must be a positive integer, got '{value}'")))?;
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Every key with its current value; unset optional keys are omitted.
    pub fn list(&self) -> Vec<(String, String)> {
        KEYS.iter()
            .filter_map(|k| {
                self.get(k)
                    .ok()
                    .flatten()
                    .map(|v| (k.to_string(), v))
            })
            .collect()
    }
}

fn unknown_key(key: &str) -> Error {
    Error::Config(format!("unknown config key '{key}'. Valid keys: {}", KEYS.join(", ")))
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Split a comma-separated value, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty_list(key: &str, value: &str) -> Result<Vec<String>> {
    let items = split_list(value);
    if items.is_empty() {
        return Err(Error::Config(format!("{key} needs at least one value")));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(
            s.metric_names,
            vec!["Requests", "MemoryWorkingSet", "AverageMemoryWorkingSet"]
        );
        assert_eq!(s.aggregations, vec!["Average", "Total"]);
        assert_eq!(s.window, "30d");
        assert_eq!(s.interval, "1h");
        assert_eq!(s.output, PathBuf::from("output.json"));
        assert_eq!(s.concurrency, 1);
        let w = s.time_window().unwrap();
        assert_eq!((w.end - w.start).num_days(), 30);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.json");

        let mut s = Settings::default();
        s.set("subscription_id", "abc").unwrap();
        s.set("metric_names", "Requests, Http5xx ,").unwrap();
        s.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.metric_names, vec!["Requests", "Http5xx"]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"resource_group": "rg", "concurrency": 4}"#).unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.resource_group.as_deref(), Some("rg"));
        assert_eq!(s.concurrency, 4);
        assert_eq!(s.window, "30d");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        for bad in [
            r#"{"timeout_secs": 0}"#,
            r#"{"concurrency": 0}"#,
            r#"{"metric_names": []}"#,
            r#"{"aggregations": ["Total", " "]}"#,
            r#"{"window": "forever"}"#,
            r#"{"window": "1h", "interval": "1d"}"#,
            r#"{"api_base": "not a url"}"#,
        ] {
            std::fs::write(&path, bad).unwrap();
            let err = Settings::load(&path).unwrap_err();
            assert!(
                matches!(&err, Error::Config(msg) if msg.contains("invalid config file")),
                "{bad}: {err:?}"
            );
        }
    }

    #[test]
    fn test_set_validates() {
        let mut s = Settings::default();
        assert!(s.set("concurrency", "0").is_err());
        assert!(s.set("concurrency", "many").is_err());
        assert!(s.set("window", "forever").is_err());
        assert!(s.set("interval", "60d").is_err());
        assert!(s.set("metric_names", " , ").is_err());
        assert!(s.set("api_base", "not a url").is_err());
        assert!(s.set("timeout_secs", "0").is_err());
        assert!(s.set("color", "blue").is_err());
        assert_eq!(s, Settings::default());

        s.set("window", "7d").unwrap();
        s.set("interval", "PT15M").unwrap();
        s.set("concurrency", "8").unwrap();
        assert_eq!(s.get("window").unwrap().as_deref(), Some("7d"));
        assert_eq!(s.get("concurrency").unwrap().as_deref(), Some("8"));
    }

    #[test]
    fn test_clearing_optional_keys() {
        let mut s = Settings::default();
        s.set("resource_group", "rg").unwrap();
        s.set("resource_group", "").unwrap();
        assert_eq!(s.get("resource_group").unwrap(), None);
        assert!(s.get("bogus").is_err());
    }

    #[test]
    fn test_list_omits_unset() {
        let s = Settings::default();
        let keys: Vec<String> = s.list().into_iter().map(|(k, _)| k).collect();
        assert!(!keys.contains(&"subscription_id".to_string()));
        assert!(keys.contains(&"metric_names".to_string()));
        assert_eq!(keys.len(), KEYS.len() - 2);
    }

    #[test]
    fn test_env_overrides() {
        let mut s = Settings::default();
        s.subscription_id = Some("from-file".into());
        s.apply_env_from(|key| match key {
            "AZURE_SUBSCRIPTION_ID" => Some("from-env".into()),
            "AZURE_RESOURCE_GROUP" => Some("  ".into()),
            "APPIDLE_API_BASE" => Some("http://localhost:8080".into()),
            _ => None,
        });
        assert_eq!(s.subscription_id.as_deref(), Some("from-env"));
        assert_eq!(s.resource_group, None);
        assert_eq!(s.api_base, "http://localhost:8080");
    }
}

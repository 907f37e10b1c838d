use std::sync::LazyLock;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use regex::Regex;

use crate::error::{Error, Result};

static RE_TRAILING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*([hdw])$").unwrap());
static RE_SHORT_INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*([mhd])$").unwrap());
static RE_ISO_INTERVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?)?$").unwrap()
});

/// Default evaluation window: the trailing 30 days.
pub const DEFAULT_WINDOW: &str = "30d";

/// Default aggregation bucket size.
pub const DEFAULT_INTERVAL: &str = "1h";

/// The time range metrics are evaluated over, plus the aggregation bucket
/// size the provider should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Duration,
}

impl TimeWindow {
    /// Build a window, rejecting inverted ranges and intervals that are not
    /// positive or do not fit inside the range.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, interval: Duration) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidWindow(format!(
                "start {} is not before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        if interval <= Duration::zero() {
            return Err(Error::InvalidWindow("interval must be positive".into()));
        }
        if interval > end - start {
            return Err(Error::InvalidWindow(format!(
                "interval {} is longer than the window",
                format_iso8601_duration(interval)
            )));
        }
        Ok(Self {
            start,
            end,
            interval,
        })
    }

    /// The trailing 30 days ending at `now`, in 1-hour buckets.
    pub fn default_at(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(30),
            end: now,
            interval: Duration::hours(1),
        }
    }

    /// Parse a window and interval.
    ///
    /// Window formats:
    /// - `30d`, `12h`, `2w`: trailing range ending at `now`
    /// - `2025-01-01T00:00:00Z/2025-01-31T00:00:00Z`: explicit RFC 3339 range
    ///
    /// Interval formats: `5m`, `1h`, `1d`, or ISO-8601 `PT5M`, `PT1H`, `P1D`.
    pub fn parse(window: &str, interval: &str, now: DateTime<Utc>) -> Result<Self> {
        let interval = parse_interval(interval)?;
        let window = window.trim();

        if let Some((start, end)) = window.split_once('/') {
            let start = parse_instant(start)?;
            let end = parse_instant(end)?;
            return Self::new(start, end, interval);
        }

        let caps = RE_TRAILING
            .captures(window)
            .ok_or_else(|| Error::InvalidWindow(format!("unrecognized window: {window}")))?;
        let n: i64 = caps[1]
            .parse()
            .map_err(|_| Error::InvalidWindow(format!("window too large: {window}")))?;
        let span = match caps[2].to_ascii_lowercase().as_str() {
            "h" => Duration::try_hours(n),
            "d" => Duration::try_days(n),
            _ => Duration::try_weeks(n),
        }
        .ok_or_else(|| Error::InvalidWindow(format!("window too large: {window}")))?;
        let start = now
            .checked_sub_signed(span)
            .ok_or_else(|| Error::InvalidWindow(format!("window too large: {window}")))?;
        Self::new(start, now, interval)
    }

    /// `start/end` in the form Azure Monitor expects for `timespan`.
    pub fn timespan(&self) -> String {
        format!(
            "{}/{}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    pub fn interval_iso8601(&self) -> String {
        format_iso8601_duration(self.interval)
    }

    /// Number of aggregation buckets the window spans (rounded up).
    pub fn bucket_count(&self) -> i64 {
        let span = (self.end - self.start).num_seconds();
        let step = self.interval.num_seconds().max(1);
        (span + step - 1) / step
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} every {}", self.timespan(), self.interval_iso8601())
    }
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidWindow(format!("invalid instant '{s}': {e}")))
}

/// Parse an aggregation interval such as `1h`, `15m`, `PT1H` or `P1D`.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || Error::InvalidWindow(format!("unrecognized interval: {s}"));

    if let Some(caps) = RE_SHORT_INTERVAL.captures(s) {
        let n: i64 = caps[1].parse().map_err(|_| invalid())?;
        let d = match caps[2].to_ascii_lowercase().as_str() {
            "m" => Duration::try_minutes(n),
            "h" => Duration::try_hours(n),
            _ => Duration::try_days(n),
        };
        return d.ok_or_else(invalid);
    }

    if let Some(caps) = RE_ISO_INTERVAL.captures(s) {
        if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
            return Err(invalid());
        }
        let part = |i: usize| -> Result<i64> {
            caps.get(i)
                .map(|m| m.as_str().parse::<i64>().map_err(|_| invalid()))
                .unwrap_or(Ok(0))
        };
        let days = Duration::try_days(part(1)?).ok_or_else(invalid)?;
        let hours = Duration::try_hours(part(2)?).ok_or_else(invalid)?;
        let minutes = Duration::try_minutes(part(3)?).ok_or_else(invalid)?;
        return days
            .checked_add(&hours)
            .and_then(|d| d.checked_add(&minutes))
            .ok_or_else(invalid);
    }

    Err(invalid())
}

/// Format a duration as the coarsest exact ISO-8601 form (`P1D`, `PT6H`, `PT5M`).
pub fn format_iso8601_duration(d: Duration) -> String {
    let secs = d.num_seconds();
    if secs > 0 && secs % 86_400 == 0 {
        format!("P{}D", secs / 86_400)
    } else if secs > 0 && secs % 3_600 == 0 {
        format!("PT{}H", secs / 3_600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("PT{}M", secs / 60)
    } else {
        format!("PT{secs}S")
    }
}

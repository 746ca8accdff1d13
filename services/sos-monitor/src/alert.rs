//! SOS alert records and list filtering

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp layouts the backend has been seen to emit besides RFC 3339
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Lifecycle status of an SOS alert, as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    InProgress,
    Resolved,
}

impl AlertStatus {
    /// Only pending alerts count as active
    pub fn is_active(self) -> bool {
        self == AlertStatus::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::InProgress => "in_progress",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Pending => write!(f, "Pending"),
            AlertStatus::InProgress => write!(f, "In Progress"),
            AlertStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

impl FromStr for AlertStatus {
    type Err = crate::SosMonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AlertStatus::Pending),
            "in_progress" => Ok(AlertStatus::InProgress),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(crate::SosMonitorError::Config(format!(
                "Unknown alert status '{}'",
                other
            ))),
        }
    }
}

/// An SOS alert raised by a field guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    #[serde(rename = "sos_type")]
    pub kind: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "created_at", deserialize_with = "deserialize_timestamp")]
    pub raised_at: DateTime<Utc>,
    #[serde(default)]
    pub staff_id: Option<i64>,
    #[serde(rename = "guard_name", default)]
    pub raised_by: Option<String>,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl AlertRecord {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_emergency(&self) -> bool {
        self.kind == "emergency"
    }

    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Parse a backend timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp '{}'", raw)))
}

/// Query values of `all` or empty mean "no constraint"
fn deserialize_optional_filter<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Count the active alerts in a snapshot
pub fn count_active(alerts: &[AlertRecord]) -> usize {
    alerts.iter().filter(|a| a.is_active()).count()
}

/// Filter for the alert list view: status plus an inclusive date range
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlertFilter {
    #[serde(default, deserialize_with = "deserialize_optional_filter")]
    pub status: Option<AlertStatus>,
    #[serde(default, deserialize_with = "deserialize_optional_filter")]
    pub from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_filter")]
    pub to: Option<NaiveDate>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &AlertRecord) -> bool {
        if let Some(status) = self.status {
            if alert.status != status {
                return false;
            }
        }

        let raised = alert.raised_at.naive_utc();
        if let Some(from) = self.from {
            if raised < from.and_time(NaiveTime::MIN) {
                return false;
            }
        }
        if let Some(to) = self.to {
            // the end date covers the whole day
            let end_of_day =
                NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
            if raised > to.and_time(end_of_day) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, alerts: &'a [AlertRecord]) -> Vec<&'a AlertRecord> {
        alerts.iter().filter(|a| self.matches(a)).collect()
    }
}

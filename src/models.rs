//! Data models for the conversion rollup.
//!
//! This module contains the activity records read from an export, the
//! period filter chosen by the user, and the summary rows and report
//! structures derived from them.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// A single activity row as exported by the activity listing.
///
/// Every field is optional on the wire. Missing or malformed values fall
/// back to an empty string, zero, or no date, so one bad row never stops
/// the rest of an export from being read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Reference id of the agent who logged the activity.
    #[serde(rename = "referenceid", default, deserialize_with = "lenient_string")]
    pub agent_id: String,
    #[serde(rename = "AgentFirstname", default, deserialize_with = "lenient_string")]
    pub agent_first_name: String,
    #[serde(rename = "AgentLastname", default, deserialize_with = "lenient_string")]
    pub agent_last_name: String,
    /// When the activity was recorded.
    #[serde(rename = "date_created", default, deserialize_with = "lenient_datetime")]
    pub occurred_at: Option<NaiveDateTime>,
    /// Monthly quota baseline for the agent.
    #[serde(rename = "targetquota", default, deserialize_with = "lenient_amount")]
    pub target_quota: f64,
    #[serde(rename = "soamount", default, deserialize_with = "lenient_amount")]
    pub order_amount: f64,
    #[serde(rename = "actualsales", default, deserialize_with = "lenient_amount")]
    pub actual_sales_amount: f64,
    #[serde(rename = "typeactivity", default, deserialize_with = "lenient_string")]
    pub activity_type: String,
    #[serde(rename = "activitystatus", default, deserialize_with = "lenient_string")]
    pub activity_status: String,
    #[serde(rename = "source", default, deserialize_with = "lenient_string")]
    pub source_channel: String,
    /// Reference id of the agent's manager.
    #[serde(default, deserialize_with = "lenient_string")]
    pub manager: String,
    /// Reference id of the agent's territory sales manager.
    #[serde(default, deserialize_with = "lenient_string")]
    pub tsm: String,
    #[serde(rename = "typeclient", default, deserialize_with = "lenient_string")]
    pub client_type: String,
    /// Set when a users directory was given and had no entry for the agent.
    #[serde(skip)]
    pub agent_unresolved: bool,
}

impl ActivityRecord {
    /// Calendar date of the activity, if it has one.
    pub fn date(&self) -> Option<NaiveDate> {
        self.occurred_at.map(|dt| dt.date())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Like `lenient_string`, but null and non-scalar values become `None`.
pub(crate) fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_amount(&Value::deserialize(deserializer)?))
}

fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => parse_datetime(&s),
        _ => None,
    })
}

/// Read a monetary or quota value. Numeric columns often arrive as strings.
pub fn parse_amount(value: &Value) -> f64 {
    let amount = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}

/// Parse the timestamp formats seen in activity exports.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    // Month and year are read from the wall-clock time the agent logged.
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Aggregation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodMode {
    /// Month-to-Date: one row per agent per calendar month.
    MonthToDate,
    /// Year-to-Date: one row per agent per calendar year.
    YearToDate,
}

impl fmt::Display for PeriodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodMode::MonthToDate => write!(f, "MTD"),
            PeriodMode::YearToDate => write!(f, "YTD"),
        }
    }
}

/// The user's period selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodFilter {
    pub mode: PeriodMode,
    /// Selected month, 1-12. Ignored in YTD mode.
    pub month: u32,
    pub year: i32,
}

impl PeriodFilter {
    /// Whether a record falls inside the selected window.
    pub fn matches(&self, record: &ActivityRecord) -> bool {
        let Some(date) = record.date() else {
            return false;
        };

        match self.mode {
            PeriodMode::MonthToDate => date.month() == self.month && date.year() == self.year,
            PeriodMode::YearToDate => date.year() == self.year,
        }
    }

    /// Human-readable description of the window, e.g. "MTD March 2025".
    pub fn describe(&self) -> String {
        match self.mode {
            PeriodMode::MonthToDate => match month_name(self.month) {
                Some(name) => format!("MTD {} {}", name, self.year),
                None => format!("MTD month {} of {}", self.month, self.year),
            },
            PeriodMode::YearToDate => format!("YTD {}", self.year),
        }
    }
}

/// English month name for a 1-based month number.
pub fn month_name(month: u32) -> Option<&'static str> {
    u8::try_from(month)
        .ok()
        .and_then(|m| chrono::Month::try_from(m).ok())
        .map(|m| m.name())
}

/// Per-agent, per-period rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow<'a> {
    pub agent_id: String,
    pub agent_first_name: String,
    pub agent_last_name: String,
    /// "March 2025" in MTD mode, "2025" in YTD mode.
    pub period_label: String,
    /// Quota for the period (annualized in YTD mode).
    pub target_quota: f64,
    pub total_order_amount: f64,
    pub total_actual_sales: f64,
    /// Share of the period's working days already elapsed.
    pub elapsed_fraction_percent: f64,
    pub preparation_count: u32,
    pub sales_order_count: u32,
    /// Sales invoice count.
    pub delivered_count: u32,
    pub outbound_call_count: u32,
    /// Records that contributed to this row.
    #[serde(skip)]
    pub source_records: Vec<&'a ActivityRecord>,
}

impl SummaryRow<'_> {
    /// Full display name of the agent.
    pub fn agent_name(&self) -> String {
        format!("{} {}", self.agent_first_name, self.agent_last_name)
            .trim()
            .to_string()
    }

    /// SO to SI conversion percent, zero when there are no sales orders.
    pub fn conversion_percent(&self) -> f64 {
        crate::analysis::conversion_percent(self.delivered_count, self.sales_order_count)
    }
}

/// Grand totals across every summary row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalsRow {
    pub target_quota: f64,
    pub sales_order_count: u32,
    pub delivered_count: u32,
    /// Delivered over sales orders, as a percent.
    pub conversion_ratio: f64,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregation<'a> {
    pub groups: Vec<SummaryRow<'a>>,
    pub totals: TotalsRow,
}

impl Aggregation<'_> {
    /// Number of records that ended up in some group.
    pub fn matched_records(&self) -> usize {
        self.groups.iter().map(|g| g.source_records.len()).sum()
    }
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// File or directory the records were read from.
    pub input: String,
    pub generated_at: DateTime<Utc>,
    /// Date used for the month-to-date pacing indicator.
    pub as_of: NaiveDate,
    pub records_loaded: usize,
    /// Records left after the visibility filters.
    pub records_visible: usize,
    /// Records inside the selected period.
    pub records_matched: usize,
    /// Viewer description, when a role filter was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,
    pub conversion_target_percent: f64,
}

/// A summary row as it appears in a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow<'a> {
    #[serde(flatten)]
    pub summary: &'a SummaryRow<'a>,
    pub conversion_percent: f64,
    pub meets_target: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<&'a [&'a ActivityRecord]>,
}

/// The complete conversion report.
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub metadata: ReportMetadata,
    pub filter: PeriodFilter,
    pub rows: Vec<ReportRow<'a>>,
    pub totals: TotalsRow,
}

impl<'a> Report<'a> {
    /// Build a report from an aggregation.
    ///
    /// A row meets the target when its conversion percent is strictly above
    /// `metadata.conversion_target_percent`.
    pub fn new(
        metadata: ReportMetadata,
        filter: PeriodFilter,
        aggregation: &'a Aggregation<'a>,
        include_records: bool,
    ) -> Self {
        let target = metadata.conversion_target_percent;
        let rows = aggregation
            .groups
            .iter()
            .map(|summary| {
                let conversion_percent = summary.conversion_percent();
                ReportRow {
                    summary,
                    conversion_percent,
                    meets_target: conversion_percent > target,
                    records: include_records.then_some(summary.source_records.as_slice()),
                }
            })
            .collect();

        Self {
            metadata,
            filter,
            rows,
            totals: aggregation.totals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_listing_json() {
        let json = r#"{
            "id": "17",
            "referenceid": "AG-001",
            "AgentFirstname": "Ana",
            "AgentLastname": "Cruz",
            "date_created": "2025-03-05T08:15:00.000Z",
            "targetquota": "5000.00",
            "soamount": 1250.5,
            "actualsales": null,
            "typeactivity": "Sales Order Preparation",
            "activitystatus": "Delivered",
            "source": "Outbound - Touchbase",
            "manager": "MG-01",
            "tsm": "TS-01",
            "typeclient": "Top 50"
        }"#;

        let record: ActivityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.agent_id, "AG-001");
        assert_eq!(record.agent_first_name, "Ana");
        assert_eq!(record.agent_last_name, "Cruz");
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2025, 3, 5));
        assert_eq!(record.target_quota, 5000.0);
        assert_eq!(record.order_amount, 1250.5);
        assert_eq!(record.actual_sales_amount, 0.0);
        assert_eq!(record.client_type, "Top 50");
    }

    #[test]
    fn test_record_missing_fields_default() {
        let record: ActivityRecord = serde_json::from_str(r#"{"referenceid": 42}"#).unwrap();
        assert_eq!(record.agent_id, "42");
        assert!(record.occurred_at.is_none());
        assert_eq!(record.target_quota, 0.0);
        assert!(record.activity_type.is_empty());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&serde_json::json!(10)), 10.0);
        assert_eq!(parse_amount(&serde_json::json!("1,250.75")), 1250.75);
        assert_eq!(parse_amount(&serde_json::json!("n/a")), 0.0);
        assert_eq!(parse_amount(&serde_json::json!(null)), 0.0);
        assert_eq!(parse_amount(&serde_json::json!({"x": 1})), 0.0);
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        for raw in [
            "2025-03-05",
            "2025-03-05 10:20:30",
            "2025-03-05 10:20:30.123456",
            "2025-03-05T10:20:30",
            "2025-03-05T10:20:30Z",
            "2025-03-05T10:20:30+00:00",
        ] {
            assert_eq!(parse_datetime(raw).map(|d| d.date()), Some(expected), "{raw}");
        }
        assert!(parse_datetime("").is_none());
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn test_offset_timestamp_keeps_local_month() {
        let record = ActivityRecord {
            occurred_at: parse_datetime("2025-04-01T00:30:00+08:00"),
            ..Default::default()
        };
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2025, 4, 1));

        let april = PeriodFilter {
            mode: PeriodMode::MonthToDate,
            month: 4,
            year: 2025,
        };
        assert!(april.matches(&record));
        assert!(!PeriodFilter { month: 3, ..april }.matches(&record));

        let new_year = ActivityRecord {
            occurred_at: parse_datetime("2026-01-01T07:59:00+08:00"),
            ..Default::default()
        };
        let ytd = PeriodFilter {
            mode: PeriodMode::YearToDate,
            month: 1,
            year: 2026,
        };
        assert!(ytd.matches(&new_year));
        assert!(!PeriodFilter { year: 2025, ..ytd }.matches(&new_year));
    }

    #[test]
    fn test_period_filter_matches() {
        let record = ActivityRecord {
            occurred_at: parse_datetime("2025-03-05"),
            ..Default::default()
        };

        let march = PeriodFilter {
            mode: PeriodMode::MonthToDate,
            month: 3,
            year: 2025,
        };
        assert!(march.matches(&record));
        assert!(!PeriodFilter { month: 4, ..march }.matches(&record));
        assert!(!PeriodFilter { year: 2024, ..march }.matches(&record));

        let ytd = PeriodFilter {
            mode: PeriodMode::YearToDate,
            month: 11,
            year: 2025,
        };
        assert!(ytd.matches(&record));
        assert!(!ytd.matches(&ActivityRecord::default()));
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(1), Some("January"));
        assert_eq!(month_name(12), Some("December"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
    }

    #[test]
    fn test_period_describe() {
        let filter = PeriodFilter {
            mode: PeriodMode::MonthToDate,
            month: 3,
            year: 2025,
        };
        assert_eq!(filter.describe(), "MTD March 2025");
        assert_eq!(
            PeriodFilter {
                mode: PeriodMode::YearToDate,
                ..filter
            }
            .describe(),
            "YTD 2025"
        );
    }
}

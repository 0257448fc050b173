//! Period rollups and conversion statistics.
//!
//! This module groups activity records by agent and period, sums the
//! per-row metrics, and derives totals and conversion percentages.

use crate::analysis::calendar::FiscalCalendar;
use crate::models::{month_name, ActivityRecord, Aggregation, PeriodFilter, PeriodMode, SummaryRow, TotalsRow};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Tag values that drive the per-row counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTags {
    /// Activity type counted as a quotation preparation.
    #[serde(default = "default_quotation_preparation")]
    pub quotation_preparation: String,

    /// Activity type counted as a sales order.
    #[serde(default = "default_sales_order_preparation")]
    pub sales_order_preparation: String,

    /// Activity status counted as a sales invoice.
    #[serde(default = "default_delivered")]
    pub delivered: String,

    /// Source channel counted as an outbound call.
    #[serde(default = "default_outbound_touchbase")]
    pub outbound_touchbase: String,
}

impl Default for ActivityTags {
    fn default() -> Self {
        Self {
            quotation_preparation: default_quotation_preparation(),
            sales_order_preparation: default_sales_order_preparation(),
            delivered: default_delivered(),
            outbound_touchbase: default_outbound_touchbase(),
        }
    }
}

fn default_quotation_preparation() -> String {
    "Quotation Preparation".to_string()
}

fn default_sales_order_preparation() -> String {
    "Sales Order Preparation".to_string()
}

fn default_delivered() -> String {
    "Delivered".to_string()
}

fn default_outbound_touchbase() -> String {
    "Outbound - Touchbase".to_string()
}

/// Compare a record's tag with a configured tag, ignoring case and padding.
fn tag_matches(value: &str, tag: &str) -> bool {
    value.trim().eq_ignore_ascii_case(tag.trim())
}

/// Everything besides the records and the period that shapes a rollup.
#[derive(Debug, Clone)]
pub struct AggregationRules {
    pub calendar: FiscalCalendar,
    pub tags: ActivityTags,
    /// "Today" for month-to-date pacing.
    pub as_of: NaiveDate,
}

impl AggregationRules {
    pub fn new(calendar: FiscalCalendar, tags: ActivityTags, as_of: NaiveDate) -> Self {
        Self {
            calendar,
            tags,
            as_of,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    first_name: String,
    last_name: String,
    period_label: String,
}

/// Period label for a record date: "March 2025" (MTD) or "2025" (YTD).
pub fn period_label(date: NaiveDate, mode: PeriodMode) -> String {
    match mode {
        PeriodMode::MonthToDate => format!(
            "{} {}",
            month_name(date.month()).unwrap_or_default(),
            date.year()
        ),
        PeriodMode::YearToDate => date.year().to_string(),
    }
}

/// SO to SI conversion as a percent. Zero sales orders yields zero.
pub fn conversion_percent(delivered: u32, sales_orders: u32) -> f64 {
    if sales_orders == 0 {
        0.0
    } else {
        f64::from(delivered) / f64::from(sales_orders) * 100.0
    }
}

/// Roll records up into per-agent, per-period rows plus grand totals.
///
/// Records outside the selected window are ignored. Rows come back in the
/// order their first record was seen. The input is never modified and the
/// same inputs always produce the same output.
pub fn aggregate<'a>(
    records: &'a [ActivityRecord],
    filter: &PeriodFilter,
    rules: &AggregationRules,
) -> Aggregation<'a> {
    let mut groups: Vec<SummaryRow<'a>> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for record in records {
        if !filter.matches(record) {
            continue;
        }
        let Some(date) = record.date() else {
            continue;
        };

        let key = GroupKey {
            first_name: record.agent_first_name.clone(),
            last_name: record.agent_last_name.clone(),
            period_label: period_label(date, filter.mode),
        };

        let slot = *index.entry(key).or_insert_with_key(|key| {
            groups.push(open_row(record, date, key, filter.mode, rules));
            groups.len() - 1
        });

        accumulate(&mut groups[slot], record, &rules.tags);
    }

    let totals = compute_totals(&groups);

    debug!(
        "Aggregated {} of {} records into {} groups for {}",
        groups.iter().map(|g| g.source_records.len()).sum::<usize>(),
        records.len(),
        groups.len(),
        filter.describe()
    );

    Aggregation { groups, totals }
}

/// Start a row from the first record seen for its key.
fn open_row<'a>(
    record: &'a ActivityRecord,
    date: NaiveDate,
    key: &GroupKey,
    mode: PeriodMode,
    rules: &AggregationRules,
) -> SummaryRow<'a> {
    let (target_quota, elapsed_fraction_percent) = match mode {
        PeriodMode::MonthToDate => (
            record.target_quota,
            rules.calendar.month_to_date_percent(rules.as_of.day()),
        ),
        PeriodMode::YearToDate => (
            record.target_quota * 12.0,
            rules.calendar.year_to_date_percent(date.month()),
        ),
    };

    SummaryRow {
        agent_id: record.agent_id.clone(),
        agent_first_name: key.first_name.clone(),
        agent_last_name: key.last_name.clone(),
        period_label: key.period_label.clone(),
        target_quota,
        total_order_amount: 0.0,
        total_actual_sales: 0.0,
        elapsed_fraction_percent,
        preparation_count: 0,
        sales_order_count: 0,
        delivered_count: 0,
        outbound_call_count: 0,
        source_records: Vec::new(),
    }
}

fn accumulate<'a>(row: &mut SummaryRow<'a>, record: &'a ActivityRecord, tags: &ActivityTags) {
    row.total_order_amount += record.order_amount;
    row.total_actual_sales += record.actual_sales_amount;

    if tag_matches(&record.activity_type, &tags.quotation_preparation) {
        row.preparation_count += 1;
    }
    if tag_matches(&record.activity_type, &tags.sales_order_preparation) {
        row.sales_order_count += 1;
    }
    if tag_matches(&record.activity_status, &tags.delivered) {
        row.delivered_count += 1;
    }
    if tag_matches(&record.source_channel, &tags.outbound_touchbase) {
        row.outbound_call_count += 1;
    }

    row.source_records.push(record);
}

/// Grand totals across rows.
pub fn compute_totals(groups: &[SummaryRow<'_>]) -> TotalsRow {
    let mut totals = TotalsRow::default();

    for group in groups {
        totals.target_quota += group.target_quota;
        totals.sales_order_count += group.sales_order_count;
        totals.delivered_count += group.delivered_count;
    }

    totals.conversion_ratio = conversion_percent(totals.delivered_count, totals.sales_order_count);
    totals
}

/// Rows whose conversion is at or below the target, lowest first.
pub fn below_target<'r, 'a: 'r>(
    groups: impl IntoIterator<Item = &'r SummaryRow<'a>>,
    target_percent: f64,
) -> Vec<&'r SummaryRow<'a>> {
    let mut rows: Vec<_> = groups
        .into_iter()
        .filter(|g| g.conversion_percent() <= target_percent)
        .collect();

    rows.sort_by(|a, b| {
        a.conversion_percent()
            .partial_cmp(&b.conversion_percent())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    rows
}

/// Sum of order and actual sales amounts across rows.
pub fn sales_totals<'r, 'a: 'r>(groups: impl IntoIterator<Item = &'r SummaryRow<'a>>) -> (f64, f64) {
    groups.into_iter().fold((0.0, 0.0), |(orders, actual), g| {
        (orders + g.total_order_amount, actual + g.total_actual_sales)
    })
}

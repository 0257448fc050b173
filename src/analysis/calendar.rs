//! Working-day fiscal calendar used for pacing.
//!
//! A month counts as a fixed number of working days regardless of its
//! calendar length, and year-to-date pacing comes from a fixed cumulative
//! table. Both are configuration so they can be overridden.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Working days that make up one fiscal month.
pub const DEFAULT_WORKING_DAYS: u32 = 26;

/// Cumulative share of the fiscal year elapsed at the end of each month.
pub const DEFAULT_CUMULATIVE_PERCENT: [(u32, f64); 12] = [
    (1, 8.3),
    (2, 16.6),
    (3, 25.0),
    (4, 33.3),
    (5, 41.6),
    (6, 50.0),
    (7, 58.3),
    (8, 66.6),
    (9, 75.0),
    (10, 83.3),
    (11, 91.6),
    (12, 100.0),
];

/// Fiscal calendar settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalCalendar {
    /// Working days in one fiscal month.
    #[serde(default = "default_working_days")]
    pub working_days_per_month: u32,

    /// Cumulative percent of the year elapsed, keyed by month number.
    ///
    /// TOML tables need string keys, so months are written as `"1" = 8.3`.
    #[serde(default = "default_cumulative", with = "month_keys")]
    pub cumulative_fraction_by_month: BTreeMap<u32, f64>,
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self {
            working_days_per_month: default_working_days(),
            cumulative_fraction_by_month: default_cumulative(),
        }
    }
}

fn default_working_days() -> u32 {
    DEFAULT_WORKING_DAYS
}

fn default_cumulative() -> BTreeMap<u32, f64> {
    DEFAULT_CUMULATIVE_PERCENT.into_iter().collect()
}

impl FiscalCalendar {
    /// Percent of the month elapsed on the given day of the month.
    ///
    /// Days past the last working day are capped at 100%.
    pub fn month_to_date_percent(&self, day_of_month: u32) -> f64 {
        if self.working_days_per_month == 0 {
            return 0.0;
        }
        let days = day_of_month.min(self.working_days_per_month);
        f64::from(days) / f64::from(self.working_days_per_month) * 100.0
    }

    /// Percent of the year elapsed at the end of the given month.
    ///
    /// Months missing from the table count as zero.
    pub fn year_to_date_percent(&self, month: u32) -> f64 {
        self.cumulative_fraction_by_month
            .get(&month)
            .copied()
            .unwrap_or(0.0)
    }

    /// Reject calendars that cannot produce a meaningful percentage.
    pub fn validate(&self) -> Result<()> {
        if self.working_days_per_month == 0 {
            bail!("calendar.working_days_per_month must be at least 1");
        }

        for (month, percent) in &self.cumulative_fraction_by_month {
            if !(1..=12).contains(month) {
                bail!("calendar month {} is outside 1-12", month);
            }
            if !(0.0..=100.0).contains(percent) {
                bail!(
                    "calendar percent for month {} must be between 0 and 100, got {}",
                    month,
                    percent
                );
            }
        }

        Ok(())
    }
}

mod month_keys {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<u32, f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(month, percent)| (month.to_string(), percent)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u32, f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, f64>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, percent)| {
                key.trim()
                    .parse::<u32>()
                    .map(|month| (month, percent))
                    .map_err(|_| D::Error::custom(format!("invalid month key: {}", key)))
            })
            .collect()
    }
}

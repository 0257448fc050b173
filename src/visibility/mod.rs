//! Record visibility filtering.
//!
//! This module decides which activity records a viewer may see and
//! applies the search, date range, and client type filters before
//! records reach the aggregator.

use crate::models::ActivityRecord;
use chrono::NaiveDate;
use std::fmt;
use tracing::debug;

/// Viewer role, as stored on user accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    SuperAdmin,
    SpecialAccess,
    Manager,
    TerritorySalesManager,
    TerritorySalesAssociate,
    Other(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::SuperAdmin => write!(f, "Super Admin"),
            Role::SpecialAccess => write!(f, "Special Access"),
            Role::Manager => write!(f, "Manager"),
            Role::TerritorySalesManager => write!(f, "Territory Sales Manager"),
            Role::TerritorySalesAssociate => write!(f, "Territory Sales Associate"),
            Role::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "super admin" | "superadmin" => Role::SuperAdmin,
            "special access" => Role::SpecialAccess,
            "manager" => Role::Manager,
            "territory sales manager" | "tsm" => Role::TerritorySalesManager,
            "territory sales associate" | "tsa" => Role::TerritorySalesAssociate,
            _ => Role::Other(s.trim().to_string()),
        }
    }
}

/// The person a report is produced for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub role: Role,
    /// The viewer's own reference id.
    pub reference_id: String,
}

impl Viewer {
    pub fn new(role: Role, reference_id: impl Into<String>) -> Self {
        Self {
            role,
            reference_id: reference_id.into(),
        }
    }

    /// Whether this viewer may see a record.
    ///
    /// Managers see their team, territory sales managers their territory,
    /// associates their own records. Unrecognized roles see nothing.
    pub fn can_see(&self, record: &ActivityRecord) -> bool {
        match self.role {
            Role::SuperAdmin | Role::SpecialAccess => true,
            Role::Manager => record.manager == self.reference_id,
            Role::TerritorySalesManager => record.tsm == self.reference_id,
            Role::TerritorySalesAssociate => record.agent_id == self.reference_id,
            Role::Other(_) => false,
        }
    }
}

impl fmt::Display for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.role, self.reference_id)
    }
}

/// Caller-side filters applied before aggregation.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Role-based visibility; `None` shows everything.
    pub viewer: Option<Viewer>,
    /// Case-insensitive substring of the agent's first or last name.
    pub search: Option<String>,
    /// Inclusive lower bound on the activity date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the activity date.
    pub to: Option<NaiveDate>,
    /// Exact client type.
    pub client_type: Option<String>,
}

/// Applies a [`FilterConfig`] to records.
pub struct RecordFilter {
    config: FilterConfig,
    search: String,
}

impl RecordFilter {
    /// Create a new record filter.
    pub fn new(config: FilterConfig) -> Self {
        let search = config
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        Self { config, search }
    }

    /// Check if a record passes every filter.
    pub fn matches(&self, record: &ActivityRecord) -> bool {
        if let Some(ref viewer) = self.config.viewer {
            if !viewer.can_see(record) {
                return false;
            }
        }

        self.matches_search(record) && self.within_dates(record) && self.matches_client_type(record)
    }

    /// Keep matching records, newest first.
    ///
    /// Records with the same timestamp keep their input order; records
    /// without a date go last.
    pub fn apply(&self, records: Vec<ActivityRecord>) -> Vec<ActivityRecord> {
        let total = records.len();
        let mut visible: Vec<_> = records.into_iter().filter(|r| self.matches(r)).collect();
        visible.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        debug!("{} of {} records visible", visible.len(), total);
        visible
    }

    fn matches_search(&self, record: &ActivityRecord) -> bool {
        if self.search.is_empty() {
            return true;
        }
        if record.agent_unresolved {
            return false;
        }

        record.agent_first_name.to_lowercase().contains(&self.search)
            || record.agent_last_name.to_lowercase().contains(&self.search)
    }

    fn within_dates(&self, record: &ActivityRecord) -> bool {
        if self.config.from.is_none() && self.config.to.is_none() {
            return true;
        }

        let Some(date) = record.date() else {
            return false;
        };

        self.config.from.map_or(true, |from| date >= from)
            && self.config.to.map_or(true, |to| date <= to)
    }

    fn matches_client_type(&self, record: &ActivityRecord) -> bool {
        match self.config.client_type.as_deref() {
            Some(client_type) if !client_type.is_empty() => record.client_type == client_type,
            _ => true,
        }
    }
}

//! Agent name lookup from a users listing.

use crate::models::{lenient_optional_string, ActivityRecord};
use crate::source::loader::{listing_rows, read_json, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Name used when an agent is missing from the directory.
pub const UNKNOWN_AGENT: &str = "Unknown";

/// One entry of the users listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentProfile {
    #[serde(rename = "ReferenceID", default, deserialize_with = "lenient_optional_string")]
    pub reference_id: Option<String>,
    #[serde(rename = "Firstname", default)]
    pub first_name: Option<String>,
    #[serde(rename = "Lastname", default)]
    pub last_name: Option<String>,
}

/// Agents keyed by reference id.
#[derive(Debug, Clone, Default)]
pub struct AgentDirectory {
    agents: HashMap<String, AgentProfile>,
}

impl AgentDirectory {
    /// Load a users listing (bare array or `{ "data": [...] }`).
    pub fn load(path: &Path) -> Result<Self> {
        let rows = listing_rows(read_json(path)?, path)?;

        let profiles = rows.into_iter().filter_map(|row| {
            match serde_json::from_value::<AgentProfile>(row) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!("Skipping user entry in {}: {}", path.display(), e);
                    None
                }
            }
        });

        let directory = Self::from_profiles(profiles);
        debug!("Loaded {} agents from {}", directory.agent_count(), path.display());
        Ok(directory)
    }

    /// Build a directory from profiles. Later duplicates win.
    pub fn from_profiles(profiles: impl IntoIterator<Item = AgentProfile>) -> Self {
        let agents = profiles
            .into_iter()
            .filter_map(|p| {
                let id = p.reference_id.clone().filter(|id| !id.is_empty())?;
                Some((id, p))
            })
            .collect();

        Self { agents }
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn get(&self, reference_id: &str) -> Option<&AgentProfile> {
        self.agents.get(reference_id)
    }

    /// Replace each record's agent names with the directory's.
    ///
    /// Agents not in the directory are named "Unknown Unknown" and flagged
    /// as unresolved, so a name search never matches the placeholder.
    pub fn resolve(&self, records: Vec<ActivityRecord>) -> Vec<ActivityRecord> {
        records
            .into_iter()
            .map(|mut record| {
                let (first, last) = match self.get(&record.agent_id) {
                    Some(agent) => (
                        agent.first_name.clone().unwrap_or_default(),
                        agent.last_name.clone().unwrap_or_default(),
                    ),
                    None => {
                        record.agent_unresolved = true;
                        (UNKNOWN_AGENT.to_string(), UNKNOWN_AGENT.to_string())
                    }
                };
                record.agent_first_name = first;
                record.agent_last_name = last;
                record
            })
            .collect()
    }
}

//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.sotosi.toml` files.

use crate::analysis::{ActivityTags, FiscalCalendar};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".sotosi.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Working-day calendar used for pacing.
    #[serde(default)]
    pub calendar: FiscalCalendar,

    /// Tag values counted by the aggregator.
    #[serde(default)]
    pub tags: ActivityTags,

    /// Default viewer for role-based visibility.
    #[serde(default)]
    pub viewer: ViewerConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path. Reports go to stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Viewer used when no role is given on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Role name, e.g. "Manager".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// The viewer's reference id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Conversion percent a row must exceed to count as on target.
    #[serde(default = "default_conversion_target")]
    pub conversion_target_percent: f64,

    /// Symbol printed before monetary values.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Include contributing records in JSON output.
    #[serde(default)]
    pub include_records: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            conversion_target_percent: default_conversion_target(),
            currency_symbol: default_currency_symbol(),
            include_records: false,
        }
    }
}

fn default_conversion_target() -> f64 {
    70.0
}

fn default_currency_symbol() -> String {
    "₱".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        if let Some(days) = args.working_days {
            self.calendar.working_days_per_month = days;
        }

        if let Some(ref role) = args.role {
            self.viewer.role = Some(role.clone());
        }
        if let Some(ref viewer_id) = args.viewer_id {
            self.viewer.reference_id = Some(viewer_id.clone());
        }

        if let Some(target) = args.target {
            self.report.conversion_target_percent = target;
        }
        if let Some(ref symbol) = args.currency {
            self.report.currency_symbol = symbol.clone();
        }
        if args.include_records {
            self.report.include_records = true;
        }
    }

    /// Check values that would make a report meaningless.
    pub fn validate(&self) -> Result<()> {
        self.calendar.validate()?;

        let target = self.report.conversion_target_percent;
        if !(0.0..=100.0).contains(&target) {
            bail!(
                "report.conversion_target_percent must be between 0 and 100, got {}",
                target
            );
        }

        if self.viewer.role.is_none() && self.viewer.reference_id.is_some() {
            bail!("a viewer reference id requires a role (--role or [viewer] role)");
        }

        if self.viewer.role.is_some() && self.viewer.reference_id.is_none() {
            let role = self.viewer.role.as_deref().unwrap_or_default();
            let needs_id = !matches!(
                crate::visibility::Role::from(role),
                crate::visibility::Role::SuperAdmin | crate::visibility::Role::SpecialAccess
            );
            if needs_id {
                bail!("viewer role '{}' requires a reference id (--viewer-id)", role);
            }
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.calendar.working_days_per_month, 26);
        assert_eq!(config.tags.delivered, "Delivered");
        assert_eq!(config.report.conversion_target_percent, 70.0);
        assert_eq!(config.report.currency_symbol, "₱");
        assert!(config.viewer.role.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "conversion.md"

[calendar]
working_days_per_month = 22

[tags]
sales_order_preparation = "SO Prep"

[viewer]
role = "Manager"
reference_id = "MG-01"

[report]
conversion_target_percent = 65.0
currency_symbol = "$"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output.as_deref(), Some("conversion.md"));
        assert_eq!(config.calendar.working_days_per_month, 22);
        assert_eq!(config.calendar.year_to_date_percent(3), 25.0);
        assert_eq!(config.tags.sales_order_preparation, "SO Prep");
        assert_eq!(config.tags.delivered, "Delivered");
        assert_eq!(config.viewer.reference_id.as_deref(), Some("MG-01"));
        assert_eq!(config.report.conversion_target_percent, 65.0);
        assert_eq!(config.report.currency_symbol, "$");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.report.conversion_target_percent = 150.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.calendar.working_days_per_month = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.viewer.role = Some("Manager".to_string());
        assert!(config.validate().is_err());

        config.viewer.role = Some("Super Admin".to_string());
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.viewer.reference_id = Some("MG-01".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_viewer_id_flag_with_role_from_file() {
        let mut config: Config = toml::from_str("[viewer]\nrole = \"Manager\"\n").unwrap();
        let args = crate::cli::Args::try_parse_from([
            "sotosi",
            "--input",
            "x.json",
            "--viewer-id",
            "MG-01",
        ])
        .unwrap();
        config.merge_with_args(&args);

        assert_eq!(config.viewer.role.as_deref(), Some("Manager"));
        assert_eq!(config.viewer.reference_id.as_deref(), Some("MG-01"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[calendar]"));
        assert!(toml_str.contains("[tags]"));
        assert!(toml_str.contains("[report]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.calendar, FiscalCalendar::default());
        assert_eq!(reparsed.tags, ActivityTags::default());
    }
}

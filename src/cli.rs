//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// sotosi - SO to SI conversion rollups for sales teams
///
/// Summarize exported sales activity into per-agent Month-to-Date or
/// Year-to-Date rows: quota, sales orders, sales invoices, and the
/// SO to SI conversion rate. Markdown, JSON or plain table output.
///
/// Examples:
///   sotosi --input activities.json
///   sotosi --input exports/ --mode ytd --year 2025
///   sotosi --input activities.json --users users.json --role manager --viewer-id MG-01
///   sotosi --input activities.json --month 3 --year 2025 --format json --output march.json
///   sotosi --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Activity export to summarize (JSON file or directory of JSON files)
    #[arg(short, long, value_name = "PATH", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Users listing used to resolve agent names by reference id
    #[arg(short, long, value_name = "FILE")]
    pub users: Option<PathBuf>,

    /// Aggregation period (mtd, ytd)
    #[arg(long, default_value = "mtd", value_name = "MODE")]
    pub mode: PeriodArg,

    /// Month to report on (1-12). Defaults to the month of --as-of
    #[arg(long, value_name = "MONTH")]
    pub month: Option<u32>,

    /// Year to report on. Defaults to the year of --as-of
    #[arg(long, value_name = "YEAR")]
    pub year: Option<i32>,

    /// Date used for month-to-date pacing (YYYY-MM-DD). Defaults to today
    #[arg(long, value_name = "DATE")]
    pub as_of: Option<NaiveDate>,

    /// Viewer role for visibility filtering
    ///
    /// Values: "Super Admin", "Special Access", "Manager",
    /// "Territory Sales Manager" (tsm), "Territory Sales Associate" (tsa)
    #[arg(long, value_name = "ROLE")]
    pub role: Option<String>,

    /// Viewer reference id, matched against manager, tsm or agent id
    #[arg(long, value_name = "REF")]
    pub viewer_id: Option<String>,

    /// Only include agents whose first or last name contains this text
    #[arg(short, long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Only include activities on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Only include activities on or before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Only include activities for this client type
    #[arg(long, value_name = "TYPE")]
    pub client_type: Option<String>,

    /// Output format (markdown, json, table)
    #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Include contributing records in JSON output
    #[arg(long)]
    pub include_records: bool,

    /// Conversion percent a row must exceed to be on target
    #[arg(long, value_name = "PERCENT")]
    pub target: Option<f64>,

    /// Currency symbol for monetary values
    #[arg(long, value_name = "SYMBOL")]
    pub currency: Option<String>,

    /// Working days per fiscal month
    #[arg(long, value_name = "DAYS")]
    pub working_days: Option<u32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .sotosi.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "SOTOSI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Exit with code 2 if the overall conversion is below this percent
    ///
    /// Useful for scheduled checks.
    #[arg(long, value_name = "PERCENT")]
    pub fail_under: Option<f64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .sotosi.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Aggregation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PeriodArg {
    /// Month-to-Date (default)
    #[default]
    Mtd,
    /// Year-to-Date
    Ytd,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// Plain text table
    Table,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err(format!("Month must be between 1 and 12, got {}", month));
            }
        }

        if let Some(year) = self.year {
            if !(1900..=9999).contains(&year) {
                return Err(format!("Year must be between 1900 and 9999, got {}", year));
            }
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err("--from must not be after --to".to_string());
            }
        }

        for (flag, value) in [("--target", self.target), ("--fail-under", self.fail_under)] {
            if let Some(percent) = value {
                if !(0.0..=100.0).contains(&percent) {
                    return Err(format!("{} must be between 0 and 100", flag));
                }
            }
        }

        if self.working_days == Some(0) {
            return Err("Working days must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(format!("Input does not exist: {}", input.display()));
            }
        }

        if let Some(ref users) = self.users {
            if !users.is_file() {
                return Err(format!("Users file does not exist: {}", users.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: None,
            users: None,
            mode: PeriodArg::Mtd,
            month: Some(3),
            year: Some(2025),
            as_of: None,
            role: None,
            viewer_id: None,
            search: None,
            from: None,
            to: None,
            client_type: None,
            format: OutputFormat::Markdown,
            output: None,
            include_records: false,
            target: None,
            currency: None,
            working_days: None,
            config: None,
            fail_under: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "sotosi", "--input", "x.json", "--mode", "ytd", "--year", "2024", "--as-of",
            "2024-06-15", "--format", "table",
        ])
        .unwrap();

        assert_eq!(args.mode, PeriodArg::Ytd);
        assert_eq!(args.year, Some(2024));
        assert_eq!(args.as_of, NaiveDate::from_ymd_opt(2024, 6, 15));
        assert_eq!(args.format, OutputFormat::Table);
    }

    #[test]
    fn test_input_required_unless_init_config() {
        assert!(Args::try_parse_from(["sotosi"]).is_err());
        assert!(Args::try_parse_from(["sotosi", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_month_range() {
        let mut args = make_args();
        assert!(args.validate().is_ok());
        args.month = Some(13);
        assert!(args.validate().is_err());
        args.month = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_date_range() {
        let mut args = make_args();
        args.from = NaiveDate::from_ymd_opt(2025, 4, 1);
        args.to = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_viewer_id_alone() {
        // The role may come from the config file.
        let mut args = make_args();
        args.viewer_id = Some("MG-01".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_percentages() {
        let mut args = make_args();
        args.fail_under = Some(101.0);
        assert!(args.validate().is_err());
        args.fail_under = Some(50.0);
        args.target = Some(-1.0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}

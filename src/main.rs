//! sotosi - SO to SI conversion rollups
//!
//! A CLI tool that reads exported sales activity records and summarizes
//! them into per-agent Month-to-Date or Year-to-Date conversion reports.
//!
//! Exit codes:
//!   0 - Success (or no --fail-under set)
//!   1 - Runtime error (unreadable input, bad config, etc.)
//!   2 - Overall conversion below the --fail-under threshold

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod source;
mod visibility;

use analysis::{aggregate, sales_totals, AggregationRules};
use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, Utc};
use cli::{Args, OutputFormat, PeriodArg};
use config::{Config, ViewerConfig, DEFAULT_CONFIG_FILE};
use models::{PeriodFilter, PeriodMode, Report, ReportMetadata};
use source::AgentDirectory;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use visibility::{FilterConfig, RecordFilter, Role, Viewer};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("sotosi v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .sotosi.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the calendar, activity tags, viewer and report.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report printed to stdout stays clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete report workflow. Returns exit code (0 or 2).
fn run_report(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let filter = period_filter(&args, as_of);
    info!("Reporting {} (as of {})", filter.describe(), as_of);

    // Step 1: Load the records
    let input = args
        .input
        .as_deref()
        .context("An input file or directory is required")?;
    let loaded = source::load_records(input)
        .with_context(|| format!("Failed to load records from {}", input.display()))?;
    let records_loaded = loaded.records.len();

    // Step 2: Resolve agent names
    let records = match args.users {
        Some(ref users) => {
            let directory = AgentDirectory::load(users)
                .with_context(|| format!("Failed to load users from {}", users.display()))?;
            info!("Resolving names against {} agents", directory.agent_count());
            directory.resolve(loaded.records)
        }
        None => loaded.records,
    };

    // Step 3: Apply visibility filters
    let viewer = viewer_from_config(&config.viewer);
    if let Some(ref viewer) = viewer {
        info!("Filtering for viewer {}", viewer);
    }

    let record_filter = RecordFilter::new(FilterConfig {
        viewer: viewer.clone(),
        search: args.search.clone(),
        from: args.from,
        to: args.to,
        client_type: args.client_type.clone(),
    });
    let visible = record_filter.apply(records);

    if visible.is_empty() && records_loaded > 0 {
        warn!("No records are visible with the current filters");
    }

    // Step 4: Aggregate
    let rules = AggregationRules::new(config.calendar.clone(), config.tags.clone(), as_of);
    let aggregation = aggregate(&visible, &filter, &rules);

    // Step 5: Build and render the report
    let metadata = ReportMetadata {
        input: input.display().to_string(),
        generated_at: Utc::now(),
        as_of,
        records_loaded,
        records_visible: visible.len(),
        records_matched: aggregation.matched_records(),
        viewer: viewer.map(|v| v.to_string()),
        conversion_target_percent: config.report.conversion_target_percent,
    };
    let report = Report::new(metadata, filter, &aggregation, config.report.include_records);

    let currency = config.report.currency_symbol.as_str();
    let output = match args.format {
        OutputFormat::Markdown => report::generate_markdown_report(&report, currency),
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Table => report::generate_table_report(&report, currency),
    };

    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path))?;

            let (orders, actual) = sales_totals(&aggregation.groups);
            println!("\n📊 Conversion Summary ({}):", filter.describe());
            println!("   Agents: {}", aggregation.groups.len());
            println!(
                "   SO: {} | SI: {} | Conversion: {}",
                aggregation.totals.sales_order_count,
                aggregation.totals.delivered_count,
                report::format_percent(aggregation.totals.conversion_ratio)
            );
            println!(
                "   SO amount: {} | Actual sales: {}",
                report::format_currency(orders, currency),
                report::format_currency(actual, currency)
            );
            println!("\n✅ Report saved to: {}", path);
        }
        None => print!("{}", output),
    }

    // Check --fail-under threshold
    if let Some(threshold) = args.fail_under {
        if aggregation.totals.conversion_ratio < threshold {
            eprintln!(
                "\n⛔ Conversion {} is below {}. Failing (exit code 2).",
                report::format_percent(aggregation.totals.conversion_ratio),
                report::format_percent(threshold)
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Convert the CLI period flag to the aggregation mode.
fn period_mode(arg: PeriodArg) -> PeriodMode {
    match arg {
        PeriodArg::Mtd => PeriodMode::MonthToDate,
        PeriodArg::Ytd => PeriodMode::YearToDate,
    }
}

/// Selected period, defaulting month and year to the as-of date.
fn period_filter(args: &Args, as_of: NaiveDate) -> PeriodFilter {
    PeriodFilter {
        mode: period_mode(args.mode),
        month: args.month.unwrap_or_else(|| as_of.month()),
        year: args.year.unwrap_or_else(|| as_of.year()),
    }
}

/// Build the viewer from merged configuration, if a role is set.
fn viewer_from_config(viewer: &ViewerConfig) -> Option<Viewer> {
    let role = viewer.role.as_deref()?;
    Some(Viewer::new(
        Role::from(role),
        viewer.reference_id.clone().unwrap_or_default(),
    ))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_period_filter_defaults_to_as_of() {
        let args = Args::try_parse_from(["sotosi", "--input", "x.json"]).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2025, 3, 13).unwrap();

        let filter = period_filter(&args, as_of);

        assert_eq!(filter.mode, PeriodMode::MonthToDate);
        assert_eq!(filter.month, 3);
        assert_eq!(filter.year, 2025);
    }

    #[test]
    fn test_period_filter_explicit() {
        let args = Args::try_parse_from([
            "sotosi", "--input", "x.json", "--mode", "ytd", "--month", "7", "--year", "2023",
        ])
        .unwrap();
        let as_of = NaiveDate::from_ymd_opt(2025, 3, 13).unwrap();

        let filter = period_filter(&args, as_of);

        assert_eq!(filter.mode, PeriodMode::YearToDate);
        assert_eq!(filter.month, 7);
        assert_eq!(filter.year, 2023);
    }

    #[test]
    fn test_viewer_from_config() {
        assert!(viewer_from_config(&ViewerConfig::default()).is_none());

        let viewer = viewer_from_config(&ViewerConfig {
            role: Some("tsm".to_string()),
            reference_id: Some("TS-9".to_string()),
        })
        .unwrap();
        assert_eq!(viewer.role, Role::TerritorySalesManager);
        assert_eq!(viewer.reference_id, "TS-9");
    }

    #[test]
    fn test_report_end_to_end() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("activities.json");
        std::fs::write(
            &input,
            r#"{"data": [
                {"referenceid": "A1", "date_created": "2025-03-05", "targetquota": "5000",
                 "typeactivity": "Sales Order Preparation", "activitystatus": "Delivered", "manager": "M1"},
                {"referenceid": "A2", "date_created": "2025-03-06", "targetquota": 8000,
                 "typeactivity": "Sales Order Preparation", "activitystatus": "Pending", "manager": "M1"},
                {"referenceid": "A3", "date_created": "2025-03-07", "targetquota": 9000,
                 "typeactivity": "Sales Order Preparation", "activitystatus": "Delivered", "manager": "M2"},
                {"referenceid": "A1", "date_created": "2025-04-01", "targetquota": 5000,
                 "typeactivity": "Sales Order Preparation", "activitystatus": "Delivered", "manager": "M1"}
            ]}"#,
        )
        .unwrap();
        let users = dir.path().join("users.json");
        std::fs::write(
            &users,
            r#"[{"ReferenceID": "A1", "Firstname": "Ana", "Lastname": "Cruz"},
                {"ReferenceID": "A2", "Firstname": "Ben", "Lastname": "Reyes"}]"#,
        )
        .unwrap();
        let output = dir.path().join("report.json");

        let args = Args::try_parse_from([
            "sotosi".to_string(),
            "--input".to_string(),
            input.display().to_string(),
            "--users".to_string(),
            users.display().to_string(),
            "--month".to_string(),
            "3".to_string(),
            "--year".to_string(),
            "2025".to_string(),
            "--as-of".to_string(),
            "2025-03-13".to_string(),
            "--role".to_string(),
            "Manager".to_string(),
            "--viewer-id".to_string(),
            "M1".to_string(),
            "--format".to_string(),
            "json".to_string(),
            "--output".to_string(),
            output.display().to_string(),
            "--config".to_string(),
            dir.path().join("absent.toml").display().to_string(),
            "--fail-under".to_string(),
            "60".to_string(),
        ])
        .unwrap();

        // The config path does not exist, so loading fails before any output.
        assert!(run_report(args.clone()).is_err());

        let config_path = dir.path().join("sotosi.toml");
        std::fs::write(&config_path, Config::default_toml()).unwrap();
        let mut args = args;
        args.config = Some(config_path);

        let exit_code = run_report(args).unwrap();
        assert_eq!(exit_code, 2);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["agent_first_name"], "Ben");
        assert_eq!(rows[1]["agent_first_name"], "Ana");
        assert_eq!(json["totals"]["sales_order_count"], 2);
        assert_eq!(json["totals"]["delivered_count"], 1);
        assert_eq!(json["totals"]["conversion_ratio"], 50.0);
        assert_eq!(json["metadata"]["records_loaded"], 4);
        assert_eq!(json["metadata"]["records_visible"], 3);
        assert_eq!(json["metadata"]["records_matched"], 2);
    }
}

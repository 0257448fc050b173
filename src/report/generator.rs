//! Report generation.
//!
//! This module renders conversion reports as Markdown, JSON, or a
//! fixed-width text table.

use crate::analysis::{below_target, sales_totals};
use crate::models::{PeriodMode, Report, ReportMetadata, ReportRow, TotalsRow};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, currency: &str) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# SO to SI Conversion Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata, &report.filter.describe()));

    // Totals
    output.push_str(&generate_summary_section(report, currency));

    // Per-agent rows
    output.push_str(&generate_agents_section(report, currency));

    // Agents at or below target
    output.push_str(&generate_below_target_section(report));

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, period: &str) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Period:** {}\n", period));
    section.push_str(&format!("- **As Of:** {}\n", metadata.as_of.format("%Y-%m-%d")));
    if let Some(ref viewer) = metadata.viewer {
        section.push_str(&format!("- **Viewer:** {}\n", viewer));
    }
    section.push_str(&format!(
        "- **Records:** {} loaded, {} visible, {} in period\n",
        metadata.records_loaded, metadata.records_visible, metadata.records_matched
    ));
    section.push_str(&format!(
        "- **Conversion Target:** {}\n",
        format_percent(metadata.conversion_target_percent)
    ));
    section.push('\n');

    section
}

/// Generate the totals section.
fn generate_summary_section(report: &Report, currency: &str) -> String {
    let mut section = String::new();
    let totals = &report.totals;
    let (orders, actual) = sales_totals(report.rows.iter().map(|r| r.summary));

    section.push_str("## Summary\n\n");
    section.push_str("| Target | # of SO | # of SI | % SO to SI | SO Amount | Actual Sales |\n");
    section.push_str("|---:|:---:|:---:|:---:|---:|---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** | {} | {} |\n\n",
        format_currency(totals.target_quota, currency),
        totals.sales_order_count,
        totals.delivered_count,
        format_percent(totals.conversion_ratio),
        format_currency(orders, currency),
        format_currency(actual, currency),
    ));

    section
}

/// Generate the per-agent section.
fn generate_agents_section(report: &Report, currency: &str) -> String {
    let mut section = String::new();
    let period = period_header(report.filter.mode);
    let target = format_percent(report.metadata.conversion_target_percent);

    section.push_str("## Agents\n\n");

    if report.rows.is_empty() {
        section.push_str("No accounts available\n\n");
        return section;
    }

    section.push_str(&format!(
        "| Agent | {} | Target | Pacing | # of SO | # of SI | % SO to SI | Target |\n",
        period
    ));
    section.push_str("|:---|:---|---:|:---:|:---:|:---:|:---:|:---:|\n");

    for row in &report.rows {
        let summary = row.summary;
        section.push_str(&format!(
            "| **{}** ({}) | {} | {} | {} | {} | {} | {} | {} {} |\n",
            summary.agent_name(),
            summary.agent_id,
            summary.period_label,
            format_currency(summary.target_quota, currency),
            format_percent(summary.elapsed_fraction_percent),
            summary.sales_order_count,
            summary.delivered_count,
            format_percent(row.conversion_percent),
            target_arrow(row),
            target,
        ));
    }
    section.push('\n');

    section
}

/// Generate the list of rows at or below target.
fn generate_below_target_section(report: &Report) -> String {
    let lagging = below_target(
        report.rows.iter().map(|r| r.summary),
        report.metadata.conversion_target_percent,
    );

    if lagging.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Below Target\n\n");

    for (i, row) in lagging.iter().enumerate() {
        section.push_str(&format!(
            "{}. {} ({}): {} ({} of {} sales orders invoiced)\n",
            i + 1,
            row.agent_name(),
            row.period_label,
            format_percent(row.conversion_percent()),
            row.delivered_count,
            row.sales_order_count
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by sotosi*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate a plain text table report.
pub fn generate_table_report(report: &Report, currency: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "SO to SI conversion, {} (as of {})\n\n",
        report.filter.describe(),
        report.metadata.as_of.format("%Y-%m-%d")
    ));

    let headers = [
        "Agent",
        period_header(report.filter.mode),
        "Target",
        "Pacing",
        "# of SO",
        "# of SI",
        "% SO to SI",
        "On Target",
    ];

    let mut rows: Vec<Vec<String>> = vec![totals_cells(&report.totals, currency)];
    rows.extend(report.rows.iter().map(|row| {
        let summary = row.summary;
        vec![
            format!("{} ({})", summary.agent_name(), summary.agent_id),
            summary.period_label.clone(),
            format_currency(summary.target_quota, currency),
            format_percent(summary.elapsed_fraction_percent),
            summary.sales_order_count.to_string(),
            summary.delivered_count.to_string(),
            format_percent(row.conversion_percent),
            target_arrow(row).to_string(),
        ]
    }));

    output.push_str(&render_table(&headers, &rows));

    if report.rows.is_empty() {
        output.push_str("No accounts available\n");
    }

    output
}

fn totals_cells(totals: &TotalsRow, currency: &str) -> Vec<String> {
    vec![
        "TOTAL".to_string(),
        "-".to_string(),
        format_currency(totals.target_quota, currency),
        "-".to_string(),
        totals.sales_order_count.to_string(),
        totals.delivered_count.to_string(),
        format_percent(totals.conversion_ratio),
        "-".to_string(),
    ]
}

/// Render left-aligned columns separated by two spaces.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    let mut table = String::new();
    table.push_str(&render_line(headers.iter().copied(), &widths));
    table.push_str(&render_line(separator.iter().map(String::as_str), &widths));
    for row in rows {
        table.push_str(&render_line(row.iter().map(String::as_str), &widths));
    }

    table
}

fn render_line<'c>(cells: impl Iterator<Item = &'c str>, widths: &[usize]) -> String {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    format!("{}\n", line.join("  ").trim_end())
}

fn period_header(mode: PeriodMode) -> &'static str {
    match mode {
        PeriodMode::MonthToDate => "Month",
        PeriodMode::YearToDate => "Year",
    }
}

fn target_arrow(row: &ReportRow) -> &'static str {
    if row.meets_target {
        "↑"
    } else {
        "↓"
    }
}

/// Format a percentage with two decimals.
pub fn format_percent(percent: f64) -> String {
    format!("{:.2}%", percent)
}

/// Format an amount with a currency symbol and thousands separators.
///
/// Up to three decimals are kept and trailing zeros are dropped, so
/// `1234.5` renders as `₱1,234.5`.
pub fn format_currency(amount: f64, symbol: &str) -> String {
    let rounded = (amount * 1000.0).round() / 1000.0;
    let sign = if rounded < 0.0 { "-" } else { "" };

    let text = format!("{:.3}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut formatted = format!("{}{}{}", sign, symbol, group_thousands(whole));
    if !fraction.is_empty() {
        formatted.push('.');
        formatted.push_str(fraction);
    }
    formatted
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

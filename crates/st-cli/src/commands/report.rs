//! Report command for showing accumulated usage.
//!
//! This module implements `st report` in human-readable and JSON form.

use std::io::Write;

use anyhow::Result;
use chrono::SecondsFormat;
use st_core::{Category, MetricsEngine, Report, SiteSummary};
use st_db::Database;

// ========== Duration Formatting ==========

/// Formats milliseconds as duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if >= 1 minute, "Xs" otherwise.
pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let total_minutes = total_seconds / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else if total_minutes >= 1 {
        format!("{minutes}m")
    } else {
        format!("{total_seconds}s")
    }
}

// ========== Progress Bar ==========

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: u64, max: u64) -> String {
    if max == 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

const fn category_label(category: Category) -> &'static str {
    match category {
        Category::Productive => "productive",
        Category::Distracting => "distracting",
        Category::Neutral => "neutral",
    }
}

fn format_site_line(site: &SiteSummary, max_ms: u64) -> String {
    let sessions = match site.record.sessions {
        1 => "1 session".to_string(),
        n => format!("{n} sessions"),
    };
    let last_visited = site.record.last_visited_at().map_or_else(
        || "never".to_string(),
        |ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    format!(
        "{} {} {} ({sessions}, {}, last visited {last_visited})",
        progress_bar(site.record.time, max_ms),
        site.site,
        format_duration(site.record.time),
        category_label(site.category),
    )
}

// ========== Output ==========

/// Writes the human-readable report.
pub fn write_report<W: Write>(writer: &mut W, report: &Report) -> Result<()> {
    writeln!(writer, "Usage report")?;
    writeln!(writer, "Total time: {}", format_duration(report.total_time_ms))?;
    writeln!(writer, "Focus time: {}", format_duration(report.focus_time_ms))?;
    writeln!(
        writer,
        "Distraction time: {}",
        format_duration(report.distract_time_ms)
    )?;
    writeln!(writer, "Productivity score: {}%", report.productivity_score)?;
    match &report.most_used {
        Some(most_used) => writeln!(
            writer,
            "Most used: {} ({})",
            most_used.site,
            format_duration(most_used.time_ms)
        )?,
        None => writeln!(writer, "Most used: no data yet")?,
    }
    writeln!(writer)?;

    if report.over_limit.is_empty() {
        writeln!(writer, "No limits exceeded.")?;
    } else {
        writeln!(writer, "Limits exceeded:")?;
        for over in &report.over_limit {
            writeln!(
                writer,
                "- {}: {} / {}",
                over.site,
                format_duration(over.time_ms),
                format_duration(over.limit_ms)
            )?;
        }
    }
    writeln!(writer)?;

    if report.sites.is_empty() {
        writeln!(writer, "Start browsing to see data.")?;
        return Ok(());
    }
    writeln!(writer, "Sites:")?;
    let max_ms = report.sites.first().map_or(0, |site| site.record.time);
    for site in &report.sites {
        writeln!(writer, "{}", format_site_line(site, max_ms))?;
    }
    Ok(())
}

/// Run the report command.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    metrics: &MetricsEngine,
    json: bool,
) -> Result<()> {
    let snapshot = db.list_sites()?;
    let report = metrics.report_from(&snapshot);

    if json {
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
    } else {
        write_report(writer, &report)?;
    }
    Ok(())
}

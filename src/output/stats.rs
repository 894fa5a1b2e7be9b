//! Human-readable reports for crawl runs, inventory scans and the database
//!
//! Each report is rendered to a `String` first so the CLI and the tests
//! share one formatting path.

use crate::crawler::CrawlReport;
use crate::ingest::ScanReport;
use crate::storage::{RunRecord, StatsSummary};
use std::fmt::Write;

/// Renders the summary of one crawl run
pub fn render_crawl_report(report: &CrawlReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Crawl Report ===\n");
    let _ = writeln!(out, "Run:       {}", report.run_id);
    let _ = writeln!(out, "Entity:    {}", report.entity);
    let _ = writeln!(out, "Root:      {}", report.root);
    let _ = writeln!(
        out,
        "Status:    {}",
        if report.interrupted { "interrupted" } else { "completed" }
    );
    let _ = writeln!(out, "Duration:  {:.1}s\n", report.elapsed.as_secs_f64());

    let _ = writeln!(out, "Pages fetched: {}", report.pages);
    let _ = writeln!(out, "  Created:   {}", report.created);
    let _ = writeln!(out, "  Updated:   {}", report.updated);
    let _ = writeln!(out, "  Unchanged: {}", report.unchanged);
    let _ = writeln!(out, "  Failed:    {}", report.failed);
    if report.skipped > 0 {
        let _ = writeln!(out, "  Skipped (robots.txt): {}", report.skipped);
    }
    out
}

/// Renders the counts of one inventory scan
pub fn render_scan_report(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Inventory Scan ===\n");
    let _ = writeln!(out, "Directories: {}", report.directories);
    let _ = writeln!(out, "Files seen:  {}", report.files_seen);
    let _ = writeln!(out, "  New:       {}", report.new_files);
    let _ = writeln!(out, "  Changed:   {}", report.changed);
    let _ = writeln!(out, "  Unchanged: {}", report.unchanged);
    let _ = writeln!(out, "  Deleted:   {}", report.deleted);
    out
}

/// Renders database-wide statistics and the latest run, if any
pub fn render_statistics(stats: &StatsSummary, latest_run: Option<&RunRecord>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Harvest Statistics ===\n");

    let _ = writeln!(out, "Web:");
    let _ = writeln!(out, "  Entities:          {}", stats.entities);
    let _ = writeln!(out, "  Sources:           {}", stats.sources);
    let _ = writeln!(out, "  Failing sources:   {}", stats.failed_sources);
    let _ = writeln!(out, "  Document versions: {}", stats.versions);
    let _ = writeln!(out, "  Contact facts:     {}", stats.contacts);
    let _ = writeln!(out);

    let _ = writeln!(out, "Inventory:");
    let _ = writeln!(out, "  File versions: {}", stats.file_versions);
    let _ = writeln!(out, "  Current files: {}", stats.current_files);
    let _ = writeln!(out, "  Deleted files: {}", stats.deleted_files);
    let _ = writeln!(out);

    let _ = writeln!(out, "Runs: {}", stats.runs);
    if let Some(run) = latest_run {
        let _ = writeln!(
            out,
            "  Latest: #{} {} ({}) started {}",
            run.id,
            run.entity,
            run.status.to_db_string(),
            run.started_at
        );
        let _ = writeln!(
            out,
            "    {} created, {} updated, {} unchanged, {} failed",
            run.counters.created, run.counters.updated, run.counters.unchanged, run.counters.failed
        );
    }

    if stats.sources > 0 {
        let healthy = stats.sources.saturating_sub(stats.failed_sources);
        let _ = writeln!(
            out,
            "\nSource success rate: {:.1}%",
            healthy as f64 / stats.sources as f64 * 100.0
        );
    }
    out
}

/// Prints a crawl report to stdout
pub fn print_crawl_report(report: &CrawlReport) {
    print!("{}", render_crawl_report(report));
}

/// Prints an inventory scan report to stdout
pub fn print_scan_report(report: &ScanReport) {
    print!("{}", render_scan_report(report));
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StatsSummary, latest_run: Option<&RunRecord>) {
    print!("{}", render_statistics(stats, latest_run));
}

//! Output module for printing crawl, inventory and database summaries

pub mod stats;

pub use stats::{
    print_crawl_report, print_scan_report, print_statistics, render_crawl_report,
    render_scan_report, render_statistics,
};

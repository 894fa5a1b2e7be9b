//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and a three-state TLS policy
//! - The frontier with dedup, depth, page-budget and host rules
//! - robots.txt, sitemap and auto-seed discovery
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod robots;
mod seeds;
mod sitemap;

pub use coordinator::{Coordinator, CrawlReport};
pub use fetcher::{build_http_client, FetchError, FetchResult, Fetcher};
pub use frontier::{CrawlTarget, FifoQueue, Frontier, FrontierQueue, FrontierStats};
pub use robots::{product_token, ParsedRobots, RobotsGate};
pub use seeds::{auto_seed_urls, AUTO_SEED_PATHS};
pub use sitemap::{discover_sitemap_urls, parse_sitemap, SitemapEntries};

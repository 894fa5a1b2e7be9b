//! Sitemap seeding
//!
//! Reads `/sitemap.xml` (plus any sitemaps declared in robots.txt) and
//! follows one level of sitemap-index children.

use crate::crawler::Fetcher;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::io::Cursor;
use tracing::{debug, info};
use url::Url;

/// Entries found in one sitemap document
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitemapEntries {
    pub pages: Vec<Url>,
    pub children: Vec<Url>,
}

/// Parses a sitemap or sitemap index without loading it into a DOM
pub fn parse_sitemap(xml: &[u8]) -> SitemapEntries {
    let mut entries = SitemapEntries::default();
    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    entries.pages.push(url);
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    entries.children.push(url);
                }
            }
            SiteMapEntity::Err(e) => debug!("Sitemap parse error: {:?}", e),
        }
    }
    entries
}

/// Collects page URLs from the root host's sitemaps
///
/// # Arguments
///
/// * `fetcher` - Fetcher used for the sitemap requests
/// * `root` - Root seed; `/sitemap.xml` is resolved against its origin
/// * `declared` - Sitemaps declared in robots.txt
///
/// # Returns
///
/// Page URLs in document order, deduplicated. Unreachable or malformed
/// sitemaps contribute nothing.
pub async fn discover_sitemap_urls(fetcher: &Fetcher, root: &Url, declared: &[Url]) -> Vec<Url> {
    let mut sitemaps: Vec<Url> = declared.to_vec();
    if let Ok(default) = root.join("/sitemap.xml") {
        if !sitemaps.contains(&default) {
            sitemaps.push(default);
        }
    }

    let mut pages: Vec<Url> = Vec::new();
    for sitemap_url in &sitemaps {
        let Some(entries) = fetch_sitemap(fetcher, sitemap_url).await else {
            continue;
        };
        extend_unique(&mut pages, entries.pages);

        for child in entries.children {
            if let Some(child_entries) = fetch_sitemap(fetcher, &child).await {
                extend_unique(&mut pages, child_entries.pages);
            }
        }
    }

    info!("Sitemaps for {} listed {} URLs", root, pages.len());
    pages
}

async fn fetch_sitemap(fetcher: &Fetcher, url: &Url) -> Option<SitemapEntries> {
    let result = fetcher.fetch(url).await;
    if !result.is_success() {
        debug!("Sitemap {} unavailable: {:?}", url, result.failure_reason());
        return None;
    }
    Some(parse_sitemap(&result.body))
}

fn extend_unique(into: &mut Vec<Url>, more: Vec<Url>) {
    for url in more {
        if !into.contains(&url) {
            into.push(url);
        }
    }
}

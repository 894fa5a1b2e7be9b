//! Crawl frontier: the pending-URL queue plus its dedup and limit state
//!
//! All check-and-insert decisions happen inside one mutex so that links
//! discovered concurrently by several workers are enqueued at most once.

use crate::config::CrawlConfig;
use crate::extract::DiscoveredLink;
use crate::url::{extract_domain, normalize_parsed, path_extension, UrlFilter};
use crate::UrlError;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, trace};
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// Normalized URL, the identity of the target
    pub url: Url,
    /// Link distance from the seeds
    pub depth: u32,
    /// Anchor text of the link that discovered it
    pub link_text: Option<String>,
    pub is_seed: bool,
}

/// Ordering policy of the frontier
///
/// The default [`FifoQueue`] gives breadth-first order. A priority queue
/// can be substituted through [`Frontier::with_queue`].
pub trait FrontierQueue: Send {
    fn push(&mut self, target: CrawlTarget);
    fn pop(&mut self) -> Option<CrawlTarget>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First-in first-out queue
#[derive(Debug, Default)]
pub struct FifoQueue {
    items: VecDeque<CrawlTarget>,
}

impl FrontierQueue for FifoQueue {
    fn push(&mut self, target: CrawlTarget) {
        self.items.push_back(target);
    }

    fn pop(&mut self) -> Option<CrawlTarget> {
        self.items.pop_front()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Counters describing the frontier at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub queued: usize,
    pub enqueued_total: usize,
    pub accepted: u32,
    pub in_flight: usize,
    pub visited: usize,
}

struct FrontierState {
    queue: Box<dyn FrontierQueue>,
    enqueued: HashSet<Url>,
    visited: HashSet<Url>,
    home_hosts: HashSet<String>,
    accepted: u32,
    in_flight: usize,
}

/// URL discovery, dedup and limit state for one crawl run
pub struct Frontier {
    max_pages: u32,
    max_depth: u32,
    allow_external: bool,
    skip_extensions: Vec<String>,
    filter: UrlFilter,
    state: Mutex<FrontierState>,
    notify: Notify,
}

impl Frontier {
    /// Creates an empty breadth-first frontier
    ///
    /// # Errors
    ///
    /// Returns an error if an include or exclude pattern does not compile.
    pub fn new(config: &CrawlConfig) -> Result<Self, UrlError> {
        Self::with_queue(config, Box::<FifoQueue>::default())
    }

    /// Creates a frontier with a custom ordering policy
    pub fn with_queue(config: &CrawlConfig, queue: Box<dyn FrontierQueue>) -> Result<Self, UrlError> {
        Ok(Self {
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            allow_external: config.allow_external,
            skip_extensions: config
                .skip_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            filter: UrlFilter::new(&config.include, &config.exclude)?,
            state: Mutex::new(FrontierState {
                queue,
                enqueued: HashSet::new(),
                visited: HashSet::new(),
                home_hosts: HashSet::new(),
                accepted: 0,
                in_flight: 0,
            }),
            notify: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        // A poisoned lock only means another worker panicked mid-update;
        // the sets themselves are still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds root seeds at depth 0
    ///
    /// Seeds bypass include/exclude filtering and define the hosts that
    /// count as internal. Duplicates are still rejected.
    pub fn seed(&self, urls: &[Url]) -> usize {
        let mut added = 0;
        let mut state = self.lock();
        for url in urls {
            let Ok(url) = normalize_parsed(url.clone()) else {
                continue;
            };
            if let Some(host) = extract_domain(&url) {
                state.home_hosts.insert(host);
            }
            if state.enqueued.insert(url.clone()) {
                state.queue.push(CrawlTarget {
                    url,
                    depth: 0,
                    link_text: None,
                    is_seed: true,
                });
                added += 1;
            }
        }
        drop(state);
        self.notify.notify_waiters();
        added
    }

    /// Adds secondary seeds (sitemap entries, common paths) at a given depth
    ///
    /// These are subject to the host, extension and depth rules, and to
    /// include/exclude filtering unless `ignore_filters` is set.
    pub fn seed_with(&self, urls: &[Url], depth: u32, ignore_filters: bool) -> usize {
        let targets: Vec<CrawlTarget> = urls
            .iter()
            .map(|url| CrawlTarget {
                url: url.clone(),
                depth,
                link_text: None,
                is_seed: true,
            })
            .collect();
        self.admit(targets, ignore_filters)
    }

    /// Enqueues links discovered on a page fetched at `origin_depth`
    ///
    /// Each link is placed at `origin_depth + 1`. Returns how many were new.
    pub fn enqueue(&self, links: &[DiscoveredLink], origin_depth: u32) -> usize {
        let targets: Vec<CrawlTarget> = links
            .iter()
            .map(|link| CrawlTarget {
                url: link.url.clone(),
                depth: origin_depth + 1,
                link_text: link.text.clone(),
                is_seed: false,
            })
            .collect();
        self.admit(targets, false)
    }

    fn admit(&self, targets: Vec<CrawlTarget>, ignore_filters: bool) -> usize {
        let mut candidates = Vec::with_capacity(targets.len());
        for mut target in targets {
            let Ok(url) = normalize_parsed(target.url.clone()) else {
                continue;
            };
            target.url = url;

            if target.depth > self.max_depth {
                trace!("Dropping {} (depth {} > {})", target.url, target.depth, self.max_depth);
                continue;
            }
            if self.has_skipped_extension(&target.url) {
                trace!("Dropping {} (skipped extension)", target.url);
                continue;
            }
            if !ignore_filters && !self.filter.allows(target.url.as_str()) {
                trace!("Dropping {} (filtered)", target.url);
                continue;
            }
            candidates.push(target);
        }

        let mut added = 0;
        let mut state = self.lock();
        for target in candidates {
            if !self.allow_external {
                let internal = extract_domain(&target.url)
                    .map(|h| state.home_hosts.contains(&h))
                    .unwrap_or(false);
                if !internal {
                    trace!("Dropping {} (external)", target.url);
                    continue;
                }
            }
            if state.enqueued.insert(target.url.clone()) {
                debug!("Enqueued {} at depth {}", target.url, target.depth);
                state.queue.push(target);
                added += 1;
            }
        }
        drop(state);

        if added > 0 {
            self.notify.notify_waiters();
        }
        added
    }

    fn has_skipped_extension(&self, url: &Url) -> bool {
        path_extension(url)
            .map(|ext| self.skip_extensions.iter().any(|s| *s == ext))
            .unwrap_or(false)
    }

    /// Takes the next target, or `None` when the queue is empty or the
    /// page budget is spent
    pub fn next(&self) -> Option<CrawlTarget> {
        let mut state = self.lock();
        if state.accepted >= self.max_pages {
            return None;
        }
        let target = state.queue.pop()?;
        state.accepted += 1;
        state.in_flight += 1;
        Some(target)
    }

    /// Records that a dequeued target has been fully processed
    pub fn mark_visited(&self, url: &Url) {
        let mut state = self.lock();
        state.visited.insert(url.clone());
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.notify.notify_waiters();
    }

    /// Returns a dequeued target's page slot without fetching it
    ///
    /// Used for targets refused by robots.txt.
    pub fn mark_skipped(&self, url: &Url) {
        let mut state = self.lock();
        state.visited.insert(url.clone());
        state.accepted = state.accepted.saturating_sub(1);
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.notify.notify_waiters();
    }

    /// Registers an additional internal host, e.g. after a redirect of the root seed
    pub fn add_home_host(&self, host: &str) {
        self.lock().home_hosts.insert(host.to_lowercase());
    }

    /// True once no work is queued (or the budget is spent) and none is in flight
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.in_flight == 0 && (state.queue.is_empty() || state.accepted >= self.max_pages)
    }

    /// Waits until the frontier state changes
    pub async fn changed(&self) {
        self.notify.notified().await;
    }

    pub fn stats(&self) -> FrontierStats {
        let state = self.lock();
        FrontierStats {
            queued: state.queue.len(),
            enqueued_total: state.enqueued.len(),
            accepted: state.accepted,
            in_flight: state.in_flight,
            visited: state.visited.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn config(max_pages: u32, max_depth: u32) -> CrawlConfig {
        CrawlConfig {
            max_pages,
            max_depth,
            ..CrawlConfig::default()
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn link(s: &str) -> DiscoveredLink {
        DiscoveredLink {
            url: url(s),
            text: None,
        }
    }

    #[test]
    fn test_seed_then_discovered_dequeued_once() {
        let frontier = Frontier::new(&config(10, 3)).unwrap();
        frontier.seed(&[url("https://acme.example/ir")]);
        let added = frontier.enqueue(&[link("https://acme.example/ir/")], 0);
        assert_eq!(added, 0);

        let first = frontier.next().unwrap();
        assert_eq!(first.url.as_str(), "https://acme.example/ir");
        assert!(first.is_seed);
        assert!(frontier.next().is_none());
    }

    #[test]
    fn test_depth_scenario() {
        let frontier = Frontier::new(&config(10, 1)).unwrap();
        frontier.seed(&[url("https://acme.example/ir")]);
        let seed = frontier.next().unwrap();
        assert_eq!(seed.depth, 0);

        let added = frontier.enqueue(
            &[
                link("https://acme.example/ir/reports"),
                link("https://partner.example/"),
            ],
            seed.depth,
        );
        assert_eq!(added, 1);
        frontier.mark_visited(&seed.url);

        let reports = frontier.next().unwrap();
        assert_eq!(reports.url.as_str(), "https://acme.example/ir/reports");
        assert_eq!(reports.depth, 1);

        let added = frontier.enqueue(&[link("https://acme.example/ir/reports/2024")], reports.depth);
        assert_eq!(added, 0);
        frontier.mark_visited(&reports.url);

        assert!(frontier.next().is_none());
        assert!(frontier.is_drained());
    }

    #[test]
    fn test_max_pages_stops_dequeue() {
        let frontier = Frontier::new(&config(2, 3)).unwrap();
        frontier.seed(&[url("https://acme.example/")]);
        frontier.enqueue(
            &[
                link("https://acme.example/a"),
                link("https://acme.example/b"),
                link("https://acme.example/c"),
            ],
            0,
        );

        assert!(frontier.next().is_some());
        assert!(frontier.next().is_some());
        assert!(frontier.next().is_none());
        assert_eq!(frontier.stats().queued, 2);
        assert!(!frontier.is_drained());
    }

    #[test]
    fn test_skipped_target_returns_slot() {
        let frontier = Frontier::new(&config(1, 3)).unwrap();
        frontier.seed(&[url("https://acme.example/"), url("https://acme.example/b")]);

        let first = frontier.next().unwrap();
        assert!(frontier.next().is_none());
        frontier.mark_skipped(&first.url);
        assert!(frontier.next().is_some());
    }

    #[test]
    fn test_filters_exclude_wins() {
        let mut cfg = config(10, 3);
        cfg.include = vec!["/ir".to_string()];
        cfg.exclude = vec!["*/ir/archive*".to_string()];
        let frontier = Frontier::new(&cfg).unwrap();
        frontier.seed(&[url("https://acme.example/")]);

        let added = frontier.enqueue(
            &[
                link("https://acme.example/ir/reports"),
                link("https://acme.example/ir/archive/2001"),
                link("https://acme.example/careers"),
            ],
            0,
        );
        assert_eq!(added, 1);
    }

    #[test]
    fn test_seed_with_ignore_filters_still_dedups() {
        let mut cfg = config(10, 3);
        cfg.include = vec!["/ir".to_string()];
        let frontier = Frontier::new(&cfg).unwrap();
        frontier.seed(&[url("https://acme.example/")]);

        let extra = [url("https://acme.example/press"), url("https://acme.example/")];
        assert_eq!(frontier.seed_with(&extra, 0, false), 0);
        assert_eq!(frontier.seed_with(&extra, 0, true), 1);
    }

    #[test]
    fn test_allow_external() {
        let mut cfg = config(10, 3);
        cfg.allow_external = true;
        let frontier = Frontier::new(&cfg).unwrap();
        frontier.seed(&[url("https://acme.example/")]);
        assert_eq!(frontier.enqueue(&[link("https://partner.example/")], 0), 1);
    }

    #[test]
    fn test_skip_extensions() {
        let frontier = Frontier::new(&config(10, 3)).unwrap();
        frontier.seed(&[url("https://acme.example/")]);
        let added = frontier.enqueue(
            &[
                link("https://acme.example/files/archive.zip"),
                link("https://acme.example/files/q1.pdf"),
                link("https://acme.example/img/logo.png"),
            ],
            0,
        );
        assert_eq!(added, 2);
    }

    #[test]
    fn test_breadth_first_order() {
        let frontier = Frontier::new(&config(10, 3)).unwrap();
        frontier.seed(&[url("https://acme.example/")]);
        let root = frontier.next().unwrap();
        frontier.enqueue(&[link("https://acme.example/a"), link("https://acme.example/b")], 0);
        frontier.mark_visited(&root.url);

        let a = frontier.next().unwrap();
        frontier.enqueue(&[link("https://acme.example/a/deep")], a.depth);
        let b = frontier.next().unwrap();
        let deep = frontier.next().unwrap();

        assert_eq!(b.url.path(), "/b");
        assert_eq!(deep.url.path(), "/a/deep");
        assert_eq!(deep.depth, 2);
    }

    #[test]
    fn test_concurrent_enqueue_is_at_most_once() {
        let frontier = Arc::new(Frontier::new(&config(1000, 3)).unwrap());
        frontier.seed(&[url("https://acme.example/")]);

        let links: Vec<DiscoveredLink> = (0..50)
            .map(|i| link(&format!("https://acme.example/page/{}", i)))
            .collect();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let frontier = Arc::clone(&frontier);
                let links = links.clone();
                std::thread::spawn(move || frontier.enqueue(&links, 0))
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(total, 50);
        let mut seen = HashSet::new();
        while let Some(target) = frontier.next() {
            assert!(seen.insert(target.url));
        }
        assert_eq!(seen.len(), 51);
    }
}

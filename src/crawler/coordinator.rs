//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates one run for one
//! entity, including:
//! - Probing the root seed (with a `www.` fallback) before anything is stored
//! - Seeding the frontier from seeds, sitemaps and common IR paths
//! - Running a bounded pool of workers that fetch, classify and reconcile
//! - Honoring robots.txt and the per-worker politeness delay
//! - Cooperative cancellation and run bookkeeping

use crate::config::CrawlConfig;
use crate::crawler::robots::product_token;
use crate::crawler::{
    auto_seed_urls, discover_sitemap_urls, CrawlTarget, FetchResult, Fetcher, Frontier,
    RobotsGate,
};
use crate::extract::Classifier;
use crate::ingest::{ReconcileOutcome, Reconciler};
use crate::storage::{PersistenceGateway, RunCounters, RunStatus, StorageError};
use crate::url::{normalize_parsed, toggle_www};
use crate::{ConfigError, HarvestError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// How long an idle worker waits before re-checking the frontier
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Summary of one finished crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: i64,
    pub entity: String,
    /// Root seed actually used, after the `www.` fallback
    pub root: Url,
    /// Pages fetched, successful or not
    pub pages: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failed: u64,
    /// Targets refused by robots.txt
    pub skipped: u64,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn counters(&self) -> RunCounters {
        RunCounters {
            created: self.created,
            updated: self.updated,
            unchanged: self.unchanged,
            failed: self.failed,
            skipped: self.skipped,
        }
    }

    /// Created + updated + unchanged
    pub fn reconciled(&self) -> u64 {
        self.created + self.updated + self.unchanged
    }
}

#[derive(Default)]
struct Tally {
    pages: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
    unchanged: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl Tally {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created => Self::bump(&self.created),
            ReconcileOutcome::Updated => Self::bump(&self.updated),
            ReconcileOutcome::Unchanged => Self::bump(&self.unchanged),
        }
    }

    fn counters(&self) -> RunCounters {
        RunCounters {
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// State shared by all workers of one run
struct CrawlContext<G> {
    config: Arc<CrawlConfig>,
    entity_id: i64,
    frontier: Frontier,
    /// Preflight response of the root seed, consumed by its first visit
    prefetched: Mutex<Option<FetchResult>>,
    fetcher: Arc<Fetcher>,
    robots: RobotsGate,
    classifier: Arc<Classifier>,
    reconciler: Reconciler<G>,
    cancel: CancellationToken,
    tally: Tally,
}

/// Main crawler coordinator structure
pub struct Coordinator<G> {
    config: Arc<CrawlConfig>,
    entity: String,
    seeds: Vec<Url>,
    config_hash: String,
    storage: Arc<Mutex<G>>,
    fetcher: Arc<Fetcher>,
    classifier: Arc<Classifier>,
    cancel: CancellationToken,
}

impl<G: PersistenceGateway + 'static> Coordinator<G> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - Immutable crawl parameters
    /// * `storage` - Persistence gateway shared with the reconciler
    /// * `entity` - Name of the entity being harvested
    /// * `seeds` - Seed URLs; the first one is the root seed
    /// * `config_hash` - Hash stored on the run record
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Missing seeds, bad patterns or an unusable TLS setup
    pub fn new(
        config: CrawlConfig,
        storage: Arc<Mutex<G>>,
        entity: impl Into<String>,
        seeds: Vec<Url>,
        config_hash: impl Into<String>,
    ) -> Result<Self> {
        if seeds.is_empty() {
            return Err(ConfigError::Validation("at least one seed URL is required".to_string()).into());
        }

        // Surface pattern errors before any request is made
        Frontier::new(&config).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

        let fetcher = Fetcher::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            entity: entity.into(),
            seeds,
            config_hash: config_hash.into(),
            storage,
            fetcher: Arc::new(fetcher),
            classifier: Arc::new(Classifier::default()),
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the default extraction heuristics
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Token that stops the run cooperatively when cancelled
    ///
    /// In-flight fetches finish; no new targets are taken.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, G>> {
        self.storage
            .lock()
            .map_err(|_| StorageError::Database("storage lock poisoned".to_string()).into())
    }

    /// Runs the crawl to completion
    ///
    /// Per-URL failures never abort the run; they are counted in the
    /// report. The only errors returned are an unreachable root seed
    /// (before anything is stored) and storage failures on the run record.
    pub async fn run(&self) -> Result<CrawlReport> {
        let start_time = Instant::now();

        let (root, first_response) = self.preflight().await?;
        let root_final = first_response.final_url.clone();
        let mut seeds = self.seeds.clone();
        seeds[0] = root.clone();

        let frontier =
            Frontier::new(&self.config).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        frontier.seed(&seeds);
        if let Some(host) = root_final.host_str() {
            frontier.add_home_host(host);
        }

        let (entity_id, run_id) = {
            let mut storage = self.lock_storage()?;
            let entity_id = storage.ensure_entity(&self.entity)?;
            let run_id = storage.create_run(&self.config_hash, &self.entity)?;
            (entity_id, run_id)
        };
        info!("Starting crawl run {} for {} at {}", run_id, self.entity, root);

        let robots = RobotsGate::new(
            product_token(&self.config.user_agent),
            self.config.respect_robots,
        );

        if self.config.use_sitemap {
            let declared = robots.policy(&self.fetcher, &root).await.sitemaps();
            let listed = discover_sitemap_urls(&self.fetcher, &root, &declared).await;
            let added = frontier.seed_with(&listed, 0, self.config.seed_ignore_filters);
            info!("Seeded {} URLs from sitemaps", added);
        }

        if self.config.auto_seed {
            let added =
                frontier.seed_with(&auto_seed_urls(&root), 1, self.config.seed_ignore_filters);
            info!("Seeded {} common IR/press paths", added);
        }

        let ctx = Arc::new(CrawlContext {
            config: Arc::clone(&self.config),
            entity_id,
            frontier,
            prefetched: Mutex::new(Some(first_response)),
            fetcher: Arc::clone(&self.fetcher),
            robots,
            classifier: Arc::clone(&self.classifier),
            reconciler: Reconciler::new(Arc::clone(&self.storage)),
            cancel: self.cancel.clone(),
            tally: Tally::default(),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers.max(1) {
            workers.spawn(worker_loop(worker_id, Arc::clone(&ctx)));
        }

        let mut worker_failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Crawl worker failed: {}", e);
                worker_failure = Some(e.to_string());
            }
        }

        let counters = ctx.tally.counters();
        let interrupted = self.cancel.is_cancelled();
        let status = match (&worker_failure, interrupted) {
            (Some(_), _) => RunStatus::Failed,
            (None, true) => RunStatus::Interrupted,
            (None, false) => RunStatus::Completed,
        };
        self.lock_storage()?.complete_run(run_id, status, &counters)?;

        if let Some(message) = worker_failure {
            return Err(HarvestError::Worker(message));
        }

        let stats = ctx.frontier.stats();
        let report = CrawlReport {
            run_id,
            entity: self.entity.clone(),
            root,
            pages: ctx.tally.pages.load(Ordering::Relaxed),
            created: counters.created,
            updated: counters.updated,
            unchanged: counters.unchanged,
            failed: counters.failed,
            skipped: counters.skipped,
            interrupted,
            elapsed: start_time.elapsed(),
        };

        info!(
            "Crawl {} {}: {} pages ({} created, {} updated, {} unchanged, {} failed), {} URLs discovered, in {:?}",
            run_id,
            if interrupted { "interrupted" } else { "completed" },
            report.pages,
            report.created,
            report.updated,
            report.unchanged,
            report.failed,
            stats.enqueued_total,
            report.elapsed
        );

        Ok(report)
    }

    /// Fetches the root seed, falling back to its `www.`-toggled variant
    ///
    /// Any HTTP response counts as reachable; only transport failures on
    /// both variants abort the run. Returns the root to crawl and its
    /// response, which later stands in for the root's first fetch.
    async fn preflight(&self) -> Result<(Url, FetchResult)> {
        let root = self.seeds[0].clone();
        let first_response = self.fetcher.fetch(&root).await;
        if first_response.error.is_none() {
            return Ok((root, first_response));
        }
        let first_error = first_response.error.unwrap_or_default();
        warn!("Root seed {} unreachable: {}", root, first_error);

        if let Some(alternate) = toggle_www(&root) {
            let retry = self.fetcher.fetch(&alternate).await;
            if retry.error.is_none() {
                info!("Using {} instead of {}", alternate, root);
                return Ok((alternate, retry));
            }
            warn!(
                "Alternate seed {} unreachable: {}",
                alternate,
                retry.error.unwrap_or_default()
            );
        }

        Err(HarvestError::UnreachableSeed {
            url: root.to_string(),
            message: first_error,
        })
    }
}

/// Returns a dequeued target's frontier slot on every exit path
struct SlotGuard<'a> {
    frontier: &'a Frontier,
    url: &'a Url,
    skipped: bool,
}

impl<'a> SlotGuard<'a> {
    fn new(frontier: &'a Frontier, url: &'a Url) -> Self {
        Self {
            frontier,
            url,
            skipped: false,
        }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.skipped {
            self.frontier.mark_skipped(self.url);
        } else {
            self.frontier.mark_visited(self.url);
        }
    }
}

async fn worker_loop<G: PersistenceGateway + 'static>(worker_id: usize, ctx: Arc<CrawlContext<G>>) {
    debug!("Worker {} started", worker_id);
    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        let Some(target) = ctx.frontier.next() else {
            if ctx.frontier.is_drained() {
                break;
            }
            tokio::select! {
                _ = ctx.frontier.changed() => {}
                _ = tokio::time::sleep(IDLE_POLL) => {}
                _ = ctx.cancel.cancelled() => break,
            }
            continue;
        };

        let mut slot = SlotGuard::new(&ctx.frontier, &target.url);

        if !ctx.robots.is_allowed(&ctx.fetcher, &target.url).await {
            info!("URL {} disallowed by robots.txt", target.url);
            Tally::bump(&ctx.tally.skipped);
            slot.skipped = true;
            continue;
        }

        // A panic while handling one page must not take the worker down
        let task = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            let target = target.clone();
            async move { ctx.process(&target).await }
        });
        if let Err(e) = task.await {
            error!("Processing {} aborted: {}", target.url, e);
            ctx.record_aborted(&target);
        }
        drop(slot);

        if !ctx.config.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(ctx.config.delay) => {}
                _ = ctx.cancel.cancelled() => {}
            }
        }
    }
    debug!("Worker {} finished", worker_id);
}

impl<G: PersistenceGateway> CrawlContext<G> {
    /// Fetches, classifies and reconciles one target
    async fn process(&self, target: &CrawlTarget) {
        debug!("Processing {} (depth {})", target.url, target.depth);
        let fetched = match self.take_prefetched(&target.url) {
            Some(response) => response,
            None => self.fetcher.fetch(&target.url).await,
        };
        Tally::bump(&self.tally.pages);

        if !fetched.is_success() {
            self.record_failure(target, &fetched);
            return;
        }

        let doc = self.classifier.classify(&fetched);

        if target.depth < self.config.max_depth && !doc.outbound_links.is_empty() {
            let added = self.frontier.enqueue(&doc.outbound_links, target.depth);
            debug!(
                "{} of {} links from {} enqueued",
                added,
                doc.outbound_links.len(),
                target.url
            );
        }

        match self
            .reconciler
            .reconcile(self.entity_id, &target.url, &doc, fetched.status)
        {
            Ok(outcome) => self.tally.record(outcome),
            Err(e) => {
                error!("Failed to store {}: {}", target.url, e);
                Tally::bump(&self.tally.failed);
            }
        }
    }

    /// Hands out the preflight response if it was for this target
    fn take_prefetched(&self, url: &Url) -> Option<FetchResult> {
        let mut slot = self.prefetched.lock().ok()?;
        let matches = slot
            .as_ref()
            .and_then(|response| normalize_parsed(response.requested_url.clone()).ok())
            .is_some_and(|requested| &requested == url);
        if matches {
            slot.take()
        } else {
            None
        }
    }

    fn record_failure(&self, target: &CrawlTarget, fetched: &FetchResult) {
        let reason = fetched
            .failure_reason()
            .unwrap_or_else(|| "unknown failure".to_string());
        if let Err(e) =
            self.reconciler
                .record_failure(self.entity_id, &target.url, fetched.status, &reason)
        {
            error!("Failed to record failure for {}: {}", target.url, e);
        }
        Tally::bump(&self.tally.failed);
    }

    /// Counts a target whose processing task panicked as failed
    fn record_aborted(&self, target: &CrawlTarget) {
        if let Err(e) = self.reconciler.record_failure(
            self.entity_id,
            &target.url,
            None,
            "processing aborted",
        ) {
            warn!("Failed to record aborted page {}: {}", target.url, e);
        }
        Tally::bump(&self.tally.failed);
    }
}

//! Listed-Harvest main entry point
//!
//! This is the command-line interface for the Listed-Harvest document harvester.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use listed_harvest::config::{
    compute_config_hash, hash_str, parse_config, validate, Config, EntityEntry,
};
use listed_harvest::crawler::Coordinator;
use listed_harvest::ingest::InventoryScanner;
use listed_harvest::output::{print_crawl_report, print_scan_report, print_statistics};
use listed_harvest::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Listed-Harvest: an idempotent document harvester for listed companies
///
/// Crawls investor-relations sites, extracts documents and contacts, and
/// stores them with full version history. Re-running a crawl never
/// duplicates unchanged content.
#[derive(Parser, Debug)]
#[command(name = "listed-harvest")]
#[command(version)]
#[command(about = "An idempotent document harvester for listed companies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the configured entities (or a single --url)
    Crawl(CrawlArgs),

    /// Scan a local data root and version its files
    Inventory {
        /// Directory to scan
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// SQLite database path
        #[arg(long, default_value = "./listed-harvest.db")]
        db: PathBuf,
    },

    /// Show statistics from the database and exit
    Stats {
        /// SQLite database path
        #[arg(long, default_value = "./listed-harvest.db")]
        db: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Crawl a single root URL instead of the configured entities
    #[arg(long)]
    url: Option<String>,

    /// Entity name for --url (defaults to the URL's host)
    #[arg(long, requires = "url")]
    entity: Option<String>,

    #[arg(long)]
    max_pages: Option<u32>,

    #[arg(long)]
    max_depth: Option<u32>,

    /// Pause between fetches of one worker, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    #[arg(long)]
    workers: Option<u32>,

    /// Disable TLS certificate verification
    #[arg(long, conflicts_with = "ca_bundle")]
    insecure: bool,

    /// PEM bundle used instead of the system trust store
    #[arg(long)]
    ca_bundle: Option<PathBuf>,

    /// Seed from /sitemap.xml
    #[arg(long)]
    use_sitemap: bool,

    /// Follow links to other hosts
    #[arg(long)]
    allow_external: bool,

    /// Seed common investor-relations and press paths
    #[arg(long)]
    auto_seed: bool,

    /// Let sitemap and auto-seed URLs bypass include/exclude patterns
    #[arg(long)]
    seed_ignore_filters: bool,

    /// Include pattern (glob or substring), repeatable
    #[arg(long)]
    include: Vec<String>,

    /// Exclude pattern (glob or substring), repeatable
    #[arg(long)]
    exclude: Vec<String>,

    /// SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Crawl(args) => handle_crawl(args).await,
        Command::Inventory { root, db } => handle_inventory(&root, &db),
        Command::Stats { db } => handle_stats(&db),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listed_harvest=info,warn"),
            1 => EnvFilter::new("listed_harvest=debug,info"),
            2 => EnvFilter::new("listed_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds the effective configuration: file values, then CLI overrides
fn resolve_config(args: &CrawlArgs) -> Result<(Config, String)> {
    let (mut config, hash) = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let config = parse_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            (config, compute_config_hash(path)?)
        }
        None => (Config::default(), String::new()),
    };

    if let Some(url) = &args.url {
        let name = match &args.entity {
            Some(name) => name.clone(),
            None => Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_string()))
                .unwrap_or_else(|| url.clone()),
        };
        config.entity = vec![EntityEntry {
            name,
            seeds: vec![url.clone()],
        }];
    }

    let crawl = &mut config.crawl;
    if let Some(n) = args.max_pages {
        crawl.max_pages = n;
    }
    if let Some(n) = args.max_depth {
        crawl.max_depth = n;
    }
    if let Some(ms) = args.delay_ms {
        crawl.delay_ms = ms;
    }
    if let Some(n) = args.workers {
        crawl.workers = n;
    }
    crawl.use_sitemap |= args.use_sitemap;
    crawl.allow_external |= args.allow_external;
    crawl.auto_seed |= args.auto_seed;
    crawl.seed_ignore_filters |= args.seed_ignore_filters;
    crawl.include.extend(args.include.iter().cloned());
    crawl.exclude.extend(args.exclude.iter().cloned());

    if args.insecure {
        config.tls.insecure = true;
        config.tls.ca_bundle = None;
    } else if let Some(bundle) = &args.ca_bundle {
        config.tls.ca_bundle = Some(bundle.clone());
    }
    if let Some(db) = &args.db {
        config.output.database_path = db.to_string_lossy().into_owned();
    }

    validate(&config).context("Invalid configuration")?;

    // Runs from flags alone are tied to the flags that produced them
    let hash = if hash.is_empty() {
        hash_str(&format!("{:?}", config))
    } else {
        hash
    };
    Ok((config, hash))
}

/// Handles --dry-run: shows what would be crawled
fn print_dry_run(config: &Config) {
    let crawl = config.crawl_config();

    println!("=== Listed-Harvest Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Max pages: {}", crawl.max_pages);
    println!("  Max depth: {}", crawl.max_depth);
    println!("  Delay: {}ms", crawl.delay.as_millis());
    println!("  Workers: {}", crawl.workers);
    println!("  TLS: {:?}", crawl.tls_policy);
    println!("  Sitemap: {}", crawl.use_sitemap);
    println!("  Auto-seed: {}", crawl.auto_seed);
    println!("  External links: {}", crawl.allow_external);
    println!("  Respect robots.txt: {}", crawl.respect_robots);
    if !crawl.include.is_empty() {
        println!("  Include: {}", crawl.include.join(", "));
    }
    if !crawl.exclude.is_empty() {
        println!("  Exclude: {}", crawl.exclude.join(", "));
    }

    println!("\nUser Agent: {}", crawl.user_agent);
    println!("Database: {}", config.output.database_path);

    println!("\nEntities ({}):", config.entity.len());
    for entry in &config.entity {
        println!("  - {} ({} seeds)", entry.name, entry.seeds.len());
        for seed in &entry.seeds {
            println!("    * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(args: CrawlArgs) -> Result<()> {
    let (config, config_hash) = resolve_config(&args)?;

    if args.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    let db_path = Path::new(&config.output.database_path);
    let storage = SqliteStorage::new(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let storage = Arc::new(Mutex::new(storage));
    let crawl_config = config.crawl_config();

    for entry in &config.entity {
        let seeds = entry
            .seeds
            .iter()
            .map(|s| Url::parse(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let coordinator = Coordinator::new(
            crawl_config.clone(),
            Arc::clone(&storage),
            entry.name.clone(),
            seeds,
            config_hash.clone(),
        )?;

        let token = coordinator.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; finishing in-flight pages");
                token.cancel();
            }
        });

        let result = coordinator.run().await;
        interrupt.abort();

        let report = result.with_context(|| format!("Crawl of {} failed", entry.name))?;
        print_crawl_report(&report);
        if report.interrupted {
            break;
        }
    }

    Ok(())
}

/// Handles the inventory subcommand
fn handle_inventory(root: &Path, db: &Path) -> Result<()> {
    let storage = SqliteStorage::new(db)
        .with_context(|| format!("Failed to open database {}", db.display()))?;
    let mut scanner = InventoryScanner::new(storage);
    let report = scanner
        .scan(root)
        .with_context(|| format!("Inventory scan of {} failed", root.display()))?;
    print_scan_report(&report);
    Ok(())
}

/// Handles the stats subcommand
fn handle_stats(db: &Path) -> Result<()> {
    println!("Database: {}\n", db.display());
    let storage = SqliteStorage::new(db)?;
    let stats = storage.stats()?;
    let latest = storage.get_latest_run()?;
    print_statistics(&stats, latest.as_ref());
    Ok(())
}

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Listed-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlSection,
    #[serde(default)]
    pub tls: TlsSection,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub entity: Vec<EntityEntry>,
}

/// Crawl behavior configuration as written in the TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlSection {
    /// Maximum number of pages accepted from the frontier in one run
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum link depth (0 = seeds only)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Pause between consecutive fetches of one worker (milliseconds)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Number of concurrent fetch workers
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for connection-level failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step between retries (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default)]
    pub use_sitemap: bool,

    #[serde(default)]
    pub allow_external: bool,

    #[serde(default)]
    pub auto_seed: bool,

    #[serde(default)]
    pub seed_ignore_filters: bool,

    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Include patterns (glob or substring); empty means include everything
    #[serde(default)]
    pub include: Vec<String>,

    /// Exclude patterns (glob or substring); exclude wins over include
    #[serde(default)]
    pub exclude: Vec<String>,

    /// File extensions never enqueued from discovered links
    #[serde(default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            delay_ms: default_delay_ms(),
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            use_sitemap: false,
            allow_external: false,
            auto_seed: false,
            seed_ignore_filters: false,
            respect_robots: true,
            include: Vec::new(),
            exclude: Vec::new(),
            skip_extensions: default_skip_extensions(),
        }
    }
}

/// TLS verification settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TlsSection {
    /// Disable certificate verification entirely
    #[serde(default)]
    pub insecure: bool,

    /// PEM bundle replacing the system trust store
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    pub crawler_name: String,
    pub crawler_version: String,
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "listed-harvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/listed-harvest".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./listed-harvest.db".to_string(),
        }
    }
}

/// A crawled entity (listed company) with its seed URLs
#[derive(Debug, Clone, Deserialize)]
pub struct EntityEntry {
    /// Display name, also the identity of the entity row
    pub name: String,

    /// Seed URLs; the first one is the root seed
    pub seeds: Vec<String>,
}

/// How server certificates are verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Verify against the platform trust store
    VerifySystem,
    /// Verify against a custom PEM bundle only
    VerifyCustomBundle(PathBuf),
    /// Accept any certificate
    NoVerify,
}

impl TlsPolicy {
    /// Builds the policy from the insecure flag and optional bundle path
    ///
    /// The insecure flag wins; validation rejects setting both.
    pub fn from_flags(insecure: bool, ca_bundle: Option<&PathBuf>) -> Self {
        match (insecure, ca_bundle) {
            (true, _) => Self::NoVerify,
            (false, Some(path)) => Self::VerifyCustomBundle(path.clone()),
            (false, None) => Self::VerifySystem,
        }
    }
}

/// Immutable crawl parameters passed by reference through the orchestrator
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub max_pages: u32,
    pub max_depth: u32,
    pub delay: Duration,
    pub tls_policy: TlsPolicy,
    pub use_sitemap: bool,
    pub allow_external: bool,
    pub auto_seed: bool,
    pub seed_ignore_filters: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub workers: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub respect_robots: bool,
    pub skip_extensions: Vec<String>,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Config::default().crawl_config()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawl: CrawlSection::default(),
            tls: TlsSection::default(),
            user_agent: UserAgentConfig::default(),
            output: OutputConfig::default(),
            entity: Vec::new(),
        }
    }
}

impl Config {
    /// Derives the immutable runtime crawl parameters
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            max_pages: self.crawl.max_pages,
            max_depth: self.crawl.max_depth,
            delay: Duration::from_millis(self.crawl.delay_ms),
            tls_policy: TlsPolicy::from_flags(self.tls.insecure, self.tls.ca_bundle.as_ref()),
            use_sitemap: self.crawl.use_sitemap,
            allow_external: self.crawl.allow_external,
            auto_seed: self.crawl.auto_seed,
            seed_ignore_filters: self.crawl.seed_ignore_filters,
            include: self.crawl.include.clone(),
            exclude: self.crawl.exclude.clone(),
            workers: self.crawl.workers as usize,
            timeout: Duration::from_secs(self.crawl.timeout_secs),
            max_retries: self.crawl.max_retries,
            retry_backoff: Duration::from_millis(self.crawl.retry_backoff_ms),
            respect_robots: self.crawl.respect_robots,
            skip_extensions: self.crawl.skip_extensions.clone(),
            user_agent: self.user_agent.header_value(),
        }
    }
}

fn default_max_pages() -> u32 {
    60
}

fn default_max_depth() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    300
}

fn default_workers() -> u32 {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_skip_extensions() -> Vec<String> {
    ["zip", "gz", "tar", "7z", "rar", "mp4", "mp3", "mov", "avi", "wav"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

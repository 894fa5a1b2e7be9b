//! robots.txt gate
//!
//! robots.txt is fetched once per origin per run through the crawler's own
//! [`Fetcher`] and consulted before every page fetch. A missing or
//! unreachable robots.txt allows everything.

use crate::crawler::Fetcher;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// Parsed robots.txt data for one origin
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content; `None` means allow all
    content: Option<String>,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// A permissive policy used when robots.txt cannot be fetched
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    /// Checks if a URL is allowed for the given user agent token
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        match &self.content {
            Some(content) if !content.trim().is_empty() => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, agent, url)
            }
            _ => true,
        }
    }

    /// Sitemap locations declared with `Sitemap:` lines
    pub fn sitemaps(&self) -> Vec<Url> {
        let Some(content) = &self.content else {
            return Vec::new();
        };
        content
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                if !key.trim().eq_ignore_ascii_case("sitemap") {
                    return None;
                }
                Url::parse(value.trim()).ok()
            })
            .collect()
    }
}

/// Per-run cache of robots.txt policies keyed by origin
pub struct RobotsGate {
    agent: String,
    enabled: bool,
    cache: Mutex<HashMap<String, Arc<OnceCell<ParsedRobots>>>>,
}

impl RobotsGate {
    /// Creates a gate matching rules for `agent` (the crawler's product token)
    pub fn new(agent: impl Into<String>, enabled: bool) -> Self {
        Self {
            agent: agent.into(),
            enabled,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the robots.txt policy for the URL's origin, fetching it once
    ///
    /// Concurrent lookups for one origin wait on the same fetch. Other
    /// origins are not held up by it.
    pub async fn policy(&self, fetcher: &Fetcher, url: &Url) -> ParsedRobots {
        let origin = url.origin().ascii_serialization();
        let cell = self.cell(&origin);
        cell.get_or_init(|| load_policy(fetcher, &origin))
            .await
            .clone()
    }

    fn cell(&self, origin: &str) -> Arc<OnceCell<ParsedRobots>> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Checks whether the URL may be fetched
    pub async fn is_allowed(&self, fetcher: &Fetcher, url: &Url) -> bool {
        if !self.enabled {
            return true;
        }
        self.policy(fetcher, url).await.is_allowed(url.as_str(), &self.agent)
    }
}

async fn load_policy(fetcher: &Fetcher, origin: &str) -> ParsedRobots {
    let Ok(robots_url) = Url::parse(&format!("{}/robots.txt", origin)) else {
        return ParsedRobots::allow_all();
    };
    let result = fetcher.fetch(&robots_url).await;
    if result.is_success() {
        debug!("Loaded robots.txt for {}", origin);
        ParsedRobots::from_content(&String::from_utf8_lossy(&result.body))
    } else {
        debug!("No robots.txt for {}; allowing all", origin);
        ParsedRobots::allow_all()
    }
}

/// Extracts the product token from a full User-Agent header value
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or(user_agent)
}

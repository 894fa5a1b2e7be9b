use crate::config::types::{Config, CrawlSection, EntityEntry, TlsSection, UserAgentConfig};
use crate::url::UrlPattern;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_section(&config.crawl)?;
    validate_tls_section(&config.tls)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_entities(&config.entity)?;
    Ok(())
}

/// Validates crawl limits and URL filters
fn validate_crawl_section(crawl: &CrawlSection) -> Result<(), ConfigError> {
    if crawl.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1, got 0".to_string(),
        ));
    }

    if crawl.workers < 1 || crawl.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            crawl.workers
        )));
    }

    if crawl.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    for pattern in crawl.include.iter().chain(crawl.exclude.iter()) {
        UrlPattern::parse(pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
    }

    // The same pattern on both sides can never match anything
    for pattern in &crawl.include {
        if crawl.exclude.iter().any(|e| e == pattern) {
            return Err(ConfigError::Validation(format!(
                "pattern '{}' is both included and excluded",
                pattern
            )));
        }
    }

    Ok(())
}

/// Validates the TLS policy inputs
fn validate_tls_section(tls: &TlsSection) -> Result<(), ConfigError> {
    if let Some(bundle) = &tls.ca_bundle {
        if tls.insecure {
            return Err(ConfigError::Validation(
                "insecure and ca_bundle are mutually exclusive".to_string(),
            ));
        }
        if !bundle.is_file() {
            return Err(ConfigError::Validation(format!(
                "ca_bundle '{}' does not exist",
                bundle.display()
            )));
        }
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates entity entries and their seeds
fn validate_entities(entities: &[EntityEntry]) -> Result<(), ConfigError> {
    if entities.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[entity]] with seeds is required".to_string(),
        ));
    }

    for entry in entities {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "entity name cannot be empty".to_string(),
            ));
        }

        if entry.seeds.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Entity '{}' must have at least one seed URL",
                entry.name
            )));
        }

        for seed in &entry.seeds {
            let url = Url::parse(seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
            })?;

            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ConfigError::InvalidUrl(format!(
                    "Seed URL '{}' must use http or https",
                    seed
                )));
            }

            if url.host_str().is_none() {
                return Err(ConfigError::InvalidUrl(format!(
                    "Seed URL '{}' has no host",
                    seed
                )));
            }
        }
    }

    Ok(())
}

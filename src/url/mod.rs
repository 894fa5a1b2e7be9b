//! URL handling module for Listed-Harvest
//!
//! This module provides URL normalization, host comparison and the
//! include/exclude pattern matching used by the frontier.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, path_extension, same_site};
pub use matcher::{UrlFilter, UrlPattern};
pub use normalize::{normalize_parsed, normalize_url, toggle_www};

use url::Url;

/// Resolves a possibly relative link against the page it appeared on and
/// normalizes the result
///
/// Returns `None` for links that are not http(s) after resolution.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let joined = base.join(href.trim()).ok()?;
    normalize_parsed(joined).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_link() {
        let base = Url::parse("https://acme.example/ir/").unwrap();
        let resolved = resolve_link(&base, "reports/#latest").unwrap();
        assert_eq!(resolved.as_str(), "https://acme.example/ir/reports");
    }

    #[test]
    fn test_resolve_absolute_link() {
        let base = Url::parse("https://acme.example/ir").unwrap();
        let resolved = resolve_link(&base, "https://partner.example/").unwrap();
        assert_eq!(resolved.as_str(), "https://partner.example/");
    }

    #[test]
    fn test_resolve_rejects_non_http() {
        let base = Url::parse("https://acme.example/ir").unwrap();
        assert!(resolve_link(&base, "mailto:ir@acme.example").is_none());
        assert!(resolve_link(&base, "javascript:void(0)").is_none());
    }
}

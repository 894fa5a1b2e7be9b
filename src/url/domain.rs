use url::Url;

/// Extracts the lowercase host from a URL, without port
///
/// # Examples
///
/// ```
/// use url::Url;
/// use listed_harvest::url::extract_domain;
///
/// let url = Url::parse("https://IR.Acme.example:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("ir.acme.example".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs point at the same host
///
/// Ports and schemes are ignored, so `http://acme.example:8080/` and
/// `https://acme.example/` count as the same site. Subdomains do not.
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Returns the lowercase extension of the last path segment, if any
pub fn path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://acme.example:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("acme.example".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Acme.EXAMPLE/").unwrap();
        assert_eq!(extract_domain(&url), Some("acme.example".to_string()));
    }

    #[test]
    fn test_same_site_ignores_port_and_scheme() {
        let a = Url::parse("http://127.0.0.1:4000/ir").unwrap();
        let b = Url::parse("https://127.0.0.1/reports").unwrap();
        assert!(same_site(&a, &b));
    }

    #[test]
    fn test_same_site_distinguishes_hosts() {
        let a = Url::parse("https://acme.example/").unwrap();
        let b = Url::parse("https://partner.example/").unwrap();
        let c = Url::parse("https://www.acme.example/").unwrap();
        assert!(!same_site(&a, &b));
        assert!(!same_site(&a, &c));
    }

    #[test]
    fn test_path_extension() {
        let url = Url::parse("https://acme.example/files/Report-2024.PDF").unwrap();
        assert_eq!(path_extension(&url), Some("pdf".to_string()));

        let url = Url::parse("https://acme.example/ir").unwrap();
        assert_eq!(path_extension(&url), None);

        let url = Url::parse("https://acme.example/.hidden").unwrap();
        assert_eq!(path_extension(&url), None);
    }
}

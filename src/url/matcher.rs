use crate::UrlError;
use regex::Regex;

/// An include/exclude filter evaluated against a normalized URL
///
/// Patterns containing `*` are globs anchored to the whole URL string,
/// where `?` also stands for a single character. Anything else, query
/// fragments such as `?page=` included, is a case-insensitive substring.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Glob(Regex),
    Substring(String),
}

impl UrlPattern {
    /// Compiles a pattern string
    ///
    /// # Examples
    ///
    /// ```
    /// use listed_harvest::url::UrlPattern;
    ///
    /// let glob = UrlPattern::parse("*/reports/*.pdf").unwrap();
    /// assert!(glob.matches("https://acme.example/reports/q1.pdf"));
    ///
    /// let sub = UrlPattern::parse("/IR").unwrap();
    /// assert!(sub.matches("https://acme.example/ir/news"));
    /// ```
    pub fn parse(pattern: &str) -> Result<Self, UrlError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(UrlError::Malformed("empty pattern".to_string()));
        }

        if pattern.contains('*') {
            let mut re = String::with_capacity(pattern.len() + 8);
            re.push_str("(?i)^");
            for c in pattern.chars() {
                match c {
                    '*' => re.push_str(".*"),
                    '?' => re.push('.'),
                    other => re.push_str(&regex::escape(&other.to_string())),
                }
            }
            re.push('$');
            let compiled = Regex::new(&re).map_err(|e| UrlError::Malformed(e.to_string()))?;
            Ok(Self::Glob(compiled))
        } else {
            Ok(Self::Substring(pattern.to_lowercase()))
        }
    }

    /// Returns true if the URL matches this pattern
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Glob(re) => re.is_match(url),
            Self::Substring(needle) => url.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Compiled include and exclude lists
///
/// Exclude always wins. An empty include list admits everything.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    include: Vec<UrlPattern>,
    exclude: Vec<UrlPattern>,
}

impl UrlFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, UrlError> {
        Ok(Self {
            include: include
                .iter()
                .map(|p| UrlPattern::parse(p))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|p| UrlPattern::parse(p))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn allows(&self, url: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(url)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(url))
    }
}

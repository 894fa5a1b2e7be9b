//! HTML extraction path
//!
//! Decodes the body, strips page furniture and pulls out the title, the
//! heading outline, meta tags and outbound links.

use encoding_rs::Encoding;
use readability::extractor;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

use crate::extract::Heading;
use crate::url::resolve_link;

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap()
});

/// Elements whose text never belongs to the document body
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "form",
    "iframe", "svg", "button", "select",
];

/// Elements that end a line of text
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "table", "tr", "td", "th",
    "h1", "h2", "h3", "h4", "h5", "h6", "br", "blockquote", "pre", "dd", "dt", "address",
];

/// Containers tried in order before falling back to `<body>`
const MAIN_SELECTORS: &[&str] = &["article", "main", "[role='main']", "#content", ".content"];

/// Minimum visible text for a main-content result to be trusted
const MIN_MAIN_TEXT: usize = 200;

/// A link found on a page, already resolved and normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub url: Url,
    pub text: Option<String>,
}

/// Everything the HTML path extracts from one page
#[derive(Debug, Clone, Default)]
pub struct ParsedHtml {
    pub title: Option<String>,
    pub text: String,
    pub headings: Vec<Heading>,
    pub meta: BTreeMap<String, String>,
    pub links: Vec<DiscoveredLink>,
    pub lang_attr: Option<String>,
}

/// Decodes HTML bytes to a string
///
/// The charset comes from the content-type header, then from a
/// `<meta charset>` in the first 4 KB, and defaults to UTF-8.
pub fn decode_html(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(|ct| label_from(&CHARSET_REGEX, ct))
        .or_else(|| {
            let head = String::from_utf8_lossy(&body[..body.len().min(4096)]);
            label_from(&META_CHARSET_REGEX, &head)
        })
        .unwrap_or(encoding_rs::UTF_8);

    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn label_from(re: &Regex, haystack: &str) -> Option<&'static Encoding> {
    let caps = re.captures(haystack)?;
    Encoding::for_label(caps.get(1)?.as_str().trim().as_bytes())
}

/// Parses a decoded HTML document
///
/// # Arguments
///
/// * `html` - Decoded document source
/// * `base_url` - Final URL of the page, used to resolve relative links
///
/// # Link Extraction Rules
///
/// `<a href>` links are resolved against the base URL and normalized.
/// `mailto:`, `tel:`, `javascript:` and `data:` links, fragment-only links
/// and links carrying a `download` attribute are skipped. Each URL is
/// reported once, with the text of its first anchor.
pub fn parse_html(html: &str, base_url: &Url) -> ParsedHtml {
    let document = Html::parse_document(html);

    let text = main_text(html, &document, base_url);

    ParsedHtml {
        title: extract_title(&document),
        text,
        headings: extract_headings(&document),
        meta: extract_meta(&document),
        links: extract_links(&document, base_url),
        lang_attr: first(&document, "html")
            .and_then(|h| h.value().attr("lang"))
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty()),
    }
}

fn first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

/// Main text of the page
///
/// Readability scoring is tried first. Short or failed results fall back
/// to the first substantial content container, then to `<body>`, with
/// page furniture stripped.
fn main_text(html: &str, document: &Html, base_url: &Url) -> String {
    if let Ok(article) = extractor::extract(&mut html.as_bytes(), base_url) {
        let text = tidy_lines(&article.text);
        if visible_len(&text) >= MIN_MAIN_TEXT {
            return text;
        }
    }

    match main_content(document).or_else(|| first(document, "body")) {
        Some(root) => {
            let mut out = String::new();
            collect_text(root, &mut out);
            tidy_lines(&out)
        }
        None => String::new(),
    }
}

fn visible_len(text: &str) -> usize {
    text.split_whitespace().map(str::len).sum()
}

fn main_content(document: &Html) -> Option<ElementRef<'_>> {
    for selector in MAIN_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            let mut text = String::new();
            collect_text(element, &mut text);
            if visible_len(&text) >= MIN_MAIN_TEXT {
                return Some(element);
            }
        }
    }
    None
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIP_TAGS.contains(&name) {
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
    if block {
        out.push('\n');
    }
}

/// Collapses spaces within lines and drops empty lines
fn tidy_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn inside_furniture(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| SKIP_TAGS.contains(&a.value().name()))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    if let Some(title) = first(document, "title").map(|t| element_text(&t)) {
        if !title.is_empty() {
            return Some(title);
        }
    }

    if let Some(og) = first(document, "meta[property='og:title']") {
        if let Some(content) = og.value().attr("content") {
            let content = content.trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
    }

    first(document, "h1")
        .map(|h| element_text(&h))
        .filter(|t| !t.is_empty())
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|h| !inside_furniture(h))
        .filter_map(|h| {
            let level = h.value().name()[1..].parse::<u8>().ok()?;
            let text = element_text(&h);
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .collect()
}

fn extract_meta(document: &Html) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return meta;
    };

    for element in document.select(&selector) {
        let attrs = element.value();
        let key = attrs
            .attr("property")
            .or_else(|| attrs.attr("name"))
            .or_else(|| attrs.attr("itemprop"));
        if let (Some(key), Some(content)) = (key, attrs.attr("content")) {
            let content = content.trim();
            if !content.is_empty() {
                meta.entry(key.trim().to_lowercase())
                    .or_insert_with(|| content.to_string());
            }
        }
    }

    if let Some(time) = first(document, "time[datetime]") {
        if let Some(dt) = time.value().attr("datetime") {
            meta.entry("time:datetime".to_string())
                .or_insert_with(|| dt.trim().to_string());
        }
    }

    meta
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<DiscoveredLink> {
    let mut links: Vec<DiscoveredLink> = Vec::new();
    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        if element.value().attr("download").is_some() {
            continue;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if is_ignored_href(href) {
            continue;
        }
        let Some(url) = resolve_link(base_url, href) else {
            continue;
        };
        if links.iter().any(|l| l.url == url) {
            continue;
        }
        let text = element_text(&element);
        links.push(DiscoveredLink {
            url,
            text: (!text.is_empty()).then_some(text),
        });
    }

    links
}

fn is_ignored_href(href: &str) -> bool {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
}

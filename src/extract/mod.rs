//! Content classification and extraction
//!
//! Turns a [`FetchResult`] into an [`ExtractedDocument`]: resolves the
//! content type, runs the HTML or PDF path, detects language, estimates a
//! publication date, extracts contact facts and computes the fingerprint.
//! Extraction never fails; unparsable bodies degrade to empty text.

mod contacts;
mod content_type;
mod date;
mod fingerprint;
mod html;
mod kind;
mod language;
mod pdf;

pub use contacts::{extract_contacts, extract_emails, extract_phones, ContactFact, RoleLexicon};
pub use content_type::{family, mime_for_extension, resolve_mime, ContentFamily};
pub use date::{date_in_text, parse_meta_date, DateHeuristic, MetaThenText};
pub use fingerprint::{canonicalize, checksum, fingerprint};
pub use html::{decode_html, parse_html, DiscoveredLink, ParsedHtml};
pub use kind::{infer_kind, DocumentKind};
pub use language::detect_language;
pub use pdf::extract_pdf_text;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

use crate::crawler::FetchResult;

/// One heading in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// Structured content of one successful fetch
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Final URL the content was served from
    pub source_url: Url,
    pub kind: DocumentKind,
    pub title: Option<String>,
    pub text: String,
    pub headings: Vec<Heading>,
    pub published_at: Option<NaiveDate>,
    pub language: Option<String>,
    pub contacts: Vec<ContactFact>,
    pub fingerprint: String,
    /// Resolved MIME type
    pub content_type: String,
    pub byte_len: usize,
    pub meta: BTreeMap<String, String>,
    pub outbound_links: Vec<DiscoveredLink>,
}

impl ExtractedDocument {
    /// Metadata stored alongside a document version
    pub fn metadata_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind,
            "title": self.title,
            "headings": self.headings,
            "published_at": self.published_at.map(|d| d.to_string()),
            "language": self.language,
            "content_type": self.content_type,
            "byte_len": self.byte_len,
            "meta": self.meta,
        })
    }
}

/// Extraction with replaceable heuristics
pub struct Classifier {
    lexicon: RoleLexicon,
    dates: Box<dyn DateHeuristic>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(RoleLexicon::default(), Box::new(MetaThenText))
    }
}

impl Classifier {
    pub fn new(lexicon: RoleLexicon, dates: Box<dyn DateHeuristic>) -> Self {
        Self { lexicon, dates }
    }

    /// Classifies one fetched body
    pub fn classify(&self, fetched: &FetchResult) -> ExtractedDocument {
        let url = &fetched.final_url;
        let mime = resolve_mime(fetched.content_type.as_deref(), &fetched.body, Some(url));

        let mut title = None;
        let mut text = String::new();
        let mut headings = Vec::new();
        let mut meta = BTreeMap::new();
        let mut links = Vec::new();
        let mut lang_attr = None;
        let content_family = family(&mime);

        match content_family {
            ContentFamily::Html => {
                let decoded = decode_html(&fetched.body, fetched.content_type.as_deref());
                let parsed = parse_html(&decoded, url);
                title = parsed.title;
                text = parsed.text;
                headings = parsed.headings;
                meta = parsed.meta;
                links = parsed.links;
                lang_attr = parsed.lang_attr;
            }
            ContentFamily::Pdf => {
                text = extract_pdf_text(&fetched.body);
                title = pdf::pdf_title(&fetched.body).or_else(|| file_name(url));
            }
            ContentFamily::Text => {
                text = String::from_utf8_lossy(&fetched.body).into_owned();
                title = file_name(url);
            }
            ContentFamily::Image | ContentFamily::Other => {
                title = file_name(url);
            }
        }

        let mut contact_source = text.clone();
        for value in meta.values() {
            contact_source.push('\n');
            contact_source.push_str(value);
        }
        let contacts = extract_contacts(&contact_source, &self.lexicon);

        let language = detect_language(&text)
            .or_else(|| lang_attr.as_deref().and_then(language::primary_subtag));
        let published_at = self.dates.published_at(&meta, &text);
        let kind = infer_kind(url, title.as_deref());

        ExtractedDocument {
            source_url: url.clone(),
            kind,
            fingerprint: fingerprint(&text, &fetched.body, content_family),
            title,
            text,
            headings,
            published_at,
            language,
            contacts,
            content_type: mime,
            byte_len: fetched.body.len(),
            meta,
            outbound_links: links,
        }
    }
}

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::default);

/// Classifies a fetched body with the default heuristics
pub fn classify(fetched: &FetchResult) -> ExtractedDocument {
    DEFAULT_CLASSIFIER.classify(fetched)
}

fn file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(url: &str, content_type: Option<&str>, body: &[u8]) -> FetchResult {
        let url = Url::parse(url).unwrap();
        FetchResult {
            requested_url: url.clone(),
            final_url: url,
            status: Some(200),
            body: body.to_vec(),
            content_type: content_type.map(str::to_string),
            error: None,
        }
    }

    #[test]
    fn test_classify_html_page() {
        let html = r#"<html lang="en"><head><title>Interim report Q1 2024</title>
            <meta property="article:published_time" content="2024-04-25T07:00:00Z"></head>
            <body><nav><a href="/">Home</a></nav>
            <h1>Q1 2024</h1><p>Net sales increased.</p>
            <p>Investor Relations: Jane Doe, jane@acme.example</p>
            <a href="/ir/reports">Reports</a></body></html>"#;
        let doc = classify(&fetched(
            "https://acme.example/ir/q1",
            Some("text/html; charset=utf-8"),
            html.as_bytes(),
        ));

        assert_eq!(doc.kind, DocumentKind::Interim);
        assert_eq!(doc.title.as_deref(), Some("Interim report Q1 2024"));
        assert_eq!(doc.headings.len(), 1);
        assert_eq!(doc.published_at, NaiveDate::from_ymd_opt(2024, 4, 25));
        assert!(doc.language.is_some());
        assert_eq!(doc.content_type, "text/html");
        assert!(doc.text.contains("Net sales increased."));
        assert!(!doc.text.contains("Home"));
        assert!(doc
            .contacts
            .iter()
            .any(|c| matches!(c, ContactFact::Person { name, .. } if name == "Jane Doe")));
        assert!(doc
            .outbound_links
            .iter()
            .any(|l| l.url.as_str() == "https://acme.example/ir/reports"));
    }

    #[test]
    fn test_whitespace_rerender_keeps_fingerprint() {
        let a = classify(&fetched(
            "https://acme.example/ir",
            Some("text/html"),
            b"<html><body><p>Dividend   proposal</p></body></html>",
        ));
        let b = classify(&fetched(
            "https://acme.example/ir",
            Some("text/html"),
            b"<html>\n<body>\n  <p>Dividend proposal</p>\n\n</body></html>",
        ));
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_classify_pdf_contacts() {
        let bytes =
            pdf::tests::build_pdf(&["Investor Relations, Jane Doe, jane@acme.example, +1 555-0100"]);
        let doc = classify(&fetched("https://acme.example/files/contacts.pdf", None, &bytes));

        assert_eq!(doc.content_type, "application/pdf");
        assert!(doc.contacts.contains(&ContactFact::Email {
            address: "jane@acme.example".to_string()
        }));
        assert!(doc.contacts.contains(&ContactFact::Phone {
            raw: "+1 555-0100".to_string(),
            normalized: "15550100".to_string()
        }));
        assert!(doc.contacts.iter().any(|c| matches!(c,
            ContactFact::Person { name, role, .. }
                if name == "Jane Doe" && role.as_deref() == Some("Investor Relations"))));
    }

    #[test]
    fn test_image_has_empty_text_and_byte_fingerprint() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
        let doc = classify(&fetched("https://acme.example/logo", None, &png));

        assert_eq!(doc.content_type, "image/png");
        assert!(doc.text.is_empty());
        assert_eq!(doc.fingerprint, checksum(&png));
        assert_eq!(doc.title.as_deref(), Some("logo"));
    }

    #[test]
    fn test_broken_pdf_degrades() {
        let doc = classify(&fetched(
            "https://acme.example/broken.pdf",
            Some("application/pdf"),
            b"%PDF-1.4 garbage",
        ));
        assert!(doc.text.is_empty());
        assert!(doc.contacts.is_empty());
    }
}

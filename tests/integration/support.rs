//! Shared fixtures for the integration tests

use listed_harvest::crawler::{Coordinator, CrawlReport};
use listed_harvest::storage::SqliteStorage;
use listed_harvest::CrawlConfig;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::{MockServer, ResponseTemplate};

/// Fast crawl settings for a local mock server
pub fn crawl_config(max_pages: u32, max_depth: u32) -> CrawlConfig {
    CrawlConfig {
        max_pages,
        max_depth,
        delay: Duration::ZERO,
        workers: 2,
        timeout: Duration::from_secs(5),
        max_retries: 0,
        retry_backoff: Duration::from_millis(10),
        ..CrawlConfig::default()
    }
}

pub fn storage() -> Arc<Mutex<SqliteStorage>> {
    Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()))
}

pub fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), path)).unwrap()
}

/// An HTML page with a title and the given body markup
pub fn page(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body><main>{}</main></body></html>",
            title, body
        ))
}

/// Runs one crawl of `seed` for the entity "Acme"
pub async fn crawl(
    storage: &Arc<Mutex<SqliteStorage>>,
    config: CrawlConfig,
    seed: Url,
) -> CrawlReport {
    Coordinator::new(config, Arc::clone(storage), "Acme", vec![seed], "test-hash")
        .unwrap()
        .run()
        .await
        .unwrap()
}

/// Builds a one-page PDF holding a single line of text
pub fn pdf_with_line(line: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(line)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });

    let kids: Vec<Object> = vec![page_id.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

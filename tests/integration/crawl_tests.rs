//! Crawl runs against a wiremock site
//!
//! Unmatched paths answer 404, so robots.txt allows everything unless a
//! test mounts one.

use crate::support::{crawl, crawl_config, page, pdf_with_line, storage, url};
use chrono::NaiveDate;
use listed_harvest::crawler::Coordinator;
use listed_harvest::extract::{Classifier, DateHeuristic, MetaThenText, RoleLexicon};
use listed_harvest::storage::{PersistenceGateway, RunStatus};
use listed_harvest::{normalize_url, HarvestError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_depth_limit_and_external_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ir"))
        .respond_with(page(
            "Investors",
            r#"<a href="/ir/reports">Reports</a> <a href="https://partner.example/">Partner</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ir/reports"))
        .respond_with(page("Reports", r#"<a href="/ir/reports/2024">2024</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ir/reports/2024"))
        .respond_with(page("2024", "Too deep"))
        .expect(0)
        .mount(&server)
        .await;

    let storage = storage();
    let report = crawl(&storage, crawl_config(50, 1), url(&server, "/ir")).await;

    assert_eq!(report.pages, 2);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 0);
    assert!(!report.interrupted);

    let run = storage.lock().unwrap().get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.entity, "Acme");
    assert_eq!(run.counters, report.counters());
}

#[tokio::test]
async fn test_failures_are_recorded_without_versions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let storage = storage();
    for _ in 0..2 {
        let report = crawl(&storage, crawl_config(10, 1), url(&server, "/broken")).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 0);
    }

    let mut storage = storage.lock().unwrap();
    let entity_id = storage.ensure_entity("Acme").unwrap();
    let source_url = normalize_url(&format!("{}/broken", server.uri())).unwrap();
    let source = storage
        .find_source(entity_id, source_url.as_str())
        .unwrap()
        .unwrap();

    assert_eq!(source.failure_count, 2);
    assert_eq!(source.last_status, Some(500));
    assert!(source.last_fingerprint.is_none());
    assert_eq!(storage.count_versions(source.id).unwrap(), 0);
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    let seed = url(&server, "/ir");
    let storage = storage();

    Mock::given(method("GET"))
        .and(path("/ir"))
        .respond_with(page("Q1 update", "<p>Revenue grew 10% in the first quarter.</p>"))
        .mount(&server)
        .await;
    let first = crawl(&storage, crawl_config(10, 0), seed.clone()).await;
    assert_eq!(first.created, 1);

    let second = crawl(&storage, crawl_config(10, 0), seed.clone()).await;
    assert_eq!(second.created, 0);
    assert_eq!(second.unchanged, 1);

    // Markup-only differences keep the fingerprint
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/ir"))
        .respond_with(page(
            "Q1 update",
            "<p>Revenue   grew 10%\n\n  in the first quarter.</p>",
        ))
        .mount(&server)
        .await;
    let third = crawl(&storage, crawl_config(10, 0), seed.clone()).await;
    assert_eq!(third.unchanged, 1);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/ir"))
        .respond_with(page("Q1 update", "<p>Revenue fell 4% in the first quarter.</p>"))
        .mount(&server)
        .await;
    let fourth = crawl(&storage, crawl_config(10, 0), seed.clone()).await;
    assert_eq!(fourth.updated, 1);
    assert_eq!(fourth.created, 0);

    let mut storage = storage.lock().unwrap();
    let entity_id = storage.ensure_entity("Acme").unwrap();
    let source_url = normalize_url(seed.as_str()).unwrap();
    let source = storage
        .find_source(entity_id, source_url.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(storage.count_versions(source.id).unwrap(), 2);
    assert_eq!(source.fetch_count, 4);

    let stats = storage.stats().unwrap();
    assert_eq!(stats.runs, 4);
    assert_eq!(stats.sources, 1);
    assert_eq!(stats.versions, 2);
}

#[tokio::test]
async fn test_page_budget_is_respected() {
    let server = MockServer::start().await;
    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/news/{i}">Item {i}</a> "#))
        .collect();
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(page("News", &links))
        .mount(&server)
        .await;
    for i in 0..10 {
        Mock::given(method("GET"))
            .and(path(format!("/news/{i}")))
            .respond_with(page(&format!("Item {i}"), &format!("Press release number {i}")))
            .mount(&server)
            .await;
    }

    let storage = storage();
    let report = crawl(&storage, crawl_config(3, 2), url(&server, "/news")).await;

    assert_eq!(report.pages, 3);
    assert_eq!(report.reconciled(), 3);
    assert_eq!(storage.lock().unwrap().stats().unwrap().versions, 3);
}

#[tokio::test]
async fn test_each_url_is_fetched_once() {
    let server = MockServer::start().await;
    let mesh = r#"<a href="/a">A</a> <a href="/b">B</a> <a href="/c">C</a> <a href="/">Home</a>"#;

    // The preflight response doubles as the root's visit
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", mesh))
        .expect(1)
        .mount(&server)
        .await;
    for name in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/{name}")))
            .respond_with(page(name, &format!("Page {name} {mesh}")))
            .expect(1)
            .mount(&server)
            .await;
    }

    let storage = storage();
    let mut config = crawl_config(50, 3);
    config.workers = 4;
    let report = crawl(&storage, config, url(&server, "/")).await;

    assert_eq!(report.pages, 4);
    assert_eq!(report.created, 4);
}

#[tokio::test]
async fn test_robots_disallow_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ir"))
        .respond_with(page(
            "Investors",
            r#"<a href="/private/board">Board</a> <a href="/ir/calendar">Calendar</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/board"))
        .respond_with(page("Board", "Internal"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ir/calendar"))
        .respond_with(page("Calendar", "Annual general meeting in May"))
        .mount(&server)
        .await;

    let storage = storage();
    let report = crawl(&storage, crawl_config(10, 1), url(&server, "/ir")).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.created, 2);
}

#[tokio::test]
async fn test_sitemap_seeds_unlinked_pages() {
    let server = MockServer::start().await;
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{}/press/q1</loc></url>
</urlset>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(sitemap),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", "No links here"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/press/q1"))
        .respond_with(page("Q1 interim report", "Interim report for the first quarter"))
        .expect(1)
        .mount(&server)
        .await;

    let storage = storage();
    let mut config = crawl_config(10, 0);
    config.use_sitemap = true;
    let report = crawl(&storage, config, url(&server, "/")).await;

    assert_eq!(report.pages, 2);
    assert_eq!(report.created, 2);
}

#[tokio::test]
async fn test_pdf_contacts_are_exported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ir"))
        .respond_with(page(
            "Investors",
            r#"<a href="/files/ir-contacts.pdf">IR contacts (PDF)</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/ir-contacts.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(pdf_with_line(
                    "Investor Relations, Jane Doe, jane@acme.example, +1 555-0100",
                )),
        )
        .mount(&server)
        .await;

    let storage = storage();
    let report = crawl(&storage, crawl_config(10, 1), url(&server, "/ir")).await;
    assert_eq!(report.created, 2);

    let contacts = storage.lock().unwrap().entity_contacts("Acme").unwrap();
    assert!(contacts.contains(&("person".to_string(), "Jane Doe".to_string())));
    assert!(contacts.contains(&("email".to_string(), "jane@acme.example".to_string())));
    assert!(contacts.iter().any(|(kind, _)| kind == "phone"));
}

#[tokio::test]
async fn test_unreachable_seed_stores_nothing() {
    let storage = storage();
    let seed = Url::parse("http://127.0.0.1:1/ir").unwrap();

    let result = Coordinator::new(crawl_config(10, 1), Arc::clone(&storage), "Acme", vec![seed], "h")
        .unwrap()
        .run()
        .await;

    assert!(matches!(result, Err(HarvestError::UnreachableSeed { .. })));
    let stats = storage.lock().unwrap().stats().unwrap();
    assert_eq!(stats.runs, 0);
    assert_eq!(stats.entities, 0);
}

#[tokio::test]
async fn test_cancelled_run_is_marked_interrupted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ir"))
        .respond_with(page("Investors", "Welcome"))
        .mount(&server)
        .await;

    let storage = storage();
    let coordinator = Coordinator::new(
        crawl_config(10, 1),
        Arc::clone(&storage),
        "Acme",
        vec![url(&server, "/ir")],
        "h",
    )
    .unwrap();
    coordinator.cancellation_token().cancel();

    let report = coordinator.run().await.unwrap();
    assert!(report.interrupted);
    assert_eq!(report.pages, 0);

    let run = storage.lock().unwrap().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_invalid_pattern_is_rejected_before_crawling() {
    let mut config = crawl_config(10, 1);
    config.include = vec!["   ".to_string()];
    let seed = Url::parse("https://acme.example/ir").unwrap();

    let result = Coordinator::new(config, storage(), "Acme", vec![seed], "h");
    assert!(result.is_err());
}

/// Date heuristic that blows up on one marker word
struct FragileDates;

impl DateHeuristic for FragileDates {
    fn published_at(&self, meta: &BTreeMap<String, String>, text: &str) -> Option<NaiveDate> {
        if text.contains("poison") {
            panic!("date heuristic failed");
        }
        MetaThenText.published_at(meta, text)
    }
}

#[tokio::test]
async fn test_panicking_page_does_not_stall_the_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ir"))
        .respond_with(page(
            "Investors",
            r#"<a href="/ir/poison">Bad</a> <a href="/ir/fine">Fine</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ir/poison"))
        .respond_with(page("Bad", "This page contains poison"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ir/fine"))
        .respond_with(page("Fine", "Quarterly dividend paid"))
        .mount(&server)
        .await;

    for workers in [1, 2] {
        let storage = storage();
        let mut config = crawl_config(10, 1);
        config.workers = workers;
        let coordinator = Coordinator::new(
            config,
            Arc::clone(&storage),
            "Acme",
            vec![url(&server, "/ir")],
            "h",
        )
        .unwrap()
        .with_classifier(Classifier::new(RoleLexicon::default(), Box::new(FragileDates)));

        let report = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
            .await
            .expect("crawl stalled")
            .unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.interrupted);

        let run = storage.lock().unwrap().get_run(report.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }
}

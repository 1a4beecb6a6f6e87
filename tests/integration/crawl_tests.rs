//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run fetches,
//! adapters, the engine and the push sink end-to-end.

use chrono::{Duration as ChronoDuration, Utc};
use newsline::config::{SourceConfig, SourceKind};
use newsline::crawler::{
    build_http_client, build_iteration, AttemptFailure, CrawlIteration, FetchError, Requester,
    RetryPolicy, StopReason,
};
use newsline::sink::{should_pause, BackpressureSink, HttpSink};
use newsline::storage::{JsonlStore, Store};
use newsline::Record;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_requester(attempts: u32) -> Requester {
    let client = build_http_client(
        "newsline-test/1.0",
        "ru-RU,ru;q=0.9",
        Some("https://example.com/"),
        Duration::from_secs(5),
    )
    .expect("client");
    Requester::with_client(client, RetryPolicy::new(attempts, Duration::from_millis(10)))
}

fn article_html(header: &str, published_at: &str, body: &str) -> String {
    format!(
        r#"<html><head><meta name="keywords" content="мир, политика"></head><body>
        <h1 class="article__title">{header}</h1>
        <time datetime="{published_at}">today</time>
        <div class="article__body"><div class="article__text">{body}</div></div>
        </body></html>"#
    )
}

fn html_source(server: &MockServer, data_dir: &TempDir) -> SourceConfig {
    let mut source = SourceConfig::new("mocknews", SourceKind::Html);
    source.base_url = Some(server.uri());
    source.section_url = Some(format!("{}/world/", server.uri()));
    source.crawl.data_dir = data_dir.path().to_path_buf();
    source.crawl.rate_delay_min = 0.0;
    source.crawl.rate_delay_max = 0.0;
    source.crawl.backoff_seconds = 0.01;
    source
}

fn read_records(store: &JsonlStore) -> Vec<Record> {
    std::fs::read_to_string(store.record_path())
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).expect("record line"))
        .collect()
}

#[tokio::test]
async fn test_fetch_recovers_after_throttling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .and(header("accept-language", "ru-RU,ru;q=0.9"))
        .and(header("referer", "https://example.com/"))
        .and(header("user-agent", "newsline-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let body = fast_requester(3)
        .fetch(&format!("{}/busy", server.uri()))
        .await
        .expect("third attempt succeeds");

    assert_eq!(body, "finally");
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_fetch_gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = fast_requester(3)
        .fetch(&format!("{}/down", server.uri()))
        .await
        .unwrap_err();

    match err {
        FetchError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, AttemptFailure::Throttled(503)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_other_statuses_are_retried_too() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = fast_requester(2)
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::Exhausted {
            last: AttemptFailure::Status(404),
            ..
        }
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_html_section_crawl_end_to_end() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    let now = Utc::now();
    let today = now.format("%Y%m%d").to_string();
    let old_day = (now - ChronoDuration::days(10)).format("%Y%m%d").to_string();

    let section = format!(
        r#"<html><body>
        <a href="/{today}/second.html">second</a>
        <a href="/{today}/first.html">first</a>
        <a href="/{old_day}/old.html">old</a>
        <a href="https://elsewhere.example/{today}/foreign.html">foreign</a>
        <a href="/rubrics/world/">rubric</a>
        </body></html>"#
    );
    Mock::given(method("GET"))
        .and(path("/world/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(section))
        .mount(&server)
        .await;

    let articles = [
        (
            format!("/{today}/second.html"),
            article_html("Второй материал", &(now - ChronoDuration::hours(2)).to_rfc3339(), "Текст два"),
        ),
        (
            format!("/{today}/first.html"),
            article_html("Первый материал", &(now - ChronoDuration::hours(1)).to_rfc3339(), "Текст один"),
        ),
        (
            format!("/{old_day}/old.html"),
            article_html("Старый материал", &(now - ChronoDuration::days(10)).to_rfc3339(), "Давно"),
        ),
    ];
    for (article_path, body) in articles {
        Mock::given(method("GET"))
            .and(path(article_path.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;
    }

    let source = html_source(&server, &data_dir);
    let mut iteration = build_iteration(&source).expect("iteration");
    let outcome = iteration.run_iteration().await.expect("first pass");

    assert_eq!(outcome.stored, 2);
    assert_eq!(outcome.stop_reason, StopReason::Stale);
    assert_eq!(outcome.errors, 0);

    let store = JsonlStore::new(data_dir.path(), "mocknews", true);
    let records = read_records(&store);
    let headers: Vec<_> = records.iter().map(|r| r.header()).collect();
    assert_eq!(headers, ["Второй материал", "Первый материал"]);
    assert_eq!(records[0].hashtags(), ["мир", "политика"]);
    assert_eq!(records[0].source_name(), "mocknews");

    let keys = store.load_keys().unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains("второй материал"));
    assert!(keys.contains("первый материал"));

    // Second pass over the same listing halts at the first known item
    let mut iteration = build_iteration(&source).expect("iteration");
    let outcome = iteration.run_iteration().await.expect("second pass");
    assert_eq!(outcome.stored, 0);
    assert_eq!(outcome.stop_reason, StopReason::Duplicate);
    assert_eq!(read_records(&store).len(), 2);
}

#[tokio::test]
async fn test_broken_article_is_recorded_and_skipped() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    let today = Utc::now().format("%Y%m%d").to_string();

    Mock::given(method("GET"))
        .and(path("/world/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<a href="/{today}/gone.html">gone</a><a href="/{today}/bare.html">bare</a>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{today}/gone.html").as_str()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{today}/bare.html").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><p>no header</p></body></html>"))
        .mount(&server)
        .await;

    let mut source = html_source(&server, &data_dir);
    source.crawl.retry_count = 1;
    let mut iteration = build_iteration(&source).expect("iteration");
    let outcome = iteration.run_iteration().await.expect("pass");

    assert_eq!(outcome.stored, 0);
    assert_eq!(outcome.errors, 2);
    assert_eq!(outcome.stop_reason, StopReason::Done);

    let events = std::fs::read_to_string(data_dir.path().join("mocknews_events.jsonl")).unwrap();
    assert_eq!(events.lines().count(), 2);
    assert!(events.lines().all(|l| l.contains(r#""status":"error""#)));
}

#[tokio::test]
async fn test_telegram_preview_crawl() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    let now = Utc::now();

    let page = format!(
        r#"<html><body>
        <div class="tgme_widget_message" data-post="rian_ru/501">
          <div class="tgme_widget_message_text">Новость дня #главное</div>
          <time datetime="{}">now</time>
        </div>
        <div class="tgme_widget_message" data-post="rian_ru/500">
          <div class="tgme_widget_message_text">Вчерашнее</div>
          <time datetime="{}">then</time>
        </div>
        </body></html>"#,
        (now - ChronoDuration::minutes(5)).to_rfc3339(),
        (now - ChronoDuration::days(5)).to_rfc3339(),
    );
    Mock::given(method("GET"))
        .and(path("/s/rian_ru"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let mut source = SourceConfig::new("channels", SourceKind::Telegram);
    source.base_url = Some(server.uri());
    source.channels = vec!["@rian_ru".to_string()];
    source.crawl.data_dir = data_dir.path().to_path_buf();
    source.crawl.rate_delay_min = 0.0;
    source.crawl.rate_delay_max = 0.0;

    let mut iteration = build_iteration(&source).expect("iteration");
    let outcome = iteration.run_iteration().await.expect("pass");

    assert_eq!(outcome.stored, 1);
    assert_eq!(outcome.stop_reason, StopReason::Stale);

    let keys = std::fs::read_to_string(data_dir.path().join("channels_keys.txt")).unwrap();
    assert_eq!(keys, "rian_ru:501\n");

    let store = JsonlStore::new(data_dir.path(), "channels", true);
    let records = read_records(&store);
    assert_eq!(records[0].hashtags(), ["главное"]);
    assert_eq!(records[0].origin_ref(), Some("https://t.me/rian_ru/501"));
}

#[tokio::test]
async fn test_undated_telegram_post_becomes_error_event() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    let page = format!(
        r#"<html><body>
        <div class="tgme_widget_message" data-post="rian_ru/601">
          <div class="tgme_widget_message_text">Свежая новость</div>
          <time datetime="{}">now</time>
        </div>
        <div class="tgme_widget_message" data-post="rian_ru/600">
          <div class="tgme_widget_message_text">Без даты</div>
        </div>
        </body></html>"#,
        (Utc::now() - ChronoDuration::minutes(5)).to_rfc3339(),
    );
    Mock::given(method("GET"))
        .and(path("/s/rian_ru"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let mut source = SourceConfig::new("channels", SourceKind::Telegram);
    source.base_url = Some(server.uri());
    source.channels = vec!["rian_ru".to_string()];
    source.crawl.data_dir = data_dir.path().to_path_buf();
    source.crawl.rate_delay_min = 0.0;
    source.crawl.rate_delay_max = 0.0;
    source.crawl.max_pages = 1;

    let mut iteration = build_iteration(&source).expect("iteration");
    let outcome = iteration.run_iteration().await.expect("pass");

    assert_eq!(outcome.stored, 1);
    assert_eq!(outcome.errors, 1);
    assert_eq!(outcome.stop_reason, StopReason::Done);

    let events =
        std::fs::read_to_string(data_dir.path().join("channels_events.jsonl")).unwrap();
    let error_line = events.lines().last().unwrap();
    assert!(error_line.contains(r#""status":"error""#));
    assert!(error_line.contains("rian_ru/600"));
}

#[tokio::test]
async fn test_http_sink_reports_pause() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/test/save_news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"news_id": 10, "cluster_id": 4, "created": true}"#,
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/test/save_news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"news_id": 11, "cluster_id": 4, "created": false}"#,
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/test/save_news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let mut sink = HttpSink::new(format!("{}/test/save_news", server.uri()), Duration::from_secs(5))
        .expect("sink");
    let record = Record::new(
        "Заголовок",
        "Тело",
        (Utc::now() - ChronoDuration::minutes(1)).into(),
        vec!["мир".to_string()],
        "mocknews",
        None,
    )
    .unwrap();

    let ack = sink.push(&record).await;
    assert_eq!(ack.as_ref().map(|a| a.news_id), Some(Some(10)));
    assert!(!should_pause(ack.as_ref()));

    let ack = sink.push(&record).await;
    assert!(should_pause(ack.as_ref()));

    let ack = sink.push(&record).await;
    assert!(ack.is_none());
    assert!(should_pause(ack.as_ref()));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["title"], "Заголовок");
    assert_eq!(body["body"], "Тело");
    assert_eq!(body["source"], "mocknews");
    assert_eq!(body["hash_tags"], serde_json::json!(["мир"]));
}

#[tokio::test]
async fn test_unreachable_sink_pauses_crawl() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    let today = Utc::now().format("%Y%m%d").to_string();
    let published = (Utc::now() - ChronoDuration::hours(1)).to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/world/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<a href="/{today}/a.html">a</a><a href="/{today}/b.html">b</a>"#
        )))
        .mount(&server)
        .await;
    for name in ["a", "b"] {
        Mock::given(method("GET"))
            .and(path(format!("/{today}/{name}.html").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(article_html(
                &format!("Материал {name}"),
                &published,
                "Текст",
            )))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/save"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut source = html_source(&server, &data_dir);
    source.crawl.sink_url = Some(format!("{}/save", server.uri()));
    let mut iteration = build_iteration(&source).expect("iteration");
    let outcome = iteration.run_iteration().await.expect("pass");

    assert_eq!(outcome.stored, 1);
    assert_eq!(outcome.stop_reason, StopReason::Paused);
}

//! The Telegraph client end to end against a local API double.

mod common;

use common::{image_bytes, MockCapturer};
use image::ImageFormat;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use telegraph_wayback::{
    ArchiveConfig, ArchiveError, Archiver, CaptureData, CapturedPage, PublishResult,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ArchiveConfig {
    ArchiveConfig::builder()
        .telegraph_api_url(server.uri())
        .telegraph_upload_url(server.uri())
        .imgbb_api_key(None)
        .max_retries(1)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

async fn mount_account(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/createAccount"))
        .and(body_string_contains("short_name=telegraph-go"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {"short_name": "telegraph-go", "access_token": "tok123"}
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn page_json(path: &str, title: &str) -> serde_json::Value {
    serde_json::json!({
        "ok": true,
        "result": {"path": path, "url": format!("https://telegra.ph/{path}"), "title": title}
    })
}

fn article(url: &str) -> CapturedPage {
    CapturedPage {
        url: url.to_string(),
        title: "Hello".into(),
        html: Some(CaptureData::Inline(b"<article><p>Body</p></article>".to_vec())),
        ..Default::default()
    }
}

#[tokio::test]
async fn batch_creates_account_page_and_author_edit() {
    let server = MockServer::start().await;
    mount_account(&server).await;
    Mock::given(method("POST"))
        .and(path("/createPage"))
        .and(body_string_contains("access_token=tok123"))
        .and(body_string_contains("title=Hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("Hello-10-19", "Hello")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/editPage/Hello-10-19"))
        .and(body_string_contains("author_name=Source"))
        .and(body_string_contains("author_url=https%3A%2F%2Fexample.org%2Fhello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("Hello-10-19", "Hello")))
        .expect(1)
        .mount(&server)
        .await;

    let capturer = MockCapturer::default()
        .with_page("https://example.org/hello", article("https://example.org/hello"));
    let report = Archiver::new(config(&server))
        .unwrap()
        .with_capturer(Arc::new(capturer))
        .archive_batch(&["https://example.org/hello".to_string()])
        .await
        .unwrap();

    assert_eq!(
        report["https://example.org/hello"],
        PublishResult::Published {
            url: "https://telegra.ph/Hello-10-19".into()
        }
    );
}

#[tokio::test]
async fn rejected_title_is_retried_under_a_slug() {
    let server = MockServer::start().await;
    mount_account(&server).await;
    Mock::given(method("POST"))
        .and(path("/createPage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": false, "error": "TITLE_INVALID"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/createPage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("aB3dE9-10-19", "aB3dE9")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/editPage/aB3dE9-10-19"))
        .and(body_string_contains("title=Hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("aB3dE9-10-19", "Hello")))
        .expect(1)
        .mount(&server)
        .await;

    let published = Archiver::new(config(&server))
        .unwrap()
        .archive_captured(article("https://example.org/hello"))
        .await
        .unwrap();

    assert!(published.used_fallback_slug);
    assert_eq!(published.url, "https://telegra.ph/aB3dE9-10-19?title=Hello");
}

#[tokio::test]
async fn screenshot_is_uploaded_to_the_file_host() {
    let server = MockServer::start().await;
    mount_account(&server).await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"src": "/file/0123abcd.png"}])),
        )
        .expect(1)
        .mount(&server)
        .await;
    let gallery = format!(
        r#"{{"tag":"p","children":[{{"tag":"img","attrs":{{"src":"{}/file/0123abcd.png","alt":""}}}}]}}"#,
        server.uri()
    );
    let encoded: String = url::form_urlencoded::byte_serialize(gallery.as_bytes()).collect();
    Mock::given(method("POST"))
        .and(path("/createPage"))
        .and(body_string_contains(encoded.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("Shot-10-19", "Shot")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/editPage/Shot-10-19"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("Shot-10-19", "Shot")))
        .mount(&server)
        .await;

    let captured = CapturedPage {
        url: "https://example.org/shot".into(),
        title: "Shot".into(),
        image: Some(CaptureData::Inline(image_bytes(8, 8, ImageFormat::Png))),
        ..Default::default()
    };
    let published = Archiver::new(config(&server))
        .unwrap()
        .archive_captured(captured)
        .await
        .unwrap();

    assert_eq!(published.url, "https://telegra.ph/Shot-10-19");
}

#[tokio::test]
async fn account_failure_fails_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createAccount"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": false, "error": "FLOOD_WAIT_5"
        })))
        .mount(&server)
        .await;

    let capturer = MockCapturer::default()
        .with_page("https://example.org/hello", article("https://example.org/hello"));
    let err = Archiver::new(config(&server))
        .unwrap()
        .with_capturer(Arc::new(capturer))
        .archive_batch(&["https://example.org/hello".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::AccountFailed(_)));
    assert!(err.to_string().contains("FLOOD_WAIT_5"));
}

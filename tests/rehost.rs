//! Media rehosting against a local HTTP server and fake upload hosts.

mod common;

use common::{fast_config, image_bytes, MockUploader, UploadBehaviour};
use image::ImageFormat;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use telegraph_wayback::{
    ArchiveConfig, DocumentConverter, DocumentNode, MediaError, MediaRehoster, MediaUploader,
    NodeElement,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, at: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

fn rehoster(config: &ArchiveConfig, chain: &[Arc<MockUploader>]) -> MediaRehoster {
    let uploaders = chain
        .iter()
        .map(|u| Arc::clone(u) as Arc<dyn MediaUploader>)
        .collect();
    MediaRehoster::new(config, uploaders).unwrap()
}

#[tokio::test]
async fn webp_is_uploaded_as_png() {
    let server = MockServer::start().await;
    serve(&server, "/pic.webp", image_bytes(6, 4, ImageFormat::WebP)).await;
    let primary = MockUploader::new("primary", UploadBehaviour::Succeed("https://t/file".into()));

    let original = format!("{}/pic.webp", server.uri());
    let rehosted = rehoster(&fast_config(), &[primary.clone()])
        .rehost(&original)
        .await
        .unwrap();

    assert_eq!(rehosted, format!("https://t/file/1?orig={original}"));
    assert_eq!(primary.content_types(), vec!["image/png".to_string()]);
    let uploaded = primary.uploads.lock().unwrap()[0].1.clone();
    assert_eq!(image::guess_format(&uploaded).unwrap(), ImageFormat::Png);
}

#[tokio::test]
async fn other_images_are_uploaded_unchanged() {
    let server = MockServer::start().await;
    let jpeg = image_bytes(3, 3, ImageFormat::Jpeg);
    serve(&server, "/pic.jpg", jpeg.clone()).await;
    let primary = MockUploader::new("primary", UploadBehaviour::Succeed("https://t/file".into()));

    rehoster(&fast_config(), &[primary.clone()])
        .rehost(&format!("{}/pic.jpg", server.uri()))
        .await
        .unwrap();

    assert_eq!(primary.content_types(), vec!["image/jpeg".to_string()]);
    assert_eq!(primary.uploads.lock().unwrap()[0].1, jpeg);
}

#[tokio::test]
async fn empty_primary_falls_back_to_secondary_once() {
    let server = MockServer::start().await;
    serve(&server, "/a.png", image_bytes(2, 2, ImageFormat::Png)).await;
    let primary = MockUploader::new("primary", UploadBehaviour::Empty);
    let secondary = MockUploader::new("secondary", UploadBehaviour::Fail);

    let err = rehoster(&fast_config(), &[primary.clone(), secondary.clone()])
        .rehost(&format!("{}/a.png", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::UploadFailed { .. }), "{err}");
    assert_eq!(primary.count(), 1);
    assert_eq!(secondary.count(), 1);
}

#[tokio::test]
async fn secondary_url_is_used_when_primary_fails() {
    let server = MockServer::start().await;
    serve(&server, "/a.png", image_bytes(2, 2, ImageFormat::Png)).await;
    let primary = MockUploader::new("primary", UploadBehaviour::Fail);
    let secondary =
        MockUploader::new("secondary", UploadBehaviour::Succeed("https://i.ibb.co/x".into()));

    let original = format!("{}/a.png", server.uri());
    let rehosted = rehoster(&fast_config(), &[primary, secondary])
        .rehost(&original)
        .await
        .unwrap();

    assert_eq!(rehosted, format!("https://i.ibb.co/x/1?orig={original}"));
}

#[tokio::test]
async fn missing_resource_is_download_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let primary = MockUploader::new("primary", UploadBehaviour::Succeed("https://t".into()));

    let err = rehoster(&fast_config(), &[primary.clone()])
        .rehost(&format!("{}/gone.png", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::DownloadFailed { transient: false, .. }));
    assert_eq!(primary.count(), 0);
}

#[tokio::test]
async fn server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.png"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    serve(&server, "/flaky.png", image_bytes(2, 2, ImageFormat::Png)).await;
    let primary = MockUploader::new("primary", UploadBehaviour::Succeed("https://t".into()));

    let result = rehoster(&fast_config(), &[primary.clone()])
        .rehost(&format!("{}/flaky.png", server.uri()))
        .await;

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(primary.count(), 1);
}

#[tokio::test]
async fn oversized_download_is_rejected() {
    let server = MockServer::start().await;
    serve(&server, "/big.png", vec![0u8; 4096]).await;
    let config = ArchiveConfig::builder()
        .max_retries(0)
        .max_download_bytes(1024)
        .imgbb_api_key(None)
        .build()
        .unwrap();
    let primary = MockUploader::new("primary", UploadBehaviour::Succeed("https://t".into()));

    let err = rehoster(&config, &[primary.clone()])
        .rehost(&format!("{}/big.png", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::DownloadFailed { .. }));
    assert_eq!(primary.count(), 0);
}

#[tokio::test]
async fn converter_keeps_original_link_for_failed_media() {
    let server = MockServer::start().await;
    serve(&server, "/ok.png", image_bytes(2, 2, ImageFormat::Png)).await;
    Mock::given(method("GET"))
        .and(path("/dead.png"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    let primary = MockUploader::new("primary", UploadBehaviour::Succeed("https://t/file".into()));
    let rehoster = Arc::new(rehoster(&fast_config(), &[primary]));

    let ok = format!("{}/ok.png", server.uri());
    let dead = format!("{}/dead.png", server.uri());
    let html = format!(r#"<p>text</p><img src="{ok}"><img data-src="{dead}" alt="d">"#);
    let nodes = DocumentConverter::new(rehoster).convert(&html).await;

    let expected: Vec<DocumentNode> = vec![
        NodeElement::new("p").child("text").into(),
        NodeElement::new("img")
            .attr("src", format!("https://t/file/1?orig={ok}"))
            .into(),
        NodeElement::new("img")
            .attr("data-src", dead.as_str())
            .attr("alt", "d")
            .into(),
    ];
    assert_eq!(nodes, expected);
}

fn entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn temp_files_are_removed_on_every_outcome() {
    let server = MockServer::start().await;
    serve(&server, "/pic.webp", image_bytes(6, 4, ImageFormat::WebP)).await;
    serve(&server, "/pic.jpg", image_bytes(3, 3, ImageFormat::Jpeg)).await;
    serve(&server, "/big.png", vec![0u8; 4096]).await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = ArchiveConfig::builder()
        .max_retries(0)
        .max_download_bytes(1024)
        .temp_dir(dir.path())
        .imgbb_api_key(None)
        .build()
        .unwrap();
    let working = MockUploader::new("primary", UploadBehaviour::Succeed("https://t".into()));
    let broken = MockUploader::new("primary", UploadBehaviour::Fail);
    let ok = rehoster(&config, &[working.clone()]);
    let failing = rehoster(&config, &[broken.clone()]);

    ok.rehost(&format!("{}/pic.jpg", server.uri())).await.unwrap();
    assert_eq!(entries(dir.path()), 0, "after upload");

    ok.rehost(&format!("{}/pic.webp", server.uri())).await.unwrap();
    assert_eq!(entries(dir.path()), 0, "after webp transcode");

    let err = failing
        .rehost(&format!("{}/pic.webp", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::UploadFailed { .. }));
    assert_eq!(entries(dir.path()), 0, "after failed upload");

    let err = ok
        .rehost(&format!("{}/gone.png", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::DownloadFailed { .. }));
    assert_eq!(entries(dir.path()), 0, "after failed download");

    let err = ok
        .rehost(&format!("{}/big.png", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::DownloadFailed { .. }));
    assert_eq!(entries(dir.path()), 0, "after oversized download");

    assert_eq!(working.count(), 2);
    assert_eq!(broken.count(), 1);
}

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::http::{StatusCode, header};
use axum::routing::get;
use imgsearch::fingerprint::DHash;
use imgsearch::indexer::*;
use imgsearch::{Database, DatabaseWriter, FingerprintProvider};
use rstest::*;
use tempfile::TempDir;
use tokio::net::TcpListener;

use common::*;

/// 启动一个本地图片服务：`/ok.png` 返回图片，`/missing` 返回 404，`/stall` 一直不返回
async fn spawn_image_server() -> SocketAddr {
    let png = Bytes::from(png_bytes(&test_images()[0]));
    let app = Router::new()
        .route(
            "/ok.png",
            get(move || {
                let png = png.clone();
                async move { ([(header::CONTENT_TYPE, "image/png")], png) }
            }),
        )
        .route("/garbage", get(|| async { "not an image" }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/stall",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                StatusCode::OK
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

#[tokio::test(flavor = "multi_thread")]
async fn http_fetch_and_decode() {
    let addr = spawn_image_server().await;
    let source = HttpSource::new(Duration::from_secs(5)).unwrap();

    let image = fetch_and_decode(&source, &url(addr, "/ok.png"), None).await.unwrap();
    assert_eq!((image.width(), image.height()), (90, 80));
    assert_eq!(DHash.hash(&image).unwrap(), DHash.hash(&test_images()[0]).unwrap());
}

#[rstest]
#[case::not_found("/missing")]
#[case::unknown_route("/nothing/here")]
#[tokio::test(flavor = "multi_thread")]
async fn http_non_200_is_rejected(#[case] path: &str) {
    let addr = spawn_image_server().await;
    let source = HttpSource::new(Duration::from_secs(5)).unwrap();

    let err = source.fetch(&url(addr, path)).await.unwrap_err();
    assert!(matches!(err, IndexError::Status(404)), "unexpected error: {}", err);
}

#[tokio::test(flavor = "multi_thread")]
async fn http_client_timeout() {
    let addr = spawn_image_server().await;
    let source = HttpSource::new(Duration::from_millis(200)).unwrap();

    let err = source.fetch(&url(addr, "/stall")).await.unwrap_err();
    match err {
        IndexError::Request(e) => assert!(e.is_timeout()),
        e => panic!("unexpected error: {}", e),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_source_dispatch() {
    let addr = spawn_image_server().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local.png");
    test_images()[1].save(&path).unwrap();

    let source = AutoSource::new(Duration::from_secs(5)).unwrap();
    let remote = fetch_and_decode(&source, &url(addr, "/ok.png"), None).await.unwrap();
    let local = fetch_and_decode(&source, path.to_str().unwrap(), None).await.unwrap();

    assert_eq!(DHash.hash(&remote).unwrap(), DHash.hash(&test_images()[0]).unwrap());
    assert_eq!(DHash.hash(&local).unwrap(), DHash.hash(&test_images()[1]).unwrap());
    assert!(matches!(
        source.fetch(&url(addr, "/missing")).await,
        Err(IndexError::Status(404))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn indexer_over_http() {
    let addr = spawn_image_server().await;
    let indexer = Indexer::new(HttpSource::new(Duration::from_secs(5)).unwrap(), DHash)
        .concurrency(2)
        .timeout(Some(Duration::from_millis(300)));
    let output = shared_writer(DatabaseWriter::new(vec![]));

    let refs = ["/ok.png", "/missing", "/garbage", "/stall"]
        .iter()
        .map(|path| url(addr, path))
        .collect::<Vec<_>>();
    let report = indexer.run(refs.clone(), output.clone()).await.unwrap();

    assert_eq!(report.requested, 4);
    assert_eq!(report.indexed, 1);
    assert_eq!(report.dropped, 3);

    let data = output.lock().await.get_ref().clone();
    let db = Database::load(&data[..]).unwrap();
    assert_eq!(db.len(), 1);
    assert_eq!(db.entries()[0].identifier, refs[0]);
}

mod common;

use axum::{extract::State, routing::get, Router};
use common::test_config;
use relay_service::services::providers::mock::MockChatProvider;
use relay_service::services::KeepAlive;
use relay_service::startup::Application;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Start a server that counts GET /ping hits. Returns its ping URL.
async fn spawn_ping_target() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/ping",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "pong"
            }),
        )
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}/ping", addr), hits)
}

/// An address nothing is listening on.
async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/ping", addr)
}

#[tokio::test]
async fn pings_repeatedly_until_cancelled() {
    let (url, hits) = spawn_ping_target().await;
    let shutdown = CancellationToken::new();

    let handle = KeepAlive::new(url, Duration::from_millis(50)).spawn(shutdown.clone());
    tokio::time::sleep(Duration::from_millis(400)).await;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("keep-alive did not stop")
        .expect("keep-alive panicked");

    let seen = hits.load(Ordering::SeqCst);
    assert!(seen >= 2, "expected at least two pings, saw {}", seen);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(hits.load(Ordering::SeqCst), seen, "pinged after cancellation");
}

#[tokio::test]
async fn first_ping_waits_one_interval() {
    let (url, hits) = spawn_ping_target().await;
    let shutdown = CancellationToken::new();

    let handle = KeepAlive::new(url, Duration::from_secs(600)).spawn(shutdown.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn network_failures_do_not_stop_the_loop() {
    let url = dead_url().await;
    let shutdown = CancellationToken::new();

    let handle = KeepAlive::new(url, Duration::from_millis(20)).spawn(shutdown.clone());
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!handle.is_finished());
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("keep-alive did not stop")
        .expect("keep-alive panicked");
}

#[tokio::test]
async fn ping_once_reports_outcome() {
    let (url, hits) = spawn_ping_target().await;

    assert!(KeepAlive::new(url, Duration::from_secs(1)).ping_once().await);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(!KeepAlive::new(dead_url().await, Duration::from_secs(1)).ping_once().await);
}

#[tokio::test]
async fn application_runs_keep_alive_when_configured() {
    let (url, hits) = spawn_ping_target().await;
    let config = test_config(&[("KEEP_ALIVE_URL", url.as_str()), ("KEEP_ALIVE_INTERVAL_SECS", "1")]);

    let app = Application::build_with_provider(config, Arc::new(MockChatProvider::fixed("ok")))
        .await
        .expect("Failed to build application");
    let shutdown = app.shutdown_token();
    let handle = tokio::spawn(app.run_until_stopped());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(hits.load(Ordering::SeqCst) >= 1);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("application did not stop")
        .expect("application panicked")
        .expect("application returned an error");
}

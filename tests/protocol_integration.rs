//! Socket protocol tests against a live daemon on a temporary socket

mod common;

use common::{wait_for, wait_for_captures, TestDaemon};
use lamco_clip_history::client::{ClientError, HistoryClient};
use lamco_clip_history::clipboard::CaptureStats;
use lamco_clip_history::history::{ContentType, HistoryLimits};
use lamco_clip_history::protocol::{ClientCodec, ProtocolError};

#[tokio::test]
async fn test_list_empty_history() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;

    let mut client = daemon.client().await;
    assert!(client.list().await.unwrap().is_empty());

    daemon.stop().await;
}

#[tokio::test]
async fn test_list_and_get_round_trip() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    let first = daemon.store.insert(ContentType::Text, &b"first snippet"[..]);
    let second = daemon.store.insert(ContentType::Png, vec![0x89, b'P', b'N', b'G']);

    let mut client = daemon.client().await;
    let manifest = client.list().await.unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest[0].id, second.entry().id);
    assert_eq!(manifest[0].content_type, ContentType::Png);
    assert_eq!(manifest[0].size, 4);
    assert!(manifest[0].preview.is_empty());
    assert_eq!(manifest[1].id, first.entry().id);
    assert_eq!(manifest[1].preview, "first snippet");

    let entry = client.get(first.entry().id).await.unwrap();
    assert_eq!(entry.content_type, ContentType::Text);
    assert_eq!(&entry.payload[..], b"first snippet");

    daemon.stop().await;
}

#[tokio::test]
async fn test_unknown_ids_report_not_found() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    daemon.store.insert(ContentType::Text, &b"kept"[..]);

    let mut client = daemon.client().await;
    assert!(matches!(client.get(999).await, Err(ClientError::NotFound(999))));
    assert!(matches!(client.delete(999).await, Err(ClientError::NotFound(999))));
    assert!(matches!(client.select(999).await, Err(ClientError::NotFound(999))));

    // Nothing was published and the history is untouched
    assert_eq!(daemon.clipboard.publish_count(), 0);
    assert_eq!(client.list().await.unwrap().len(), 1);

    daemon.stop().await;
}

#[tokio::test]
async fn test_delete_then_get() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    let id = daemon.store.insert(ContentType::Text, &b"short-lived"[..]).entry().id;

    let mut client = daemon.client().await;
    client.delete(id).await.unwrap();
    assert!(matches!(client.get(id).await, Err(ClientError::NotFound(_))));
    assert!(client.list().await.unwrap().is_empty());

    daemon.stop().await;
}

#[tokio::test]
async fn test_clear_reports_removed_count() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    for text in ["a", "b", "c"] {
        daemon.store.insert(ContentType::Text, text.as_bytes().to_vec());
    }

    let mut client = daemon.client().await;
    assert_eq!(client.clear().await.unwrap(), 3);
    assert_eq!(client.clear().await.unwrap(), 0);
    assert!(client.list().await.unwrap().is_empty());

    daemon.stop().await;
}

#[tokio::test]
async fn test_malformed_request_closes_only_that_connection() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    daemon.store.insert(ContentType::Text, &b"survivor"[..]);

    let mut healthy = daemon.client().await;
    let mut broken = daemon.client().await;

    broken.send_raw(&[0xEE]).await.unwrap();
    assert!(broken.closed().await);

    let manifest = healthy.list().await.unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].preview, "survivor");

    // New clients are still accepted
    let mut fresh = daemon.client().await;
    assert_eq!(fresh.list().await.unwrap().len(), 1);

    daemon.stop().await;
}

#[tokio::test]
async fn test_concurrent_clients() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    for i in 0..20 {
        daemon.store.insert(ContentType::Text, format!("snippet {}", i).into_bytes());
    }

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let path = daemon.socket_path.clone();
        tasks.push(tokio::spawn(async move {
            let mut client = HistoryClient::connect(&path).await.unwrap();
            for _ in 0..10 {
                let manifest = client.list().await.unwrap();
                assert_eq!(manifest.len(), 20);
                assert_eq!(manifest[0].preview, "snippet 19");
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    daemon.stop().await;
}

#[tokio::test]
async fn test_notify_captures_clipboard() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;

    daemon.copy_text("copied from an editor").await;
    wait_for_captures(&daemon.monitor, 1).await;

    let mut client = daemon.client().await;
    let manifest = client.list().await.unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].content_type, ContentType::Text);
    assert_eq!(manifest[0].preview, "copied from an editor");

    daemon.stop().await;
}

#[tokio::test]
async fn test_select_publishes_entry() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    let id = daemon.store.insert(ContentType::Text, &b"paste me"[..]).entry().id;

    let mut client = daemon.client().await;
    client.select(id).await.unwrap();

    let published = daemon.clipboard.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, ContentType::Text);
    assert_eq!(&published[0].1[..], b"paste me");

    // The publish comes back as a change for the same bytes
    wait_for(|| daemon.monitor.stats().promoted == 1).await;
    assert_eq!(daemon.store.len(), 1);

    daemon.stop().await;
}

#[tokio::test]
async fn test_select_publish_failure_is_error() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    let id = daemon.store.insert(ContentType::Text, &b"stuck"[..]).entry().id;
    daemon.clipboard.set_fail_publish(true);

    let mut client = daemon.client().await;
    assert!(matches!(client.select(id).await, Err(ClientError::Server(_))));

    // The connection stays usable
    assert_eq!(client.list().await.unwrap().len(), 1);

    daemon.stop().await;
}

/// PNG-signed payload of `len` bytes with a position-dependent pattern
fn large_png(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    data[..8].copy_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    data
}

#[tokio::test]
async fn test_concurrent_large_image_transfers() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    let payload = large_png(8 * 1024 * 1024);
    let id = daemon.store.insert(ContentType::Png, payload.clone()).entry().id;
    daemon.store.insert(ContentType::Text, &b"small neighbour"[..]);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let path = daemon.socket_path.clone();
        let expected = payload.clone();
        tasks.push(tokio::spawn(async move {
            let mut client = HistoryClient::connect(&path).await.unwrap();
            for _ in 0..2 {
                let entry = client.get(id).await.unwrap();
                assert_eq!(entry.id, id);
                assert_eq!(entry.content_type, ContentType::Png);
                assert_eq!(entry.payload.len(), expected.len());
                assert!(entry.payload.as_ref() == expected.as_slice());

                // Requests after a large body stay in sync
                assert_eq!(client.list().await.unwrap().len(), 2);
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    daemon.stop().await;
}

#[tokio::test]
async fn test_client_frame_limit_applies_to_get() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    let payload = large_png(64 * 1024);
    let id = daemon.store.insert(ContentType::Png, payload.clone()).entry().id;

    let mut small = HistoryClient::connect_with(&daemon.socket_path, ClientCodec::new(32 * 1024))
        .await
        .unwrap();
    assert!(matches!(
        small.get(id).await,
        Err(ClientError::Protocol(ProtocolError::FrameTooLarge { .. }))
    ));

    let mut matched = HistoryClient::connect_with(&daemon.socket_path, ClientCodec::new(128 * 1024))
        .await
        .unwrap();
    assert_eq!(matched.get(id).await.unwrap().payload.len(), payload.len());

    daemon.stop().await;
}

#[tokio::test]
async fn test_notify_reports_query_failure() {
    let daemon = TestDaemon::start(HistoryLimits::default()).await;
    daemon.clipboard.set_contents("text/plain", &b"unreachable"[..]);
    daemon.clipboard.set_fail_queries(true);

    let mut client = daemon.client().await;
    assert!(matches!(client.notify().await, Err(ClientError::Server(_))));

    // Nothing was queued for capture and the connection is still usable
    assert!(client.list().await.unwrap().is_empty());
    assert_eq!(daemon.monitor.stats(), CaptureStats::default());

    daemon.clipboard.set_fail_queries(false);
    client.notify().await.unwrap();
    wait_for(|| daemon.store.len() == 1).await;

    daemon.stop().await;
}

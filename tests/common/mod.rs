//! Shared harness: a daemon on a temporary socket backed by an in-memory clipboard

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lamco_clip_history::client::HistoryClient;
use lamco_clip_history::clipboard::{CaptureLimits, CaptureMonitor, MemoryClipboard};
use lamco_clip_history::history::{HistoryLimits, HistoryStore};
use lamco_clip_history::protocol::DEFAULT_MAX_FRAME_SIZE;
use lamco_clip_history::server::{ClipDaemon, ServerOptions};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct TestDaemon {
    _dir: TempDir,
    pub socket_path: PathBuf,
    pub clipboard: Arc<MemoryClipboard>,
    pub store: Arc<HistoryStore>,
    pub monitor: CaptureMonitor,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl TestDaemon {
    pub async fn start(limits: HistoryLimits) -> Self {
        Self::start_with(limits, CaptureLimits::default(), MemoryClipboard::new()).await
    }

    pub async fn start_with(
        limits: HistoryLimits,
        capture_limits: CaptureLimits,
        clipboard: MemoryClipboard,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("clip.sock");
        let clipboard = Arc::new(clipboard);
        let store = Arc::new(HistoryStore::new(limits));

        let daemon = ClipDaemon::from_parts(
            ServerOptions {
                socket_path: socket_path.clone(),
                socket_mode: 0o600,
                max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            },
            store.clone(),
            clipboard.clone(),
            capture_limits,
            Duration::from_secs(2),
        );
        clipboard.attach_notifier(daemon.notifier());
        let monitor = daemon.capture_monitor();

        let bound = daemon.bind().await.unwrap();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            bound.run(token).await.unwrap();
        });

        Self {
            _dir: dir,
            socket_path,
            clipboard,
            store,
            monitor,
            shutdown,
            task,
        }
    }

    pub async fn client(&self) -> HistoryClient {
        HistoryClient::connect(&self.socket_path).await.unwrap()
    }

    /// Put text on the clipboard and announce it the way `wl-paste --watch` would
    pub async fn copy_text(&self, text: &str) {
        self.clipboard
            .set_contents("text/plain;charset=utf-8", text.as_bytes().to_vec());
        self.client().await.notify().await.unwrap();
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.task.await.unwrap();
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 2s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the capture loop has processed `count` notifications
pub async fn wait_for_captures(monitor: &CaptureMonitor, count: u64) {
    wait_for(|| {
        let stats = monitor.stats();
        stats.stored + stats.promoted + stats.unsupported + stats.failed >= count
    })
    .await;
}

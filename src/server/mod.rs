//! Daemon Server Module
//!
//! Owns the history store, the capture loop and the Unix socket listener.
//!
//! # Architecture
//!
//! ```text
//! ClipDaemon
//!   ├─> HistoryStore (Arc, shared by everything below)
//!   ├─> CaptureLoop task (change notifications → store)
//!   └─> Accept loop
//!         └─> one task per client (LIST/GET/SELECT/DELETE/CLEAR/NOTIFY)
//! ```
//!
//! # Socket lifecycle
//!
//! - A leftover socket file nobody answers on is removed before binding
//! - A socket another daemon is still serving is an error
//! - Permissions are set right after bind (`0600` by default)
//! - The file is removed again on shutdown
//!
//! # Example
//!
//! ```no_run
//! use lamco_clip_history::clipboard::MemoryClipboard;
//! use lamco_clip_history::config::Config;
//! use lamco_clip_history::server::ClipDaemon;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let daemon = ClipDaemon::new(&config, Arc::new(MemoryClipboard::new()))?;
//!     daemon.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

mod connection;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clipboard::{
    CaptureLimits, CaptureLoop, CaptureMonitor, ChangeNotifier, ClipboardBackend,
    ClipboardChange, SelectionController,
};
use crate::config::Config;
use crate::history::HistoryStore;
use connection::{handle_connection, ConnectionContext};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Another daemon is answering on the socket
    #[error("Socket {0} is already in use by a running daemon")]
    SocketInUse(PathBuf),

    /// Binding the listener failed
    #[error("Failed to bind socket {path}: {source}")]
    Bind {
        /// Socket path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Setting socket permissions failed
    #[error("Failed to set permissions on socket {path}: {source}")]
    Permissions {
        /// Socket path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Other IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Socket path
    pub socket_path: PathBuf,
    /// Permission bits for the socket file
    pub socket_mode: u32,
    /// Frame limit for responses
    pub max_frame_size: usize,
}

/// Clipboard history daemon
pub struct ClipDaemon {
    options: ServerOptions,
    store: Arc<HistoryStore>,
    backend: Arc<dyn ClipboardBackend>,
    capture_limits: CaptureLimits,
    publish_timeout: Duration,
    notifier: ChangeNotifier,
    capture: CaptureLoop,
}

impl ClipDaemon {
    /// Build a daemon from configuration
    pub fn new(config: &Config, backend: Arc<dyn ClipboardBackend>) -> anyhow::Result<Self> {
        let options = ServerOptions {
            socket_path: config.socket_path()?,
            socket_mode: config.server.socket_mode,
            max_frame_size: config.server.max_frame_size,
        };
        let store = Arc::new(HistoryStore::new(config.history_limits()));

        Ok(Self::from_parts(
            options,
            store,
            backend,
            config.capture_limits(),
            config.publish_timeout(),
        ))
    }

    /// Build a daemon around an existing store
    pub fn from_parts(
        options: ServerOptions,
        store: Arc<HistoryStore>,
        backend: Arc<dyn ClipboardBackend>,
        capture_limits: CaptureLimits,
        publish_timeout: Duration,
    ) -> Self {
        let (notifier, changes) = ChangeNotifier::channel();
        let capture = CaptureLoop::new(backend.clone(), store.clone(), capture_limits, changes);

        Self {
            options,
            store,
            backend,
            capture_limits,
            publish_timeout,
            notifier,
            capture,
        }
    }

    /// Shared history store
    pub fn store(&self) -> Arc<HistoryStore> {
        self.store.clone()
    }

    /// Notifier feeding the capture loop
    ///
    /// Attach it to backends that observe clipboard changes themselves.
    pub fn notifier(&self) -> ChangeNotifier {
        self.notifier.clone()
    }

    /// Capture loop state and counters
    pub fn capture_monitor(&self) -> CaptureMonitor {
        self.capture.monitor()
    }

    /// Socket path this daemon binds
    pub fn socket_path(&self) -> &Path {
        &self.options.socket_path
    }

    /// Bind the socket without serving yet
    pub async fn bind(self) -> Result<BoundDaemon> {
        let path = self.options.socket_path.clone();
        prepare_socket_path(&path).await?;

        let listener = UnixListener::bind(&path).map_err(|source| ServerError::Bind {
            path: path.clone(),
            source,
        })?;

        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(self.options.socket_mode),
        )
        .map_err(|source| ServerError::Permissions {
            path: path.clone(),
            source,
        })?;

        info!("Listening on {}", path.display());

        Ok(BoundDaemon {
            daemon: self,
            listener,
        })
    }

    /// Bind and serve until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.bind().await?.run(shutdown).await
    }
}

/// Daemon with its socket bound
pub struct BoundDaemon {
    daemon: ClipDaemon,
    listener: UnixListener,
}

impl BoundDaemon {
    /// Bound socket path
    pub fn socket_path(&self) -> &Path {
        &self.daemon.options.socket_path
    }

    /// Shared history store
    pub fn store(&self) -> Arc<HistoryStore> {
        self.daemon.store()
    }

    /// Serve clients until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let BoundDaemon { daemon, listener } = self;
        let ClipDaemon {
            options,
            store,
            backend,
            capture_limits,
            publish_timeout,
            notifier,
            capture,
        } = daemon;

        info!("╔════════════════════════════════════════════════════════════╗");
        info!("║          Clipboard history daemon starting                 ║");
        info!("╚════════════════════════════════════════════════════════════╝");
        info!("  Socket: {}", options.socket_path.display());
        info!("  Backend: {}", backend.name());
        info!(
            "  History: {} entries, {} bytes max",
            store.limits().capacity,
            store.limits().max_total_bytes
        );
        info!("  Max entry size: {} bytes", capture_limits.max_entry_size);

        let capture_task = tokio::spawn(capture.run(shutdown.child_token()));

        // Pick up whatever is on the clipboard already
        match backend.offered_types().await {
            Ok(offered) if !offered.is_empty() => {
                notifier.notify(ClipboardChange::new(offered));
            }
            Ok(_) => debug!("Clipboard empty at startup"),
            Err(e) => warn!("Could not query clipboard at startup: {}", e),
        }

        let ctx = Arc::new(ConnectionContext {
            selection: SelectionController::new(store.clone(), backend.clone(), publish_timeout),
            store,
            backend,
            notifier,
            max_frame_size: options.max_frame_size,
            query_timeout: capture_limits.read_timeout,
        });

        let next_conn_id = AtomicU64::new(1);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let conn_id = next_conn_id.fetch_add(1, Ordering::Relaxed);
                        debug!("Client {} connected", conn_id);

                        let ctx = ctx.clone();
                        let shutdown = shutdown.child_token();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, conn_id, ctx, shutdown).await {
                                if e.is_disconnect() {
                                    debug!("Client {} went away: {}", conn_id, e);
                                } else {
                                    warn!("Closing client {}: {}", conn_id, e);
                                }
                            }
                        });
                    }
                    Err(e) => error!("Accept error: {}", e),
                },
            }
        }

        drop(listener);
        if let Err(e) = std::fs::remove_file(&options.socket_path) {
            warn!(
                "Failed to remove socket {}: {}",
                options.socket_path.display(),
                e
            );
        }

        if let Err(e) = capture_task.await {
            error!("Capture task failed: {}", e);
        }

        info!("Daemon stopped");
        Ok(())
    }
}

/// Make `path` bindable: create its directory and clear a stale socket
async fn prepare_socket_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if !path.exists() {
        return Ok(());
    }

    if UnixStream::connect(path).await.is_ok() {
        return Err(ServerError::SocketInUse(path.to_path_buf()));
    }

    debug!("Removing stale socket {}", path.display());
    std::fs::remove_file(path)?;
    Ok(())
}

//! Daemon client
//!
//! Async client for the daemon socket, used by `lamco-clipctl` and the
//! integration tests.

use futures::{SinkExt, StreamExt};
use std::path::Path;
use thiserror::Error;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::history::{Entry, EntrySummary};
use crate::protocol::{ClientCodec, ProtocolError, Request, ResponseFrame, Status};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not reach the daemon
    #[error("Failed to connect to {path}: {source}")]
    Connect {
        /// Socket path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Entry does not exist
    #[error("No history entry with id {0}")]
    NotFound(u64),

    /// Daemon reported a failure
    #[error("Daemon error: {0}")]
    Server(String),

    /// Daemon closed the connection before answering
    #[error("Daemon closed the connection")]
    Disconnected,

    /// Wire protocol violation
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Connection to a running daemon
pub struct HistoryClient {
    framed: Framed<UnixStream, ClientCodec>,
}

impl HistoryClient {
    /// Connect to the daemon socket
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with(path, ClientCodec::default()).await
    }

    /// Connect with a specific codec (frame limit)
    pub async fn connect_with(path: impl AsRef<Path>, codec: ClientCodec) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connect {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self {
            framed: Framed::new(stream, codec),
        })
    }

    async fn call(&mut self, request: Request) -> Result<ResponseFrame> {
        self.framed.send(request).await?;
        let frame = self
            .framed
            .next()
            .await
            .ok_or(ClientError::Disconnected)??;

        match frame.status {
            Status::Ok => Ok(frame),
            Status::NotFound => Err(ClientError::NotFound(match request {
                Request::Select(id) | Request::Get(id) | Request::Delete(id) => id,
                _ => 0,
            })),
            Status::Error => Err(ClientError::Server(frame.error_message())),
        }
    }

    /// Tell the daemon the clipboard changed
    pub async fn notify(&mut self) -> Result<()> {
        self.call(Request::Notify).await.map(|_| ())
    }

    /// Manifest, newest first
    pub async fn list(&mut self) -> Result<Vec<EntrySummary>> {
        Ok(self.call(Request::List).await?.into_list()?)
    }

    /// Full entry with payload
    pub async fn get(&mut self, id: u64) -> Result<Entry> {
        Ok(self.call(Request::Get(id)).await?.into_entry()?)
    }

    /// Make entry `id` the current clipboard content
    pub async fn select(&mut self, id: u64) -> Result<()> {
        self.call(Request::Select(id)).await.map(|_| ())
    }

    /// Delete entry `id`
    pub async fn delete(&mut self, id: u64) -> Result<()> {
        self.call(Request::Delete(id)).await.map(|_| ())
    }

    /// Delete every entry, returning how many were removed
    pub async fn clear(&mut self) -> Result<u32> {
        Ok(self.call(Request::Clear).await?.into_cleared()?)
    }

    /// Send raw bytes, bypassing the codec
    ///
    /// Lets callers probe how the daemon treats malformed input.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        self.framed
            .get_mut()
            .write_all(bytes)
            .await
            .map_err(ProtocolError::from)?;
        Ok(())
    }

    /// Wait for the daemon to close the connection
    ///
    /// Returns true if it closed without sending anything else.
    pub async fn closed(&mut self) -> bool {
        matches!(self.framed.next().await, None | Some(Err(_)))
    }
}

//! Per-client connection handling
//!
//! Each accepted stream is wrapped in a [`Framed`] with [`ServerCodec`] and
//! served sequentially: read a request, answer it, repeat. A protocol error
//! ends this connection and nothing else.

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::clipboard::{ChangeNotifier, ClipboardBackend, ClipboardChange, SelectError, SelectionController};
use crate::history::{HistoryError, HistoryStore};
use crate::protocol::{ProtocolError, Request, Response, ServerCodec};

/// Shared state every connection task needs
pub(crate) struct ConnectionContext {
    pub(crate) store: Arc<HistoryStore>,
    pub(crate) backend: Arc<dyn ClipboardBackend>,
    pub(crate) selection: SelectionController,
    pub(crate) notifier: ChangeNotifier,
    pub(crate) max_frame_size: usize,
    pub(crate) query_timeout: Duration,
}

impl ConnectionContext {
    /// Answer one request
    pub(crate) async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Notify => self.notify().await,
            Request::List => Response::List(self.store.list()),
            Request::Get(id) => match self.store.get(id) {
                Ok(entry) => Response::Entry(entry),
                Err(HistoryError::NotFound(_)) => Response::NotFound,
            },
            Request::Select(id) => match self.selection.select(id).await {
                Ok(_) => Response::Ok,
                Err(SelectError::NotFound(_)) => Response::NotFound,
                Err(e) => Response::Error(e.to_string()),
            },
            Request::Delete(id) => match self.store.remove(id) {
                Ok(()) => Response::Ok,
                Err(HistoryError::NotFound(_)) => Response::NotFound,
            },
            Request::Clear => {
                let removed = self.store.clear();
                Response::Cleared(u32::try_from(removed).unwrap_or(u32::MAX))
            }
        }
    }

    async fn notify(&self) -> Response {
        let offered = tokio::time::timeout(self.query_timeout, self.backend.offered_types()).await;

        match offered {
            Ok(Ok(mime_types)) => {
                if !self.notifier.notify(ClipboardChange::new(mime_types)) {
                    return Response::Error("capture loop is not running".to_string());
                }
                Response::Ok
            }
            Ok(Err(e)) => {
                warn!("Failed to query offered types: {}", e);
                Response::Error(e.to_string())
            }
            Err(_) => Response::Error(format!(
                "Querying offered types timed out after {}ms",
                self.query_timeout.as_millis()
            )),
        }
    }

    /// Replace responses the codec would refuse with an error the client can read
    fn fit_frame(&self, response: Response) -> Response {
        let body_len = response.body_len();
        if body_len <= self.max_frame_size {
            return response;
        }

        let mut message = format!(
            "Response of {} bytes exceeds frame limit of {}",
            body_len, self.max_frame_size
        );
        if message.len() > self.max_frame_size {
            let mut end = self.max_frame_size;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Response::Error(message)
    }
}

/// Serve one client until it disconnects, misbehaves or the daemon shuts down
pub(crate) async fn handle_connection(
    stream: UnixStream,
    conn_id: u64,
    ctx: Arc<ConnectionContext>,
    shutdown: CancellationToken,
) -> Result<(), ProtocolError> {
    let mut framed = Framed::new(stream, ServerCodec::new(ctx.max_frame_size));
    let mut served = 0u64;

    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = framed.next() => match next {
                Some(Ok(request)) => request,
                Some(Err(e)) => return Err(e),
                None => break,
            },
        };

        trace!("Client {}: {:?}", conn_id, request);
        let response = ctx.fit_frame(ctx.handle(request).await);
        debug!(
            "Client {}: {} -> {:?}",
            conn_id,
            request.name(),
            response.status()
        );

        framed.send(response).await?;
        served += 1;
    }

    debug!("Client {} disconnected after {} requests", conn_id, served);
    Ok(())
}

//! TCP listener: one task per connection, bounded by a semaphore.

use crate::codec::{CodecError, LineCodec};
use crate::executor::{ClientState, Executor, Response};
use arbor_common::{Result, ServerConfig};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Line-protocol server sharing one [`Executor`] across connections.
pub struct Server {
    listener: TcpListener,
    executor: Arc<Executor>,
    /// Free connection slots.
    slots: Arc<Semaphore>,
    max_line_length: usize,
    next_id: AtomicU64,
}

impl Server {
    /// Binds `config.bind_addr()`.
    pub async fn bind(config: &ServerConfig, executor: Arc<Executor>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        Ok(Self::new(listener, executor, config))
    }

    /// Wraps an already bound listener.
    pub fn new(listener: TcpListener, executor: Arc<Executor>, config: &ServerConfig) -> Self {
        Self {
            listener,
            executor,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            max_line_length: config.max_line_length,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` completes. Connections already
    /// running are left to finish on their own.
    pub async fn serve_with_shutdown(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        loop {
            let (socket, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        // Accept errors such as EMFILE are usually transient.
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    info!("shutting down listener");
                    return Ok(());
                }
            };

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let mut framed = Framed::new(socket, LineCodec::new(self.max_line_length));

            let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                warn!(conn = id, %peer, "connection limit reached");
                tokio::spawn(async move {
                    let _ = framed
                        .send(Response::closing("ERROR: too many connections"))
                        .await;
                });
                continue;
            };

            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                info!(conn = id, %peer, "connection accepted");
                if let Err(e) = handle_connection(framed, executor, id).await {
                    warn!(conn = id, error = %e, "connection error");
                }
                info!(conn = id, "connection closed");
                drop(permit);
            });
        }
    }
}

/// Serves one client until EOF, `EXIT` or a framing error.
async fn handle_connection(
    mut framed: Framed<TcpStream, LineCodec>,
    executor: Arc<Executor>,
    id: u64,
) -> std::result::Result<(), CodecError> {
    let mut client = ClientState::new();

    while let Some(frame) = framed.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(e @ (CodecError::LineTooLong(_) | CodecError::InvalidUtf8)) => {
                framed.send(Response::closing(format!("ERROR: {}", e))).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        debug!(conn = id, request = %line, "request");

        // Engine calls are synchronous and may block on file I/O.
        let executor = Arc::clone(&executor);
        let (state, response) = tokio::task::spawn_blocking(move || {
            let response = executor.execute_line(&mut client, &line);
            (client, response)
        })
        .await
        .map_err(|e| CodecError::Io(std::io::Error::other(e)))?;
        client = state;

        let close = response.is_closing();
        framed.send(response).await?;
        if close {
            break;
        }
    }
    Ok(())
}

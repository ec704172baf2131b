//! Query listener
//!
//! Any number of clients may stay connected. Each connection gets a reader
//! task that forwards request frames to a single serving loop, which answers
//! them one at a time in arrival order: a request is fully answered before
//! the next one is processed. A request that fails gets an error reply; the
//! loop keeps serving.

use crate::codec::{self, read_frame, write_frame};
use crate::protocol::{FdwProcessor, Row};
use async_trait::async_trait;
use gravity_common::errors::{GravityError, Result};
use gravity_common::metrics;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:10234";

/// Requests waiting for the serving loop
const REQUEST_QUEUE: usize = 64;

/// Pause after a failed accept (fd exhaustion and the like)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// One request frame and the slot its reply goes to
struct PendingRequest {
    body: Vec<u8>,
    reply: oneshot::Sender<Vec<u8>>,
}

/// Source of incoming connections
#[async_trait]
pub trait Acceptor: Send {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)>;

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        TcpListener::local_addr(self).ok()
    }
}

/// Sequential request/response listener
pub struct QueryListener {
    processor: FdwProcessor,
    max_messages: Option<u64>,
    received: u64,
}

impl QueryListener {
    pub fn new(processor: FdwProcessor, max_messages: Option<u64>) -> Self {
        Self {
            processor,
            max_messages,
            received: 0,
        }
    }

    /// Bind `addr` and serve until shutdown or the message bound is hit
    pub async fn run(self, addr: &str, shutdown: watch::Receiver<bool>) -> Result<u64> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener`; returns the number of messages
    /// handled. Accept failures are logged and retried after a short pause.
    pub async fn serve<A: Acceptor>(mut self, mut listener: A, mut shutdown: watch::Receiver<bool>) -> Result<u64> {
        info!(addr = ?listener.local_addr(), max_messages = ?self.max_messages, "Query listener started");

        let (request_tx, mut request_rx) = mpsc::channel::<PendingRequest>(REQUEST_QUEUE);
        let (closing_tx, closing_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        while !self.exhausted() {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "Query connection accepted");
                        connections.spawn(read_requests(stream, peer, request_tx.clone(), closing_rx.clone()));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to accept query connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(pending) = request_rx.recv() => {
                    self.received += 1;
                    match self.respond(pending.body).await {
                        Ok(reply) => {
                            if pending.reply.send(reply).is_err() {
                                debug!("Query client left before its reply");
                            }
                        }
                        Err(e) => error!(error = %e, "Failed to encode query reply"),
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        // Replies already handed out are still written; idle readers stop
        let _ = closing_tx.send(true);
        drop(request_rx);
        while connections.join_next().await.is_some() {}

        info!(received = self.received, "Query listener stopped");
        Ok(self.received)
    }

    fn exhausted(&self) -> bool {
        self.max_messages.is_some_and(|max| self.received >= max)
    }

    /// Encoded reply for one request body
    async fn respond(&self, body: Vec<u8>) -> Result<Vec<u8>> {
        let start = Instant::now();
        let processor = self.processor.clone();

        let outcome: Result<Vec<Row>> = tokio::task::spawn_blocking(move || {
            let request = codec::decode_request(&body)?;
            processor.handle(request)
        })
        .await
        .unwrap_or_else(|e| {
            Err(GravityError::Internal {
                message: format!("Query task failed: {}", e),
            })
        });

        let elapsed = start.elapsed().as_secs_f64();
        match outcome {
            Ok(rows) => {
                metrics::record_fdw_request(elapsed, rows.len(), true);
                debug!(rows = rows.len(), "Query answered");
                codec::encode_rows(&rows)
            }
            Err(e) => {
                metrics::record_fdw_request(elapsed, 0, false);
                warn!(error = %e, code = e.code().as_code(), "Query failed");
                codec::encode_error(&e.to_string())
            }
        }
    }
}

/// Forward request frames from one connection and write back their replies
async fn read_requests(
    mut stream: TcpStream,
    peer: SocketAddr,
    requests: mpsc::Sender<PendingRequest>,
    mut closing: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            frame = read_frame(&mut stream) => frame,
            _ = closing.changed() => return,
        };
        let body = match frame {
            Ok(Some(body)) => body,
            Ok(None) => {
                debug!(peer = %peer, "Query connection closed");
                return;
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Query connection failed");
                return;
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if requests.send(PendingRequest { body, reply: reply_tx }).await.is_err() {
            return;
        }
        let Ok(reply) = reply_rx.await else {
            return;
        };
        if let Err(e) = write_frame(&mut stream, &reply).await {
            warn!(peer = %peer, error = %e, "Failed to write query reply");
            return;
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP job intake.
//
// Upstream systems open a plain TCP connection and write job documents
// without any framing.  Every read longer than the configured minimum becomes
// one job message; shorter reads (keep-alive probes, stray newlines) are
// ignored.  A connection ends on EOF, read error or an idle read timeout,
// after which the socket is held for a short grace period before closing.
//
// Nothing is ever written back to the client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use etikett_core::config::GatewayConfig;
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{RawJobMessage, ServerStatus, Transport};

use crate::queue::JobSender;

/// Size of one read from an intake connection.
const READ_BUFFER_BYTES: usize = 4096;

/// Per-connection intake settings.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub read_timeout: Duration,
    pub close_grace: Duration,
    pub min_job_bytes: usize,
}

impl From<&GatewayConfig> for StreamSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            close_grace: config.close_grace(),
            min_job_bytes: config.min_job_bytes,
        }
    }
}

/// Accepts raw TCP job connections and feeds the job queue.
pub struct StreamListener {
    bind_addr: SocketAddr,
    local_addr: Option<SocketAddr>,
    settings: StreamSettings,
    status: ServerStatus,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
}

impl StreamListener {
    /// Create a stopped listener for `bind_addr`.
    pub fn new(bind_addr: SocketAddr, settings: StreamSettings) -> Self {
        Self {
            bind_addr,
            local_addr: None,
            settings,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Address actually bound, once running. Differs from the requested one
    /// when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind and start accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`EtikettError::Listener`] if the address cannot be bound.
    pub async fn start(&mut self, jobs: JobSender) -> Result<()> {
        if self.status == ServerStatus::Running {
            debug!(addr = %self.bind_addr, "stream listener already running");
            return Ok(());
        }

        self.status = ServerStatus::Starting;

        let listener = match TcpListener::bind(self.bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Error;
                return Err(EtikettError::Listener(format!("bind {}: {e}", self.bind_addr)));
            }
        };
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!(addr = %local_addr, "stream listener accepting jobs");

        let shutdown = Arc::clone(&self.shutdown_signal);
        let connections = Arc::clone(&self.active_connections);
        let settings = self.settings;

        let handle = tokio::spawn(async move {
            accept_loop(listener, shutdown, settings, jobs, connections).await;
        });

        self.task_handle = Some(handle);
        self.status = ServerStatus::Running;
        Ok(())
    }

    /// Stop accepting connections. Open connections run to completion.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(
            addr = ?self.local_addr,
            open_connections = self.active_connections.load(Ordering::Relaxed),
            "stopping stream listener"
        );
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| EtikettError::Listener(format!("task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        info!("stream listener stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    shutdown: Arc<Notify>,
    settings: StreamSettings,
    jobs: JobSender,
    connections: Arc<AtomicU32>,
) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                debug!("accept loop received shutdown signal");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "incoming stream connection");
                        let jobs = jobs.clone();
                        let connections = Arc::clone(&connections);
                        tokio::spawn(async move {
                            connections.fetch_add(1, Ordering::Relaxed);
                            handle_connection(stream, peer, settings, jobs).await;
                            connections.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
        }
    }
}

/// Read job messages from one connection until it goes quiet.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    settings: StreamSettings,
    jobs: JobSender,
) {
    let mut buf = vec![0u8; READ_BUFFER_BYTES];

    loop {
        let n = match tokio::time::timeout(settings.read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                debug!(peer = %peer, "client closed connection");
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!(peer = %peer, error = %e, "read failed");
                break;
            }
            Err(_) => {
                debug!(peer = %peer, "connection idle, closing");
                break;
            }
        };

        if n <= settings.min_job_bytes {
            debug!(peer = %peer, bytes = n, "short read ignored");
            continue;
        }

        let payload = String::from_utf8_lossy(&buf[..n]).into_owned();
        let message = RawJobMessage::new(payload, peer, Transport::Stream);
        info!(peer = %peer, job_id = %message.id, bytes = n, "job received");

        if let Err(e) = jobs.enqueue(message).await {
            error!(peer = %peer, error = %e, "job dropped");
            break;
        }
    }

    tokio::time::sleep(settings.close_grace).await;
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory printer link for unit tests.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::link::DeviceLink;

/// Everything one connection wrote before it was closed.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub addr: SocketAddr,
    pub payload: String,
}

#[derive(Debug, Default)]
struct LinkState {
    connects: AtomicU32,
    streams: AtomicU32,
    deliveries: Mutex<Vec<Delivery>>,
}

/// Records every connection and what was written to it.
///
/// The first `fail_connects` connects are refused; the first `fail_writes`
/// opened streams reject writes.
#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    state: Arc<LinkState>,
    fail_connects: u32,
    fail_writes: u32,
    reply: Vec<u8>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_connects(mut self, count: u32) -> Self {
        self.fail_connects = count;
        self
    }

    pub fn failing_writes(mut self, count: u32) -> Self {
        self.fail_writes = count;
        self
    }

    /// Bytes every stream yields when read.
    pub fn replying(mut self, reply: &str) -> Self {
        self.reply = reply.as_bytes().to_vec();
        self
    }

    /// Connect calls so far, failed ones included.
    pub fn connect_attempts(&self) -> u32 {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Completed deliveries in close order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.state
            .deliveries
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeviceLink for RecordingLink {
    type Stream = RecordingStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<RecordingStream> {
        let attempt = self.state.connects.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_connects {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "printer offline"));
        }
        let stream_no = self.state.streams.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingStream {
            addr,
            broken: stream_no < self.fail_writes,
            written: Vec::new(),
            reply: self.reply.clone(),
            reply_pos: 0,
            state: Arc::clone(&self.state),
        })
    }
}

/// Stream half handed to the dispatcher. Records its bytes when dropped.
#[derive(Debug)]
pub struct RecordingStream {
    addr: SocketAddr,
    broken: bool,
    written: Vec<u8>,
    reply: Vec<u8>,
    reply_pos: usize,
    state: Arc<LinkState>,
}

impl AsyncWrite for RecordingStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.broken {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "printer reset")));
        }
        self.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncRead for RecordingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let start = self.reply_pos;
        let n = buf.remaining().min(self.reply.len() - start);
        buf.put_slice(&self.reply[start..start + n]);
        self.reply_pos += n;
        Poll::Ready(Ok(()))
    }
}

impl Drop for RecordingStream {
    fn drop(&mut self) {
        if self.written.is_empty() {
            return;
        }
        if let Ok(mut deliveries) = self.state.deliveries.lock() {
            deliveries.push(Delivery {
                addr: self.addr,
                payload: String::from_utf8_lossy(&self.written).into_owned(),
            });
        }
    }
}

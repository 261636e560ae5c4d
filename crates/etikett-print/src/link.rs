// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP link to label printers (JetDirect style, ports 9100 / 6101).
//
// The printer protocol is as simple as it gets: open a TCP socket, write the
// command text, close.  There is no acknowledgement.  One connection is
// opened per send; nothing is pooled.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Terminator appended to every command written to a printer.
pub const COMMAND_TERMINATOR: &str = "\r\n\r\n";

/// Opens byte streams to printers.
///
/// Production code uses [`TcpLink`]; tests substitute in-memory streams.
#[async_trait]
pub trait DeviceLink: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, addr: SocketAddr) -> std::io::Result<Self::Stream>;
}

/// Plain TCP connections with a bounded connect time.
#[derive(Debug, Clone, Copy)]
pub struct TcpLink {
    pub connect_timeout: Duration,
}

impl Default for TcpLink {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl DeviceLink for TcpLink {
    type Stream = TcpStream;

    async fn connect(&self, addr: SocketAddr) -> std::io::Result<TcpStream> {
        debug!(addr = %addr, "connecting to printer");
        tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!(
                        "connect to {addr} timed out after {}ms",
                        self.connect_timeout.as_millis()
                    ),
                )
            })?
    }
}

/// Write one command and close the write side cleanly.
pub async fn write_command<S>(stream: &mut S, command: &str) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(command.as_bytes()).await?;
    stream.write_all(COMMAND_TERMINATOR.as_bytes()).await?;
    stream.flush().await?;
    debug!(bytes = command.len() + COMMAND_TERMINATOR.len(), "command written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_link_delivers_terminated_command() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = String::new();
            socket.read_to_string(&mut received).await.expect("read");
            received
        });

        let mut stream = TcpLink::default().connect(addr).await.expect("connect");
        write_command(&mut stream, "^XA^XZ").await.expect("write");
        stream.shutdown().await.expect("shutdown");
        drop(stream);

        assert_eq!(server.await.expect("join"), "^XA^XZ\r\n\r\n");
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        assert!(TcpLink::default().connect(addr).await.is_err());
    }
}

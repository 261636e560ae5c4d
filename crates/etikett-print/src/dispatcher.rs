// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device dispatcher -- delivers rendered labels and raw commands to printers.
//
// Three verbs:
//
//   - send_label   rewrites `.zpl` references for the hardware family, then sends
//   - send_raw     sends a command unchanged (feed, calibrate, ...)
//   - query_status writes `~HS` to the status port and reads one line back
//
// Each call opens its own connection and closes it on every exit path.
// Connect and write failures are retried per the `RetryPolicy`.  Calls are
// not coordinated with each other: two dispatches to the same printer may
// interleave.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, instrument, warn};

use etikett_core::config::DispatchConfig;
use etikett_core::error::{EtikettError, Result};
use etikett_core::registry::DeviceRegistry;
use etikett_core::types::{DeviceRecord, HardwareFamily};

use crate::link::{DeviceLink, TcpLink, write_command};
use crate::retry::{RetryPolicy, run_with_retry};

/// Advances the label by one blank label.
pub const FEED_COMMAND: &str = "^xa^aa^fd ^fs^xz";

/// Measures media length and resets the label position.
pub const CALIBRATE_COMMAND: &str = "~jc^xa^jus^xz";

/// Host status query.
pub const STATUS_QUERY: &str = "~HS";

/// Template file extension rewritten per hardware family.
const TEMPLATE_MARKER: &str = ".zpl";

/// Maintenance commands exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceCommand {
    Feed,
    Calibrate,
}

impl MaintenanceCommand {
    /// Parse the command segment of `/send/{command}/{printer}`.
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "feed" => Some(Self::Feed),
            "calibrate" => Some(Self::Calibrate),
            _ => None,
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Self::Feed => FEED_COMMAND,
            Self::Calibrate => CALIBRATE_COMMAND,
        }
    }
}

/// Sends command text to printers over a [`DeviceLink`].
#[derive(Debug)]
pub struct Dispatcher<L: DeviceLink = TcpLink> {
    link: L,
    config: DispatchConfig,
    policy: RetryPolicy,
}

impl Dispatcher<TcpLink> {
    /// Dispatcher over real TCP connections.
    pub fn tcp(config: DispatchConfig) -> Self {
        let link = TcpLink {
            connect_timeout: config.connect_timeout(),
        };
        Self::new(link, config)
    }
}

impl<L: DeviceLink> Dispatcher<L> {
    pub fn new(link: L, config: DispatchConfig) -> Self {
        let policy = RetryPolicy::from(&config);
        Self {
            link,
            config,
            policy,
        }
    }

    /// Device port for a hardware family.
    pub fn device_port(&self, family: HardwareFamily) -> u16 {
        match family {
            HardwareFamily::Mobile => self.config.mobile_port,
            HardwareFamily::Stationary => self.config.stationary_port,
        }
    }

    /// Send a rendered label.
    ///
    /// `.zpl` references inside the label (stored graphics and formats) are
    /// rewritten to the resolution variant of the printer's family first.
    #[instrument(skip(self, device, label), fields(ip = %device.ip, family = ?device.family))]
    pub async fn send_label(&self, device: &DeviceRecord, label: &str) -> Result<()> {
        let label = label.replace(TEMPLATE_MARKER, device.family.template_extension());
        self.send(device, &label).await
    }

    /// Send a command unchanged.
    #[instrument(skip(self, device), fields(ip = %device.ip))]
    pub async fn send_raw(&self, device: &DeviceRecord, command: &str) -> Result<()> {
        self.send(device, command).await
    }

    /// Look up `printer` and send a maintenance command to it.
    pub async fn send_maintenance(
        &self,
        registry: &DeviceRegistry,
        printer: &str,
        command: MaintenanceCommand,
    ) -> Result<()> {
        let device = registry
            .get(printer)
            .ok_or_else(|| EtikettError::UnknownPrinter(printer.to_string()))?;
        info!(printer, ?command, "sending maintenance command");
        self.send_raw(device, command.command()).await
    }

    /// Ask a printer for its host status line.
    ///
    /// Returns an empty string when the printer is unreachable or does not
    /// answer; status probing never fails loudly.
    #[instrument(skip(self))]
    pub async fn query_status(&self, ip: IpAddr) -> String {
        let addr = SocketAddr::new(ip, self.config.status_port);
        let target = addr.to_string();

        let connected = run_with_retry(&self.policy, &target, |attempt| async move {
            debug!(addr = %addr, attempt, "status query attempt");
            let mut stream = self.link.connect(addr).await?;
            write_command(&mut stream, STATUS_QUERY).await?;
            Ok::<_, std::io::Error>(stream)
        })
        .await;

        let stream = match connected {
            Ok((stream, _)) => stream,
            Err(_) => return String::new(),
        };

        read_status_line(stream, self.config.status_timeout()).await
    }

    /// Connect, write, close -- with retries.
    async fn send(&self, device: &DeviceRecord, payload: &str) -> Result<()> {
        let addr = SocketAddr::new(device.ip, self.device_port(device.family));
        let target = addr.to_string();

        let outcome = run_with_retry(&self.policy, &target, |attempt| async move {
            debug!(addr = %addr, attempt, bytes = payload.len(), "dispatch attempt");
            let mut stream = self.link.connect(addr).await?;
            write_command(&mut stream, payload).await?;
            stream.shutdown().await?;
            Ok::<_, std::io::Error>(())
        })
        .await;

        match outcome {
            Ok(((), attempts)) => {
                info!(addr = %addr, attempts, "payload delivered");
                Ok(())
            }
            Err(exhausted) => {
                warn!(addr = %addr, attempts = exhausted.attempts, "giving up on device");
                Err(EtikettError::Dispatch {
                    addr: target,
                    attempts: exhausted.attempts,
                    reason: exhausted.last_error.to_string(),
                })
            }
        }
    }
}

/// Read one newline-terminated line; empty on timeout, EOF or error.
async fn read_status_line<S>(stream: S, timeout: Duration) -> String
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    match tokio::time::timeout(timeout, reader.read_line(&mut line)).await {
        Ok(Ok(n)) if n > 0 && line.ends_with('\n') => line,
        Ok(Ok(_)) => String::new(),
        Ok(Err(e)) => {
            warn!(error = %e, "status read failed");
            String::new()
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "status read timed out");
            String::new()
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EtikettError, Result};

/// Top-level gateway settings. Durations are stored in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Port of the raw TCP job listener.
    pub stream_port: u16,
    /// Port of the HTTP listener (job intake, management, event streams).
    pub http_port: u16,
    /// Pending job messages before intake blocks.
    pub queue_capacity: usize,
    /// Idle read timeout on raw TCP intake connections.
    pub read_timeout_ms: u64,
    /// Delay between end of a raw TCP session and closing the socket.
    pub close_grace_ms: u64,
    /// Reads of this many bytes or fewer are not treated as jobs.
    pub min_job_bytes: usize,
    /// Device registry file (JSON).
    pub printer_file: PathBuf,
    /// Directory holding `*.zpl` label templates.
    pub labels_dir: PathBuf,
    /// Directory holding `index.html`.
    pub home_dir: PathBuf,
    pub dispatch: DispatchConfig,
    pub events: EventConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            stream_port: 30000,
            http_port: 56425,
            queue_capacity: 64,
            read_timeout_ms: 32_000,
            close_grace_ms: 150,
            min_job_bytes: 20,
            printer_file: PathBuf::from("printers.json"),
            labels_dir: PathBuf::from("labels"),
            home_dir: PathBuf::from("."),
            dispatch: DispatchConfig::default(),
            events: EventConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load settings from a JSON file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(EtikettError::Config("queue_capacity must be at least 1".into()));
        }
        if self.events.subscriber_buffer == 0 {
            return Err(EtikettError::Config(
                "events.subscriber_buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Printer connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Device port of mobile printers.
    pub mobile_port: u16,
    /// Device port of stationary printers.
    pub stationary_port: u16,
    /// Port answering `~HS` host status queries.
    pub status_port: u16,
    /// Retries after the first attempt.
    pub retries: u32,
    /// Fixed pause between attempts.
    pub backoff_ms: u64,
    pub connect_timeout_ms: u64,
    /// Upper bound for reading a status line.
    pub status_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mobile_port: 6101,
            stationary_port: 9100,
            status_port: 9100,
            retries: 3,
            backoff_ms: 510,
            connect_timeout_ms: 10_000,
            status_timeout_ms: 5_000,
        }
    }
}

impl DispatchConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }
}

/// Event stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Idle time before a heartbeat record is written.
    pub heartbeat_ms: u64,
    /// Heartbeats after which a stream ends.
    pub max_cycles: u32,
    /// Capacity of each subscriber's delivery channel.
    pub subscriber_buffer: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: 60_000,
            max_cycles: 1440,
            subscriber_buffer: 16,
        }
    }
}

impl EventConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_wire_constants() {
        let config = GatewayConfig::default();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.read_timeout(), Duration::from_secs(32));
        assert_eq!(config.dispatch.mobile_port, 6101);
        assert_eq!(config.dispatch.stationary_port, 9100);
        assert_eq!(config.dispatch.retries, 3);
        assert_eq!(config.events.max_cycles, 1440);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"http_port": 8080, "dispatch": {{"retries": 5}}}}"#).expect("write");

        let config = GatewayConfig::load(file.path()).expect("load");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.stream_port, 30000);
        assert_eq!(config.dispatch.retries, 5);
        assert_eq!(config.dispatch.backoff_ms, 510);
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config = GatewayConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

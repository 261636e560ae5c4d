// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Etikett label gateway.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an ingested job message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which intake transport a job message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    /// Raw TCP socket, one message per read burst.
    Stream,
    /// HTTP `POST /`.
    Http,
}

/// One unit of ingested payload, as handed from a listener to the processor.
#[derive(Debug, Clone)]
pub struct RawJobMessage {
    pub id: JobId,
    pub payload: String,
    pub source: SocketAddr,
    pub transport: Transport,
    pub received_at: DateTime<Utc>,
}

impl RawJobMessage {
    pub fn new(payload: String, source: SocketAddr, transport: Transport) -> Self {
        Self {
            id: JobId::new(),
            payload,
            source,
            transport,
            received_at: Utc::now(),
        }
    }
}

/// A single label request parsed out of one document fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLabelRequest {
    pub target_printer: String,
    pub label_kind: String,
    /// Always at least 1 once parsed; "0", empty and garbage counts collapse to 1.
    pub copy_count: u32,
    /// Optional weight reported alongside the status event.
    pub weight: Option<String>,
    pub fields: HashMap<String, String>,
}

impl ParsedLabelRequest {
    /// Both printer and label must be named for the request to be printable.
    pub fn is_actionable(&self) -> bool {
        !self.target_printer.is_empty() && !self.label_kind.is_empty()
    }
}

/// Hardware families. Each one has its own device port and template variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareFamily {
    /// Handheld printers (`DRU…`), 200 dpi, listening on 6101.
    Mobile,
    /// Desk and industrial printers, 300 dpi, listening on 9100.
    Stationary,
}

impl HardwareFamily {
    /// Prefix identifying mobile printers once digits and spaces are stripped.
    pub const MOBILE_PREFIX: &'static str = "DRU";

    /// Derive the family from a logical printer name.
    ///
    /// The name is reduced to its non-numeric token by dropping every ASCII
    /// digit and space, so `"DRU 12"` and `"DRU7"` are both mobile.
    pub fn from_printer_name(name: &str) -> Self {
        let token: String = name
            .chars()
            .filter(|c| !c.is_ascii_digit() && *c != ' ')
            .collect();
        if token == Self::MOBILE_PREFIX {
            Self::Mobile
        } else {
            Self::Stationary
        }
    }

    /// File extension that `.zpl` references inside a template are rewritten to.
    pub fn template_extension(&self) -> &'static str {
        match self {
            Self::Mobile => ".200zpl",
            Self::Stationary => ".300zpl",
        }
    }
}

/// A physical printer in the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub ip: IpAddr,
    pub family: HardwareFamily,
    pub peel_off: bool,
}

/// Human-readable status event broadcast to dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub category: String,
    pub destination_printer: String,
    pub destination_ip: String,
    pub label_kind: String,
    pub weight: Option<String>,
}

impl StatusEvent {
    /// Category tag used for label dispatch decisions.
    pub const CATEGORY_LABEL: &'static str = "label";

    /// Marker placed in `destination_ip` when the printer is not registered.
    pub const UNKNOWN_IP: &'static str = "unknown";

    /// Event for a label whose printer was found in the registry.
    pub fn label_for(request: &ParsedLabelRequest, device: &DeviceRecord) -> Self {
        let ip = device.ip.to_string();
        Self {
            timestamp: Local::now(),
            message: format!(
                "Label for {} ({}) in format {}",
                request.target_printer, ip, request.label_kind
            ),
            category: Self::CATEGORY_LABEL.into(),
            destination_printer: request.target_printer.clone(),
            destination_ip: ip,
            label_kind: request.label_kind.clone(),
            weight: request.weight.clone(),
        }
    }

    /// Event for a label addressed to a printer missing from the registry.
    pub fn label_for_unknown(request: &ParsedLabelRequest) -> Self {
        Self {
            timestamp: Local::now(),
            message: format!(
                "Label for {} (IP UNKNOWN {}) in format {}",
                request.target_printer, request.target_printer, request.label_kind
            ),
            category: Self::CATEGORY_LABEL.into(),
            destination_printer: request.target_printer.clone(),
            destination_ip: Self::UNKNOWN_IP.into(),
            label_kind: request.label_kind.clone(),
            weight: request.weight.clone(),
        }
    }
}

/// Status of a network listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}

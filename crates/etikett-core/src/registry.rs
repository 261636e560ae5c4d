// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device registry and label template table.
//
// Both tables are immutable snapshots.  A reload builds a complete new table
// and swaps it into the `RegistryStore` in one step, so a reader holding a
// snapshot never sees a half-loaded table.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{EtikettError, Result};
use crate::types::{DeviceRecord, HardwareFamily};

/// File extension of label templates.
pub const TEMPLATE_EXTENSION: &str = "zpl";

/// Printer name → device record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceRecord>,
}

/// On-disk entry of the printer file.
#[derive(Debug, Deserialize)]
struct DeviceEntry {
    ip: IpAddr,
    #[serde(default)]
    peel: bool,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a printer. The hardware family is derived from its name.
    pub fn insert(&mut self, name: impl Into<String>, ip: IpAddr, peel_off: bool) {
        let name = name.into();
        let family = HardwareFamily::from_printer_name(&name);
        self.devices.insert(name, DeviceRecord { ip, family, peel_off });
    }

    pub fn get(&self, name: &str) -> Option<&DeviceRecord> {
        self.devices.get(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Parse a JSON printer table: `{"NAME": {"ip": "10.0.0.5", "peel": true}}`.
    pub fn from_json(data: &str) -> Result<Self> {
        let entries: BTreeMap<String, DeviceEntry> = serde_json::from_str(data)?;
        let mut registry = Self::new();
        for (name, entry) in entries {
            registry.insert(name, entry.ip, entry.peel);
        }
        Ok(registry)
    }

    /// Load the printer table from a JSON file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| EtikettError::RegistryLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let registry = Self::from_json(&data).map_err(|e| EtikettError::RegistryLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!(printers = registry.len(), "device registry loaded");
        Ok(registry)
    }
}

/// Label name → command template.
///
/// Names are normalized on insert and on lookup, so `"Ship-Label"`,
/// `"ship_label"` and `"SHIP LABEL"` all select the same template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateTable {
    templates: HashMap<String, String>,
}

impl TemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, template: impl Into<String>) {
        self.templates.insert(normalize_label_name(label), template.into());
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.templates
            .get(&normalize_label_name(label))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Normalized label names in sorted order.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Load every `*.zpl` file in `dir`. Files are read as ISO-8859-1.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let load_err = |e: std::io::Error| EtikettError::RegistryLoad {
            path: dir.display().to_string(),
            reason: e.to_string(),
        };

        let mut table = Self::new();
        for entry in std::fs::read_dir(dir).map_err(load_err)? {
            let path = entry.map_err(load_err)?.path();
            let is_template = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(TEMPLATE_EXTENSION));
            if !is_template {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %path.display(), "skipping template with non UTF-8 name");
                continue;
            };
            let bytes = std::fs::read(&path).map_err(load_err)?;
            debug!(label = stem, bytes = bytes.len(), "template loaded");
            table.insert(stem, latin1_to_string(&bytes));
        }

        info!(labels = table.len(), "template table loaded");
        Ok(table)
    }
}

/// Lower-case and drop spaces, underscores and dashes.
pub fn normalize_label_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Decode ISO-8859-1 bytes; every byte maps to the code point of equal value.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Shared, atomically swappable registry snapshots.
#[derive(Debug)]
pub struct RegistryStore {
    devices: ArcSwap<DeviceRegistry>,
    templates: ArcSwap<TemplateTable>,
}

impl RegistryStore {
    pub fn new(devices: DeviceRegistry, templates: TemplateTable) -> Self {
        Self {
            devices: ArcSwap::from_pointee(devices),
            templates: ArcSwap::from_pointee(templates),
        }
    }

    /// Current device registry snapshot.
    pub fn devices(&self) -> Arc<DeviceRegistry> {
        self.devices.load_full()
    }

    /// Current template table snapshot.
    pub fn templates(&self) -> Arc<TemplateTable> {
        self.templates.load_full()
    }

    /// Swap in a new device registry.
    pub fn replace_devices(&self, devices: DeviceRegistry) {
        self.devices.store(Arc::new(devices));
    }

    /// Swap in a new template table.
    pub fn replace_templates(&self, templates: TemplateTable) {
        self.templates.store(Arc::new(templates));
    }

    /// Reload the device registry. On failure the previous snapshot stays.
    pub fn reload_devices(&self, path: impl AsRef<Path>) -> Result<Arc<DeviceRegistry>> {
        self.replace_devices(DeviceRegistry::load(path)?);
        Ok(self.devices())
    }

    /// Reload the template table. On failure the previous snapshot stays.
    pub fn reload_templates(&self, dir: impl AsRef<Path>) -> Result<Arc<TemplateTable>> {
        self.replace_templates(TemplateTable::load_dir(dir)?);
        Ok(self.templates())
    }
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new(DeviceRegistry::new(), TemplateTable::new())
    }
}

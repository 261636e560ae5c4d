// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Etikett — Core types, errors, configuration and registries shared across
// all crates.

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::GatewayConfig;
pub use error::EtikettError;
pub use registry::{DeviceRegistry, RegistryStore, TemplateTable};
pub use types::*;

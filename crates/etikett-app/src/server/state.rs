// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared state for the HTTP handlers.

use std::sync::Arc;

use etikett_core::config::GatewayConfig;
use etikett_core::registry::RegistryStore;
use etikett_print::{Dispatcher, EventHub, JobSender};

/// Application state shared across handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub registry: Arc<RegistryStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub hub: EventHub,
    /// HTTP intake side of the job queue.
    pub jobs: JobSender,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        registry: Arc<RegistryStore>,
        dispatcher: Arc<Dispatcher>,
        hub: EventHub,
        jobs: JobSender,
    ) -> Self {
        Self {
            config,
            registry,
            dispatcher,
            hub,
            jobs,
        }
    }
}

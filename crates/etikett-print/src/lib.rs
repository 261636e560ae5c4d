// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Etikett Print — raw TCP job intake, bounded job queue, XML job parsing, ZPL
// rendering, printer dispatch and the status event hub.  This crate bridges
// between the core domain types defined in `etikett-core` and the printers on
// the network.

pub mod dispatcher;
pub mod document;
pub mod hub;
pub mod link;
pub mod listener;
pub mod processor;
pub mod queue;
pub mod render;
pub mod retry;

#[cfg(test)]
mod testing;

pub use dispatcher::{Dispatcher, MaintenanceCommand};
pub use hub::{EventHub, Subscription};
pub use link::{DeviceLink, TcpLink};
pub use listener::{StreamListener, StreamSettings};
pub use processor::JobProcessor;
pub use queue::{JobQueue, JobReceiver, JobSender};
pub use retry::RetryPolicy;

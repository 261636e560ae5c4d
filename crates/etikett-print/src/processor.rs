// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job processor -- turns queued job messages into printer dispatches and
// status events.
//
// A single loop drains the job queue in arrival order and hands every
// message to its own task, so one slow or malformed payload never holds up
// the next.  Per document fragment:
//
//   1. parse; fragments without printer or label are dropped silently
//   2. look up the printer; unknown printers get an "IP unknown" event only
//   3. look up the template; without one the event is still published
//   4. render once, spawn one dispatch task per copy
//
// Nothing is reported back to the submitting client.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use etikett_core::registry::RegistryStore;
use etikett_core::types::{ParsedLabelRequest, RawJobMessage, StatusEvent};

use crate::dispatcher::Dispatcher;
use crate::document::parse_payload;
use crate::hub::EventHub;
use crate::link::{DeviceLink, TcpLink};
use crate::queue::JobReceiver;
use crate::render::render_label;

/// Consumes the job queue. Cheap to share behind an `Arc`.
pub struct JobProcessor<L: DeviceLink = TcpLink> {
    registry: Arc<RegistryStore>,
    dispatcher: Arc<Dispatcher<L>>,
    hub: EventHub,
}

impl<L: DeviceLink> JobProcessor<L> {
    pub fn new(registry: Arc<RegistryStore>, dispatcher: Arc<Dispatcher<L>>, hub: EventHub) -> Self {
        Self {
            registry,
            dispatcher,
            hub,
        }
    }

    /// Drain the queue until every sender is gone.
    pub async fn run(self: Arc<Self>, mut jobs: JobReceiver) {
        info!("job processor started");
        while let Some(message) = jobs.next().await {
            let processor = Arc::clone(&self);
            tokio::spawn(async move {
                processor.process_message(message);
            });
        }
        info!("job queue closed, job processor stopped");
    }

    /// Process every fragment of one message.
    ///
    /// Returns the handles of the dispatch tasks that were spawned; callers
    /// other than tests usually let them run detached.
    #[instrument(skip_all, fields(job_id = %message.id, source = %message.source, transport = ?message.transport))]
    pub fn process_message(&self, message: RawJobMessage) -> Vec<JoinHandle<()>> {
        let requests = parse_payload(&message.payload);
        debug!(fragments = requests.len(), "payload parsed");
        requests
            .iter()
            .flat_map(|request| self.process_request(request))
            .collect()
    }

    /// Resolve, render and dispatch one parsed request.
    pub fn process_request(&self, request: &ParsedLabelRequest) -> Vec<JoinHandle<()>> {
        let devices = self.registry.devices();
        let Some(device) = devices.get(&request.target_printer) else {
            warn!(printer = %request.target_printer, "printer not found in device registry");
            self.hub.publish(StatusEvent::label_for_unknown(request));
            return Vec::new();
        };

        let templates = self.registry.templates();
        let handles = match templates.get(&request.label_kind) {
            Some(template) => {
                let label: Arc<str> = render_label(template, request, device.peel_off).into();
                let copies = request.copy_count.max(1);
                info!(
                    printer = %request.target_printer,
                    label = %request.label_kind,
                    copies,
                    "sending label"
                );
                debug!(payload = %label, "rendered label");

                (0..copies)
                    .map(|copy| {
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let device = device.clone();
                        let label = Arc::clone(&label);
                        let printer = request.target_printer.clone();
                        tokio::spawn(async move {
                            if let Err(e) = dispatcher.send_label(&device, &label).await {
                                warn!(printer = %printer, copy, error = %e, "label not delivered");
                            }
                        })
                    })
                    .collect()
            }
            None => {
                info!(
                    printer = %request.target_printer,
                    label = %request.label_kind,
                    "no template for label kind, not printing"
                );
                Vec::new()
            }
        };

        self.hub.publish(StatusEvent::label_for(request, device));
        handles
    }
}

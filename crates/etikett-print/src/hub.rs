// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Status event hub -- single-owner publish/subscribe broadcaster.
//
// One task owns the subscriber set and serializes subscribe, unsubscribe and
// publish through one command channel, so the set needs no lock.  Publishing
// walks the subscribers registered at that moment and awaits each delivery
// channel in turn; a subscriber that stops draining its channel stalls the
// hub, so stream handlers must keep reading.
//
// Publishers never wait on the hub: the command channel is unbounded and
// `publish` only enqueues.  While a stalled subscriber blocks the hub, every
// publish in the meantime stays queued in that channel, so its memory grows
// until the subscriber drains or is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use etikett_core::types::StatusEvent;

/// Identifies one subscriber inside the hub.
pub type SubscriberId = u64;

/// Default capacity of each subscriber's delivery channel.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

enum HubCommand {
    Subscribe {
        id: SubscriberId,
        sink: mpsc::Sender<StatusEvent>,
    },
    Unsubscribe(SubscriberId),
    Publish(StatusEvent),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to the hub task.
#[derive(Debug, Clone)]
pub struct EventHub {
    commands: mpsc::UnboundedSender<HubCommand>,
    next_id: Arc<AtomicU64>,
    buffer: usize,
}

impl EventHub {
    /// Spawn the hub task on the current runtime.
    ///
    /// The task ends once every handle and subscription is gone.
    pub fn spawn(buffer: usize) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_hub(rx));
        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber. Events published after this call reach it.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sink, events) = mpsc::channel(self.buffer);
        // A send error means the hub task is gone; the subscription then
        // simply never yields an event.
        let _ = self.commands.send(HubCommand::Subscribe { id, sink });
        Subscription {
            id,
            events,
            commands: self.commands.clone(),
        }
    }

    /// Broadcast an event to every current subscriber.
    pub fn publish(&self, event: StatusEvent) {
        if self.commands.send(HubCommand::Publish(event)).is_err() {
            debug!("event hub stopped, dropping event");
        }
    }

    /// Number of registered subscribers, as seen by the hub task.
    pub async fn subscriber_count(&self) -> usize {
        let (reply, count) = oneshot::channel();
        if self.commands.send(HubCommand::Count(reply)).is_err() {
            return 0;
        }
        count.await.unwrap_or(0)
    }
}

/// One live subscriber. Deregisters itself when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    events: mpsc::Receiver<StatusEvent>,
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the hub has shut down.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(HubCommand::Unsubscribe(self.id));
    }
}

/// The owning control loop.
async fn run_hub(mut commands: mpsc::UnboundedReceiver<HubCommand>) {
    let mut subscribers: HashMap<SubscriberId, mpsc::Sender<StatusEvent>> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Subscribe { id, sink } => {
                subscribers.insert(id, sink);
                info!(subscriber = id, total = subscribers.len(), "added event subscriber");
            }
            HubCommand::Unsubscribe(id) => {
                if subscribers.remove(&id).is_some() {
                    info!(subscriber = id, total = subscribers.len(), "removed event subscriber");
                }
            }
            HubCommand::Publish(event) => {
                let mut gone = Vec::new();
                for (id, sink) in &subscribers {
                    if sink.send(event.clone()).await.is_err() {
                        gone.push(*id);
                    }
                }
                for id in gone {
                    subscribers.remove(&id);
                    debug!(subscriber = id, "pruned closed subscriber");
                }
                debug!(receivers = subscribers.len(), "event published");
            }
            HubCommand::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }

    debug!("event hub stopped");
}

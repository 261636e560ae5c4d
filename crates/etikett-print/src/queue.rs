// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded in-memory job queue between the intake listeners and the processor.
//
// Both listeners hold a `JobSender`; the processor owns the single
// `JobReceiver`.  When the queue is full, `enqueue` suspends the calling
// connection task until the processor drains a message, so bursty clients are
// slowed down instead of losing jobs.

use tokio::sync::mpsc;
use tracing::{debug, instrument};

use etikett_core::error::{EtikettError, Result};
use etikett_core::types::RawJobMessage;

/// Default number of pending messages before intake blocks.
pub const DEFAULT_CAPACITY: usize = 64;

/// Constructor for the sender/receiver pair.
pub struct JobQueue;

impl JobQueue {
    /// Create a queue holding at most `capacity` pending messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn bounded(capacity: usize) -> (JobSender, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (JobSender { tx }, JobReceiver { rx })
    }
}

/// Producer half, cloned into every intake connection.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<RawJobMessage>,
}

impl JobSender {
    /// Push a message, waiting for free capacity if the queue is full.
    #[instrument(skip_all, fields(job_id = %message.id, source = %message.source))]
    pub async fn enqueue(&self, message: RawJobMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| EtikettError::QueueClosed)?;
        debug!(free = self.tx.capacity(), "job message enqueued");
        Ok(())
    }
}

/// Consumer half, owned by the processor loop.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<RawJobMessage>,
}

impl JobReceiver {
    /// Next message in arrival order, or `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<RawJobMessage> {
        self.rx.recv().await
    }
}

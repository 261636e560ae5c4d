// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Status event streams for dashboards.
//
// Each connected observer gets its own hub subscription, relayed as a stream
// of text records.  After a heartbeat interval without events a "No Data"
// record is written; the stream ends after `max_cycles` heartbeats or when the
// hub goes away.  When the client disconnects, hyper drops the response body,
// which drops the subscription and deregisters it from the hub.

use std::time::Duration;

use chrono::{DateTime, Local};
use futures::Stream;
use futures::stream;
use tracing::{debug, warn};

use etikett_core::types::StatusEvent;
use etikett_print::hub::Subscription;

/// Record written after a heartbeat interval without events.
pub const HEARTBEAT_RECORD: &str = r#"{"str": "No Data"}"#;

/// Wire framing of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `text/event-stream`: `data: <record>\n\n`.
    EventStream,
    /// Long polling: the bare record.
    LongPoll,
}

impl Framing {
    pub fn frame(&self, record: &str) -> String {
        match self {
            Self::EventStream => format!("data: {record}\n\n"),
            Self::LongPoll => record.to_string(),
        }
    }
}

/// Wrap an event in the record envelope, stamped with the server time.
pub fn event_record(event: &StatusEvent, now: DateTime<Local>) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(format!(
            r#"{{"str": {json},"time": "{}","x": ""}}"#,
            now.format("%Y-%m-%d %H:%M:%S%.f %z")
        )),
        Err(e) => {
            warn!(error = %e, "status event not serializable, skipped");
            None
        }
    }
}

struct StreamState {
    subscription: Subscription,
    framing: Framing,
    heartbeat: Duration,
    cycles: u32,
    max_cycles: u32,
}

/// Framed records for one subscriber.
pub fn event_stream(
    subscription: Subscription,
    framing: Framing,
    heartbeat: Duration,
    max_cycles: u32,
) -> impl Stream<Item = String> + Send + 'static {
    let state = StreamState {
        subscription,
        framing,
        heartbeat,
        cycles: 0,
        max_cycles,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.cycles >= state.max_cycles {
                debug!(subscriber = state.subscription.id(), "event stream reached its cycle limit");
                return None;
            }

            match tokio::time::timeout(state.heartbeat, state.subscription.recv()).await {
                Ok(Some(event)) => {
                    if let Some(record) = event_record(&event, Local::now()) {
                        let framed = state.framing.frame(&record);
                        return Some((framed, state));
                    }
                }
                Ok(None) => return None,
                Err(_) => {
                    state.cycles += 1;
                    let framed = state.framing.frame(HEARTBEAT_RECORD);
                    return Some((framed, state));
                }
            }
        }
    })
}

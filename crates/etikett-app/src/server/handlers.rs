// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP handlers: job intake, index page, registry reloads, maintenance
// commands, status queries and event streams.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use etikett_core::error::EtikettError;
use etikett_core::types::{RawJobMessage, Transport};
use etikett_print::MaintenanceCommand;
use etikett_print::document::is_job_document;

use super::events::{Framing, event_stream};
use super::state::AppState;

/// Served when `<home>/index.html` cannot be read.
pub const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Etikett</title></head>
<body>
<h1>Etikett label gateway</h1>
<pre id="events"></pre>
<script>
const log = document.getElementById("events");
new EventSource("/events/sse").onmessage = (e) => { log.textContent = e.data + "\n" + log.textContent; };
</script>
</body>
</html>
"#;

/// Handle POST / - job intake, or the index page for anything else.
pub async fn intake(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Response {
    let body = String::from_utf8_lossy(&body);
    if !is_job_document(&body) {
        return index(State(state)).await.into_response();
    }

    let message = RawJobMessage::new(body.trim().to_string(), peer, Transport::Http);
    info!(peer = %peer, job_id = %message.id, bytes = message.payload.len(), "job received");
    if let Err(e) = state.jobs.enqueue(message).await {
        error!(peer = %peer, error = %e, "job dropped");
    }
    StatusCode::OK.into_response()
}

/// Handle GET / - the dashboard page.
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let path = state.config.home_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "index page unavailable, serving fallback");
            Html(FALLBACK_INDEX.to_string())
        }
    }
}

/// Handle GET /reloadPrinter - reload the device registry.
pub async fn reload_printers(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.reload_devices(&state.config.printer_file) {
        Ok(devices) => Html(format!("{devices:#?}")).into_response(),
        Err(e) => {
            warn!(error = %e, "device registry reload failed, keeping previous registry");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Handle GET /reloadLabels - reload the template table.
pub async fn reload_labels(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.reload_templates(&state.config.labels_dir) {
        Ok(templates) => Html(format!("{:?}", templates.labels())).into_response(),
        Err(e) => {
            warn!(error = %e, "template reload failed, keeping previous templates");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Handle GET /send/:command/:printer - feed or calibrate a printer.
pub async fn send_command(
    State(state): State<Arc<AppState>>,
    Path((command, printer)): Path<(String, String)>,
) -> Response {
    let Some(command) = MaintenanceCommand::from_path_segment(&command) else {
        return (StatusCode::NOT_FOUND, format!("unknown command '{command}'")).into_response();
    };

    let devices = state.registry.devices();
    match state
        .dispatcher
        .send_maintenance(&devices, &printer, command)
        .await
    {
        Ok(()) => {}
        Err(EtikettError::UnknownPrinter(name)) => {
            warn!(printer = %name, "maintenance command for unknown printer skipped");
        }
        Err(e) => {
            warn!(printer = %printer, error = %e, "maintenance command failed");
        }
    }
    Html(String::new()).into_response()
}

/// Handle GET /status/:printer - one host status line.
pub async fn printer_status(
    State(state): State<Arc<AppState>>,
    Path(printer): Path<String>,
) -> String {
    let devices = state.registry.devices();
    match devices.get(&printer) {
        Some(device) => state.dispatcher.query_status(device.ip).await,
        None => {
            debug!(printer = %printer, "status requested for unknown printer");
            String::new()
        }
    }
}

/// Handle GET /events/sse.
pub async fn events_sse(State(state): State<Arc<AppState>>) -> Response {
    stream_response(&state, Framing::EventStream)
}

/// Handle GET /events/lp.
pub async fn events_long_poll(State(state): State<Arc<AppState>>) -> Response {
    stream_response(&state, Framing::LongPoll)
}

fn stream_response(state: &AppState, framing: Framing) -> Response {
    let subscription = state.hub.subscribe();
    info!(subscriber = subscription.id(), ?framing, "event stream opened");

    let events = &state.config.events;
    let records = event_stream(subscription, framing, events.heartbeat(), events.max_cycles)
        .map(Ok::<_, Infallible>);

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(records),
    )
        .into_response()
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP server -- job intake, management endpoints and dashboard event streams.
//
// Routes:
//
//   POST /                        job intake (body must contain `<Printer>`)
//   GET  /                        dashboard page
//   GET  /reloadPrinter           reload the device registry
//   GET  /reloadLabels            reload the label templates
//   GET  /send/:command/:printer  feed or calibrate
//   GET  /status/:printer         host status line
//   GET  /events/sse              event-stream framing
//   GET  /events/lp               long-poll framing

mod events;
mod handlers;
mod state;

pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;

use etikett_core::error::{EtikettError, Result};

/// Build the router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::intake).get(handlers::index))
        .route("/reloadPrinter", get(handlers::reload_printers))
        .route("/reloadLabels", get(handlers::reload_labels))
        .route("/send/:command/:printer", get(handlers::send_command))
        .route("/status/:printer", get(handlers::printer_status))
        .route("/events/sse", get(handlers::events_sse))
        .route("/events/lp", get(handlers::events_long_poll))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EtikettError::HttpServer(format!("bind {addr}: {e}")))?;

    info!(addr = %addr, "HTTP server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| EtikettError::HttpServer(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use etikett_core::config::GatewayConfig;
    use etikett_core::registry::{DeviceRegistry, RegistryStore, TemplateTable};
    use etikett_core::types::Transport;
    use etikett_print::hub::DEFAULT_SUBSCRIBER_BUFFER;
    use etikett_print::{Dispatcher, EventHub, JobQueue, JobReceiver};

    const JOB: &str = r#"<?xml version="1.0"?><Document><Head><Printer>ZEBRA1</Printer><Label>SHIP</Label></Head></Document>"#;

    fn peer() -> SocketAddr {
        "10.20.30.40:51000".parse().expect("addr")
    }

    fn app_with(config: GatewayConfig, devices: DeviceRegistry) -> (Router, Arc<AppState>, JobReceiver) {
        let (jobs, rx) = JobQueue::bounded(4);
        let registry = Arc::new(RegistryStore::new(devices, TemplateTable::new()));
        let dispatcher = Arc::new(Dispatcher::tcp(config.dispatch.clone()));
        let hub = EventHub::spawn(DEFAULT_SUBSCRIBER_BUFFER);
        let state = Arc::new(AppState::new(config, registry, dispatcher, hub, jobs));
        let app = router(Arc::clone(&state)).layer(MockConnectInfo(peer()));
        (app, state, rx)
    }

    fn app() -> (Router, Arc<AppState>, JobReceiver) {
        let config = GatewayConfig {
            home_dir: "/nonexistent-etikett-home".into(),
            ..GatewayConfig::default()
        };
        app_with(config, DeviceRegistry::new())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    /// Local stand-in for a printer: accepts one connection, answers with
    /// `reply` after the first read and hands back everything it received.
    async fn fake_printer(reply: &'static str) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            let n = stream.read(&mut buf).await.expect("read");
            received.extend_from_slice(&buf[..n]);
            if !reply.is_empty() {
                stream.write_all(reply.as_bytes()).await.expect("reply");
            }
            let _ = stream.read_to_end(&mut received).await;
            String::from_utf8_lossy(&received).into_owned()
        });
        (port, handle)
    }

    fn local_printer(port: u16) -> (GatewayConfig, DeviceRegistry) {
        let mut config = GatewayConfig::default();
        config.dispatch.stationary_port = port;
        config.dispatch.status_port = port;
        config.dispatch.status_timeout_ms = 2_000;
        let mut devices = DeviceRegistry::new();
        devices.insert("ZEBRA1", "127.0.0.1".parse().expect("ip"), false);
        (config, devices)
    }

    #[tokio::test]
    async fn posted_job_is_enqueued_with_empty_response() {
        let (app, _state, mut rx) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(format!("\n  {JOB}  \n")))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.is_empty());

        let job = rx.next().await.expect("job");
        assert_eq!(job.payload, JOB);
        assert_eq!(job.transport, Transport::Http);
        assert_eq!(job.source, peer());
    }

    #[tokio::test]
    async fn post_without_marker_serves_index() {
        let (app, _state, mut rx) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("hello"))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, handlers::FALLBACK_INDEX);
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.next()).await.is_err());
    }

    #[tokio::test]
    async fn index_is_read_from_home_dir() {
        let home = tempfile::tempdir().expect("tempdir");
        std::fs::write(home.path().join("index.html"), "<h1>dashboard</h1>").expect("write");
        let config = GatewayConfig {
            home_dir: home.path().to_path_buf(),
            ..GatewayConfig::default()
        };
        let (app, _state, _rx) = app_with(config, DeviceRegistry::new());

        let response = app.oneshot(get("/")).await.expect("response");
        assert_eq!(body_text(response).await, "<h1>dashboard</h1>");
    }

    #[tokio::test]
    async fn reload_labels_lists_template_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("Ship_Label.zpl"), "^XA^XZ").expect("write");
        std::fs::write(dir.path().join("pallet.zpl"), "^XA^XZ").expect("write");
        let config = GatewayConfig {
            labels_dir: dir.path().to_path_buf(),
            ..GatewayConfig::default()
        };
        let (app, state, _rx) = app_with(config, DeviceRegistry::new());

        let response = app.oneshot(get("/reloadLabels")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"["pallet", "shiplabel"]"#);
        assert!(state.registry.templates().get("SHIP-LABEL").is_some());
    }

    #[tokio::test]
    async fn failed_printer_reload_keeps_registry() {
        let config = GatewayConfig {
            printer_file: "/nonexistent-etikett/printers.json".into(),
            ..GatewayConfig::default()
        };
        let mut devices = DeviceRegistry::new();
        devices.insert("ZEBRA1", "10.0.0.5".parse().expect("ip"), false);
        let (app, state, _rx) = app_with(config, devices);

        let response = app.oneshot(get("/reloadPrinter")).await.expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.registry.devices().get("ZEBRA1").is_some());
    }

    #[tokio::test]
    async fn reload_printer_swaps_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("printers.json");
        std::fs::write(&file, r#"{"DRU 7": {"ip": "10.0.0.7", "peel": true}}"#).expect("write");
        let config = GatewayConfig {
            printer_file: file,
            ..GatewayConfig::default()
        };
        let (app, state, _rx) = app_with(config, DeviceRegistry::new());

        let response = app.oneshot(get("/reloadPrinter")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("DRU 7"));
        assert!(state.registry.devices().get("DRU 7").is_some_and(|d| d.peel_off));
    }

    #[tokio::test]
    async fn unknown_maintenance_command_is_not_found() {
        let (app, _state, _rx) = app();
        let response = app.oneshot(get("/send/reboot/ZEBRA1")).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn maintenance_for_unknown_printer_still_succeeds() {
        let (app, _state, _rx) = app();
        let response = app.oneshot(get("/send/feed/GHOST1")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn feed_is_sent_to_printer() {
        let (port, printer) = fake_printer("").await;
        let (config, devices) = local_printer(port);
        let (app, _state, _rx) = app_with(config, devices);

        let response = app.oneshot(get("/send/feed/ZEBRA1")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(printer.await.expect("printer"), "^xa^aa^fd ^fs^xz\r\n\r\n");
    }

    #[tokio::test]
    async fn status_line_is_returned() {
        let (port, printer) = fake_printer("\u{2}030,0,0\u{3}\r\n").await;
        let (config, devices) = local_printer(port);
        let (app, _state, _rx) = app_with(config, devices);

        let response = app.oneshot(get("/status/ZEBRA1")).await.expect("response");
        assert_eq!(body_text(response).await, "\u{2}030,0,0\u{3}\r\n");
        assert!(printer.await.expect("printer").starts_with("~HS"));
    }

    #[tokio::test]
    async fn status_of_unknown_printer_is_empty() {
        let (app, _state, _rx) = app();
        let response = app.oneshot(get("/status/GHOST1")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn event_stream_headers_and_subscription() {
        let (app, state, _rx) = app();
        let response = app.oneshot(get("/events/sse")).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(state.hub.subscriber_count().await, 1);

        drop(response);
        assert_eq!(state.hub.subscriber_count().await, 0);
    }
}

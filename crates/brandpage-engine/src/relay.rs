use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use brandpage_contracts::events::{RelayEvent, RelayEventLog};
use brandpage_contracts::generation::{extract_html, GenerationRequest, GenerationResult};
use brandpage_contracts::wire::{Envelope, GENERATE_EVENT};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::enhance::{enhance_text, EnhanceRequest, EnhanceResponse, ENHANCE_PATH};
use crate::generation::{elapsed_ms, GenerationError, TextGenerator};

/// Everything a connection needs, shared read-only across sessions and
/// generation tasks.
pub struct RelayContext {
    generator: Arc<dyn TextGenerator>,
    events: Option<RelayEventLog>,
    allowed_origin: Option<String>,
}

impl RelayContext {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            events: None,
            allowed_origin: None,
        }
    }

    pub fn with_events(mut self, events: RelayEventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// `None` accepts browser connections from any origin.
    pub fn with_allowed_origin(mut self, origin: Option<String>) -> Self {
        self.allowed_origin = origin;
        self
    }

    /// Runs one `generate` payload through prompt building, the provider call
    /// and extraction. Never fails: any problem yields the placeholder result.
    /// Blocks for the duration of the provider call.
    pub fn generate(&self, connection_id: &str, payload: Value) -> GenerationResult {
        let Some(request) = GenerationRequest::from_payload(payload) else {
            warn!(connection_id, "generate event carried no profile");
            self.record(RelayEvent::GenerationFailed {
                connection_id: connection_id.to_string(),
                prompt_sha256: None,
                error: "generate event carried no profile".to_string(),
                elapsed_ms: 0,
            });
            return GenerationResult::failed();
        };

        let fingerprint = prompt_fingerprint(&request.prompt);
        info!(
            connection_id,
            company = request.company_name(),
            prompt_sha256 = %fingerprint,
            "sending prompt to generation provider"
        );
        self.record(RelayEvent::GenerationStarted {
            connection_id: connection_id.to_string(),
            prompt_sha256: fingerprint.clone(),
            prompt_chars: request.prompt.chars().count(),
        });

        let started = Instant::now();
        match generate_page(self.generator.as_ref(), &request) {
            Ok(result) => {
                self.record(RelayEvent::GenerationCompleted {
                    connection_id: connection_id.to_string(),
                    prompt_sha256: fingerprint,
                    html_chars: result.html.chars().count(),
                    elapsed_ms: elapsed_ms(started),
                });
                result
            }
            Err(err) => {
                error!(connection_id, error = %err, "generation failed");
                self.record(RelayEvent::GenerationFailed {
                    connection_id: connection_id.to_string(),
                    prompt_sha256: Some(fingerprint),
                    error: err.to_string(),
                    elapsed_ms: elapsed_ms(started),
                });
                GenerationResult::failed()
            }
        }
    }

    fn record(&self, event: RelayEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.record(event) {
            warn!(error = %err, "failed to write relay event");
        }
    }
}

/// Prompt -> raw model text -> extracted document.
pub fn generate_page(
    generator: &dyn TextGenerator,
    request: &GenerationRequest,
) -> Result<GenerationResult, GenerationError> {
    let raw = generator.generate(&request.prompt)?;
    Ok(GenerationResult::new(
        extract_html(&raw),
        request.prompt.clone(),
    ))
}

/// The relay's HTTP surface: `POST /api/enhance`, and a WebSocket upgrade on
/// every other path.
pub fn router(context: Arc<RelayContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(ENHANCE_PATH, post(enhance))
        .fallback(open_socket)
        .with_state(context)
        .layer(cors)
}

pub struct RelayServer {
    listener: TcpListener,
    context: Arc<RelayContext>,
}

impl RelayServer {
    pub async fn bind(addr: impl ToSocketAddrs, context: RelayContext) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind relay listener")?;
        Ok(Self {
            listener,
            context: Arc::new(context),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("relay listener has no local address")
    }

    pub async fn serve(self) -> Result<()> {
        axum::serve(self.listener, router(self.context))
            .await
            .context("relay server failed")
    }
}

async fn enhance(
    State(context): State<Arc<RelayContext>>,
    body: Result<Json<EnhanceRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid enhance request: {}", rejection.body_text()) })),
            )
                .into_response()
        }
    };

    let field = request.field.clone();
    let worker = Arc::clone(&context);
    let outcome =
        tokio::task::spawn_blocking(move || enhance_text(worker.generator.as_ref(), &request))
            .await;
    let error = match outcome {
        Ok(Ok(enhanced)) => return Json(EnhanceResponse { enhanced }).into_response(),
        Ok(Err(err)) => err.to_string(),
        Err(err) => format!("enhance worker stopped: {err}"),
    };
    warn!(field = %field, error = %error, "enhancement failed");
    context.record(RelayEvent::EnhanceFailed { field, error });
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": "enhancement failed" })),
    )
        .into_response()
}

async fn open_socket(
    State(context): State<Arc<RelayContext>>,
    headers: HeaderMap,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    let Some(upgrade) = upgrade else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response();
    };
    if let Err(origin) = check_origin(context.allowed_origin.as_deref(), &headers) {
        warn!(origin, "rejecting websocket from disallowed origin");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": format!("origin {origin} is not allowed") })),
        )
            .into_response();
    }
    upgrade.on_upgrade(move |socket| Session::new(socket, context).run())
}

/// Requests without an `Origin` header come from non-browser clients and are
/// let through. Returns the offending origin on rejection.
fn check_origin<'a>(allowed: Option<&str>, headers: &'a HeaderMap) -> Result<(), &'a str> {
    let (Some(allowed), Some(origin)) = (allowed, headers.get(header::ORIGIN)) else {
        return Ok(());
    };
    let origin = origin.to_str().unwrap_or("<non-ascii origin>");
    if origin
        .trim_end_matches('/')
        .eq_ignore_ascii_case(allowed.trim_end_matches('/'))
    {
        Ok(())
    } else {
        Err(origin)
    }
}

/// One connected client. Generation tasks report back over `results` and
/// their output is sent in the order it arrives.
struct Session {
    id: String,
    socket: WebSocket,
    context: Arc<RelayContext>,
    results_tx: mpsc::UnboundedSender<GenerationResult>,
    results_rx: mpsc::UnboundedReceiver<GenerationResult>,
    requests: usize,
}

impl Session {
    fn new(socket: WebSocket, context: Arc<RelayContext>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            socket,
            context,
            results_tx,
            results_rx,
            requests: 0,
        }
    }

    async fn run(mut self) {
        info!(connection_id = %self.id, "client connected");
        self.context.record(RelayEvent::ConnectionOpened {
            connection_id: self.id.clone(),
        });
        if let Err(err) = self.pump().await {
            let detail = format!("{err:#}");
            warn!(connection_id = %self.id, error = %detail, "connection ended with error");
        }
        info!(connection_id = %self.id, requests = self.requests, "client disconnected");
        self.context.record(RelayEvent::ConnectionClosed {
            connection_id: self.id.clone(),
            requests: self.requests,
        });
    }

    async fn pump(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                Some(result) = self.results_rx.recv() => self.deliver(&result).await?,
                frame = self.socket.recv() => {
                    let Some(frame) = frame else {
                        return Ok(());
                    };
                    match frame.context("relay read failed")? {
                        WsMessage::Text(text) => self.on_frame(&text),
                        WsMessage::Binary(bytes) => self.on_frame(&String::from_utf8_lossy(&bytes)),
                        WsMessage::Close(_) => return Ok(()),
                        _ => {}
                    }
                }
            }
        }
    }

    async fn deliver(&mut self, result: &GenerationResult) -> Result<()> {
        let frame = Envelope::generated_code(result)?.to_text()?;
        self.socket
            .send(WsMessage::Text(frame))
            .await
            .context("failed to emit generatedCode")
    }

    fn on_frame(&mut self, raw: &str) {
        let envelope = match Envelope::parse(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(connection_id = %self.id, error = %err, "ignoring malformed frame");
                return;
            }
        };
        if !envelope.is(GENERATE_EVENT) {
            debug!(connection_id = %self.id, event = %envelope.event, "ignoring unknown event");
            return;
        }

        self.requests += 1;
        let context = Arc::clone(&self.context);
        let results = self.results_tx.clone();
        let connection_id = self.id.clone();
        tokio::spawn(async move {
            let worker_id = connection_id.clone();
            let result = tokio::task::spawn_blocking(move || {
                context.generate(&worker_id, envelope.data)
            })
            .await
            .unwrap_or_else(|err| {
                error!(connection_id = %connection_id, error = %err, "generation task stopped");
                GenerationResult::failed()
            });
            // The receiver is gone once the client disconnects; the result is dropped.
            let _ = results.send(result);
        });
    }
}

fn prompt_fingerprint(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

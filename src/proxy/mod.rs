//! OpenAI-compatible chat-completions proxy that heals model output.
//!
//! Requests whose `response_format` asks for JSON are forwarded upstream
//! (with schema `default`s stripped, which upstream APIs commonly reject);
//! the response content is then routed through a [`Healer`] so downstream
//! consumers always receive syntactically valid JSON. Both buffered
//! responses and SSE streams are supported; anything else passes through
//! unchanged.

pub mod config;
pub mod error;
pub mod sse;
pub mod upstream;

use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::healer::Healer;
use crate::options::Options;
use crate::schema;
use self::config::ProxyConfig;
use self::error::ProxyError;
use self::sse::{FrameSplitter, SseSession};
use self::upstream::UpstreamClient;

pub struct AppState {
    pub config: ProxyConfig,
    pub upstream: UpstreamClient,
}

/// How a request's `response_format` maps onto healing behavior.
enum HealMode {
    Schema(Arc<Value>),
    Structural,
    Passthrough,
}

impl HealMode {
    fn of(body: &Value) -> Self {
        match body.pointer("/response_format/type").and_then(Value::as_str) {
            Some("json_schema") => match body.pointer("/response_format/json_schema/schema") {
                Some(schema) => HealMode::Schema(Arc::new(schema.clone())),
                None => HealMode::Passthrough,
            },
            Some("json_object") => HealMode::Structural,
            _ => HealMode::Passthrough,
        }
    }

    fn healer(&self) -> Option<Healer> {
        match self {
            HealMode::Schema(s) => Some(Healer::with_schema(Arc::clone(s), Options::default())),
            HealMode::Structural => Some(Healer::new(Options::default())),
            HealMode::Passthrough => None,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state)
}

/// Initialize tracing from config. Safe to call more than once.
pub fn init_tracing(config: &ProxyConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Bind the configured address and serve until shutdown.
pub async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let upstream = UpstreamClient::new(config.upstream.clone(), config.upstream_key.clone());
    let state = Arc::new(AppState { config, upstream });
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(mut body): Json<Value>,
) -> Result<Response, ProxyError> {
    let mode = HealMode::of(&body);
    if let Some(obj) = body.as_object_mut() {
        let needs_model = obj.get("model").map_or(true, Value::is_null);
        if needs_model {
            if let Some(model) = &state.config.default_model {
                obj.insert("model".to_owned(), json!(model));
            }
        }
    }
    if let Some(slot) = body.pointer_mut("/response_format/json_schema/schema") {
        schema::strip_defaults(slot);
    }
    let streaming = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    let resp = state.upstream.chat_completions(&body).await?;
    if !resp.status().is_success() {
        warn!(status = %resp.status(), "upstream returned an error");
        return error_passthrough(resp).await;
    }

    match mode.healer() {
        None => passthrough(resp, streaming).await,
        Some(healer) if streaming => Ok(stream_healed(resp, healer)),
        Some(healer) => heal_buffered(resp, healer).await,
    }
}

/// Surface an upstream error with its original status and body.
async fn error_passthrough(resp: reqwest::Response) -> Result<Response, ProxyError> {
    let status =
        StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = content_type_of(&resp);
    let bytes = resp.bytes().await?;
    build_response(status, content_type, Body::from(bytes))
}

async fn passthrough(resp: reqwest::Response, streaming: bool) -> Result<Response, ProxyError> {
    let content_type = content_type_of(&resp);
    if streaming {
        let body = Body::from_stream(resp.bytes_stream());
        build_response(StatusCode::OK, content_type, body)
    } else {
        let bytes = resp.bytes().await?;
        build_response(StatusCode::OK, content_type, Body::from(bytes))
    }
}

/// Non-streaming path: replace `choices[0].message.content` with its healed
/// form.
async fn heal_buffered(resp: reqwest::Response, mut healer: Healer) -> Result<Response, ProxyError> {
    let mut value: Value = resp.json().await?;
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_owned);
    if let Some(content) = content {
        let mut healed = healer.process(&content);
        healed.push_str(&healer.finish());
        debug!(healed_len = healed.len(), "healed buffered response content");
        if let Some(slot) = value.pointer_mut("/choices/0/message/content") {
            *slot = Value::String(healed);
        }
    }
    Ok(Json(value).into_response())
}

/// Streaming path: pump upstream SSE frames through a healing session into
/// the response body.
fn stream_healed(resp: reqwest::Response, healer: Healer) -> Response {
    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(16);
    tokio::spawn(pump_sse(resp, healer, tx));
    let body = Body::from_stream(ReceiverStream::new(rx));
    build_response(StatusCode::OK, Some("text/event-stream".to_owned()), body)
        .unwrap_or_else(|e| e.into_response())
}

async fn pump_sse(resp: reqwest::Response, healer: Healer, tx: mpsc::Sender<Result<Bytes, io::Error>>) {
    let mut splitter = FrameSplitter::new();
    let mut session = SseSession::new(healer);
    let mut upstream = resp.bytes_stream();
    while let Some(next) = upstream.next().await {
        let chunk = match next {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("upstream stream failed: {e}");
                break;
            }
        };
        for frame in splitter.push(&chunk) {
            if !forward(&tx, session.on_frame(&frame)).await {
                return;
            }
        }
    }
    if let Some(rest) = splitter.take_remainder() {
        if !forward(&tx, session.on_frame(&rest)).await {
            return;
        }
    }
    // Upstream ended without [DONE]: still flush the closing tail.
    if !session.is_done() {
        if let Some(tail) = session.finish_frame() {
            let _ = forward(&tx, vec![tail]).await;
        }
    }
}

async fn forward(tx: &mpsc::Sender<Result<Bytes, io::Error>>, frames: Vec<String>) -> bool {
    for frame in frames {
        let wire = format!("{frame}\n\n");
        if tx.send(Ok(Bytes::from(wire))).await.is_err() {
            return false;
        }
    }
    true
}

fn content_type_of(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn build_response(
    status: StatusCode,
    content_type: Option<String>,
    body: Body,
) -> Result<Response, ProxyError> {
    let mut builder = Response::builder().status(status);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    builder
        .body(body)
        .map_err(|e| ProxyError::Internal(e.to_string()))
}

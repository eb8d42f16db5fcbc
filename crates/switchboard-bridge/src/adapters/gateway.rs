//! HTTP gateway adapter for the external messaging network.
//!
//! The network session itself (pairing, encryption, wire protocol) lives in
//! a separate gateway process. Outbound messages are `POST`ed to it as JSON;
//! inbound messages arrive on a small axum webhook.
//!
//! | Direction | Request | Body |
//! |-----------|---------|------|
//! | out | `POST {send_url}` | `{"to": "+15551234", "text": "..."}` |
//! | in  | `POST /inbound`  | `{"from": "+15551234", "text": "..."}` |
//!
//! When a shared secret is configured it travels in the `x-gateway-secret`
//! header both ways.

use std::{sync::Arc, time::Duration};

use anyhow::{Context as _, anyhow};
use axum::{
  Json, Router,
  extract::State,
  http::{HeaderMap, StatusCode},
  routing::post,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use switchboard_core::{
  ids::Contact,
  transport::{ContactMessage, ExternalTransport, TransportError},
};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub const SECRET_HEADER: &str = "x-gateway-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
  pub send_url:   String,
  /// Probed once at startup when set.
  #[serde(default)]
  pub health_url: Option<String>,
  #[serde(default)]
  pub secret:     Option<String>,
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8088 }

// ─── Outbound ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OutboundBody<'a> {
  to:   &'a str,
  text: &'a str,
}

/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct GatewayClient {
  client: Client,
  config: GatewayConfig,
}

impl GatewayClient {
  pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.config.secret {
      Some(secret) => req.header(SECRET_HEADER, secret),
      None => req,
    }
  }

  /// `GET {health_url}` when configured; any non-success status is an error.
  pub async fn probe(&self) -> anyhow::Result<()> {
    let Some(url) = &self.config.health_url else {
      return Ok(());
    };
    let resp = self
      .authed(self.client.get(url))
      .send()
      .await
      .with_context(|| format!("GET {url} failed"))?;
    if !resp.status().is_success() {
      return Err(anyhow!("GET {url} → {}", resp.status()));
    }
    Ok(())
  }
}

impl ExternalTransport for GatewayClient {
  async fn send(&self, contact: Contact, text: String) -> Result<(), TransportError> {
    let body = OutboundBody { to: contact.as_str(), text: &text };
    let resp = self
      .authed(self.client.post(&self.config.send_url))
      .json(&body)
      .send()
      .await
      .map_err(|e| TransportError::Unreachable(e.without_url().to_string()))?;

    let status = resp.status();
    if !status.is_success() {
      let detail = resp.text().await.unwrap_or_default();
      return Err(TransportError::Rejected(format!("{status}: {}", detail.trim())));
    }
    Ok(())
  }
}

// ─── Inbound ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InboundBody {
  pub from: String,
  pub text: String,
}

#[derive(Clone)]
struct InboundState {
  events: mpsc::Sender<ContactMessage>,
  secret: Option<Arc<str>>,
}

/// Build the webhook router feeding `events`.
pub fn inbound_router(events: mpsc::Sender<ContactMessage>, secret: Option<String>) -> Router {
  let state = InboundState { events, secret: secret.map(Arc::from) };
  Router::new()
    .route("/inbound", post(inbound))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// `POST /inbound`
async fn inbound(
  State(state): State<InboundState>,
  headers: HeaderMap,
  Json(body): Json<InboundBody>,
) -> StatusCode {
  if let Some(secret) = &state.secret {
    let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if given != Some(secret.as_ref()) {
      return StatusCode::UNAUTHORIZED;
    }
  }
  if body.text.trim().is_empty() {
    return StatusCode::BAD_REQUEST;
  }

  let contact = Contact::parse(&body.from).unwrap_or_else(|_| Contact::from_transport(body.from));
  debug!(contact = %contact, "gateway message received");

  match state.events.send(ContactMessage { contact, text: body.text }).await {
    Ok(()) => StatusCode::ACCEPTED,
    Err(_) => StatusCode::SERVICE_UNAVAILABLE,
  }
}

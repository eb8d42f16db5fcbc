//! The conversation bridge.
//!
//! Pairs every external contact with one thread of the internal topic-group
//! chat and relays messages both ways. Generic over the identity store and
//! the three platform collaborators; concrete adapters live in [`adapters`].

pub mod adapters;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod router;

mod deadline;

pub use config::{Announce, BridgeConfig};
pub use error::BridgeError;

use std::sync::Arc;

use switchboard_core::{
  store::IdentityStore,
  transport::{AgentMessage, Broadcast, ContactMessage, ExternalTransport, InternalTransport},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use registry::TopicRegistry;

// ─── Bridge ───────────────────────────────────────────────────────────────────

/// Shared state threaded through every event handler.
///
/// Cloning is cheap; all parts are reference-counted.
pub struct Bridge<S, X, T, B> {
  pub store:     Arc<S>,
  pub registry:  Arc<TopicRegistry<S>>,
  pub external:  Arc<X>,
  pub internal:  Arc<T>,
  pub broadcast: Arc<B>,
  pub config:    Arc<BridgeConfig>,
}

impl<S, X, T, B> Clone for Bridge<S, X, T, B> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      registry:  self.registry.clone(),
      external:  self.external.clone(),
      internal:  self.internal.clone(),
      broadcast: self.broadcast.clone(),
      config:    self.config.clone(),
    }
  }
}

impl<S, X, T, B> Bridge<S, X, T, B>
where
  S: IdentityStore + 'static,
  X: ExternalTransport + 'static,
  T: InternalTransport + 'static,
  B: Broadcast + 'static,
{
  pub fn new(store: S, external: X, internal: T, broadcast: B, config: BridgeConfig) -> Self {
    let store = Arc::new(store);
    let registry = TopicRegistry::new(
      store.clone(),
      config.store_timeout(),
      config.transport_timeout(),
    );
    Self {
      store,
      registry: Arc::new(registry),
      external: Arc::new(external),
      internal: Arc::new(internal),
      broadcast: Arc::new(broadcast),
      config: Arc::new(config),
    }
  }

  // ─── Event loops ──────────────────────────────────────────────────────────

  /// Consume internal-platform messages, one task per message.
  pub async fn run_internal(self, mut events: mpsc::Receiver<AgentMessage>) {
    while let Some(msg) = events.recv().await {
      let bridge = self.clone();
      tokio::spawn(async move {
        if let Err(e) = bridge.handle_agent_message(msg).await {
          debug!(error = %e, "agent message not relayed");
        }
      });
    }
    info!("internal event stream closed");
  }

  /// Consume external-platform messages, one task per message.
  pub async fn run_external(self, mut events: mpsc::Receiver<ContactMessage>) {
    while let Some(msg) = events.recv().await {
      let bridge = self.clone();
      tokio::spawn(async move {
        let contact = msg.contact.clone();
        if let Err(e) = bridge.relay_from_contact(msg).await {
          warn!(contact = %contact, error = %e, "inbound message not relayed");
        }
      });
    }
    info!("external event stream closed");
  }
}

#[cfg(test)]
mod testing;

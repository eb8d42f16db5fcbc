//! The two relay directions.
//!
//! Agent → contact: attribution suffix appended, one delivery attempt, then
//! a copy to the broadcast destination. Contact → agent: text posted into the
//! contact's thread unmodified, plus a broadcast copy. Mapping writes and
//! message delivery are independent: a failed delivery never undoes a topic.

use switchboard_core::{
  agent::attribution_suffix,
  ids::{AgentId, Contact, ThreadId},
  store::IdentityStore,
  topic::Topic,
  transport::{Broadcast, ContactMessage, ExternalTransport, InternalTransport, TransportError},
};
use tracing::{debug, info, warn};

use crate::{
  Bridge,
  deadline::{store_call, transport_call},
  error::{BridgeError, Result},
  registry::Resolution,
};

impl<S, X, T, B> Bridge<S, X, T, B>
where
  S: IdentityStore + 'static,
  X: ExternalTransport + 'static,
  T: InternalTransport + 'static,
  B: Broadcast + 'static,
{
  // ─── Agent → contact ──────────────────────────────────────────────────────

  /// Send `text` from `sender` to `contact`, opening a topic first if the
  /// contact has none.
  pub async fn send_to_contact(
    &self,
    sender: AgentId,
    contact: &Contact,
    text: &str,
  ) -> Result<Topic> {
    let suffix = self.attribution(sender).await?;
    let title = contact.to_string();
    let topic = self
      .registry
      .get_or_create_topic(contact, contact.as_str(), move || {
        self.internal.create_thread(title)
      })
      .await?
      .into_topic();

    let outbound = format!("{text}{suffix}");
    self.deliver(&topic, &outbound).await?;

    let echo = format!("📤 To {}\n\n{outbound}", topic.label());
    if let Err(e) = self.post_to_thread(topic.thread_id, echo).await {
      warn!(thread = %topic.thread_id, error = %e, "could not echo outbound message");
    }
    self.broadcast_copy(format!("📤 {}: {outbound}", topic.label())).await;
    Ok(topic)
  }

  /// Relay an agent's reply posted inside `thread_id`. Never opens a topic:
  /// an unmapped thread fails with [`BridgeError::UnknownThread`].
  pub async fn reply_to_contact(
    &self,
    sender: AgentId,
    thread_id: ThreadId,
    text: &str,
  ) -> Result<Topic> {
    let topic = self
      .registry
      .lookup_by_thread(thread_id)
      .await?
      .ok_or(BridgeError::UnknownThread(thread_id))?;

    let suffix = self.attribution(sender).await?;
    let outbound = format!("{text}{suffix}");
    self.deliver(&topic, &outbound).await?;

    self.broadcast_copy(format!("📤 {}: {outbound}", topic.label())).await;
    Ok(topic)
  }

  // ─── Contact → agent ──────────────────────────────────────────────────────

  /// Relay a message from an external contact into its thread, opening a
  /// topic (and announcing it) for a contact seen for the first time.
  pub async fn relay_from_contact(&self, msg: ContactMessage) -> Result<Topic> {
    let ContactMessage { contact, text } = msg;
    let title = contact.to_string();
    let resolution = self
      .registry
      .get_or_create_topic(&contact, contact.as_str(), move || {
        self.internal.create_thread(title)
      })
      .await?;

    if resolution.was_created() {
      self.announce(&resolution).await;
    }
    let topic = resolution.into_topic();

    match self.post_to_thread(topic.thread_id, text.clone()).await {
      Ok(_) => debug!(contact = %contact, thread = %topic.thread_id, "inbound message relayed"),
      Err(e) => warn!(
        contact = %contact,
        thread = %topic.thread_id,
        error = %e,
        "could not post inbound message into thread",
      ),
    }
    self.broadcast_copy(format!("📥 {}: {text}", topic.label())).await;
    Ok(topic)
  }

  // ─── Helpers ──────────────────────────────────────────────────────────────

  /// The attribution suffix for `sender`: empty unless a stored agent record
  /// carries an initial.
  async fn attribution(&self, sender: AgentId) -> Result<String> {
    let agent = store_call(self.config.store_timeout(), self.store.get_agent(sender)).await?;
    Ok(attribution_suffix(agent.as_ref().map(|a| a.initial.as_str())))
  }

  /// Single delivery attempt to the topic's contact.
  async fn deliver(&self, topic: &Topic, outbound: &str) -> Result<()> {
    transport_call(
      self.config.transport_timeout(),
      self.external.send(topic.contact.clone(), outbound.to_owned()),
    )
    .await
    .inspect_err(|e| warn!(contact = %topic.contact, error = %e, "delivery failed"))?;
    info!(contact = %topic.contact, thread = %topic.thread_id, "message delivered to contact");
    Ok(())
  }

  pub(crate) async fn post_to_thread(
    &self,
    thread_id: ThreadId,
    text: String,
  ) -> Result<(), TransportError> {
    transport_call(
      self.config.transport_timeout(),
      self.internal.post_to_thread(thread_id, text),
    )
    .await
    .map(|_| ())
  }

  /// Best-effort copy to the broadcast destination.
  async fn broadcast_copy(&self, text: String) {
    if let Err(e) = transport_call(self.config.transport_timeout(), self.broadcast.post(text)).await
    {
      warn!(error = %e, "broadcast copy failed");
    }
  }

  async fn announce(&self, resolution: &Resolution) {
    let topic = resolution.topic();
    let note = format!("💬 New conversation with {}", topic.label());
    if self.config.announce.in_thread()
      && let Err(e) = self.post_to_thread(topic.thread_id, note.clone()).await
    {
      warn!(thread = %topic.thread_id, error = %e, "could not announce new topic");
    }
    if self.config.announce.on_broadcast() {
      self.broadcast_copy(note).await;
    }
  }
}

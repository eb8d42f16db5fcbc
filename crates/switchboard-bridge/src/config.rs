//! Bridge configuration, deserialised from the `[bridge]` table.

use std::time::Duration;

use serde::Deserialize;
use switchboard_core::ids::{AgentId, ChatId};

/// Where to announce a topic created by an inbound message from a contact
/// nobody has talked to yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Announce {
  /// Only inside the new thread.
  #[default]
  Thread,
  /// Only on the broadcast destination.
  Broadcast,
  Both,
  None,
}

impl Announce {
  pub fn in_thread(self) -> bool { matches!(self, Self::Thread | Self::Both) }

  pub fn on_broadcast(self) -> bool { matches!(self, Self::Broadcast | Self::Both) }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
  /// The group chat holding one thread per contact.
  pub topic_chat:             ChatId,
  /// Fixed allow-list; never written to the store.
  #[serde(default)]
  pub superadmins:            Vec<AgentId>,
  #[serde(default = "default_store_timeout")]
  pub store_timeout_secs:     u64,
  #[serde(default = "default_transport_timeout")]
  pub transport_timeout_secs: u64,
  #[serde(default)]
  pub announce:               Announce,
}

fn default_store_timeout() -> u64 { 5 }

fn default_transport_timeout() -> u64 { 15 }

impl BridgeConfig {
  pub fn new(topic_chat: ChatId, superadmins: Vec<AgentId>) -> Self {
    Self {
      topic_chat,
      superadmins,
      store_timeout_secs: default_store_timeout(),
      transport_timeout_secs: default_transport_timeout(),
      announce: Announce::default(),
    }
  }

  pub fn is_superadmin(&self, id: AgentId) -> bool { self.superadmins.contains(&id) }

  pub fn store_timeout(&self) -> Duration { Duration::from_secs(self.store_timeout_secs) }

  pub fn transport_timeout(&self) -> Duration {
    Duration::from_secs(self.transport_timeout_secs)
  }
}

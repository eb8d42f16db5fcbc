//! Agents — internal-platform users allowed to operate the bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// Authorization tier.
///
/// `Superadmin` comes from the fixed allow-list supplied at startup and is
/// never stored; `Member` records live in the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Superadmin,
  Member,
}

/// A stored agent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
  pub agent_id: AgentId,
  /// Short label appended to outbound messages.
  pub initial:  String,
  pub added_at: DateTime<Utc>,
}

/// Text appended to an outbound message so the contact knows which agent
/// wrote it. Empty when the agent has no (or a blank) initial.
pub fn attribution_suffix(initial: Option<&str>) -> String {
  match initial.map(str::trim) {
    Some(i) if !i.is_empty() => format!("\n\n-{i}"),
    _ => String::new(),
  }
}

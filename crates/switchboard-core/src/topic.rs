//! Topic — the pairing of one external contact with one internal thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{Contact, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
  Open,
  Closed,
}

/// A contact ↔ thread mapping.
///
/// At most one open topic exists per contact and per thread. The identity
/// store is the source of truth; any in-memory copy is a derived view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
  pub contact:      Contact,
  /// Label shown to agents; defaults to the contact address.
  pub display_name: String,
  pub thread_id:    ThreadId,
  pub status:       TopicStatus,
  pub opened_at:    DateTime<Utc>,
}

impl Topic {
  /// The contact identity as agents see it: `Name (+number)`, or just the
  /// number when no separate name has been set.
  pub fn label(&self) -> String {
    if self.display_name == self.contact.as_str() {
      self.contact.to_string()
    } else {
      format!("{} ({})", self.display_name, self.contact)
    }
  }
}

//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings; identifiers as integers.

use chrono::{DateTime, Utc};
use switchboard_core::{
  agent::Agent,
  ids::{AgentId, Contact, ThreadId},
  topic::{Topic, TopicStatus},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── TopicStatus ─────────────────────────────────────────────────────────────

pub fn encode_status(s: TopicStatus) -> &'static str {
  match s {
    TopicStatus::Open => "open",
    TopicStatus::Closed => "closed",
  }
}

pub fn decode_status(s: &str) -> Result<TopicStatus> {
  match s {
    "open" => Ok(TopicStatus::Open),
    "closed" => Ok(TopicStatus::Closed),
    other => Err(switchboard_core::Error::UnknownStatus(other.to_owned()).into()),
  }
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

pub const TOPIC_COLUMNS: &str = "contact, display_name, thread_id, status, opened_at";

/// A `topics` row as read from SQLite, before decoding.
pub struct RawTopic {
  pub contact:      String,
  pub display_name: String,
  pub thread_id:    i64,
  pub status:       String,
  pub opened_at:    String,
}

impl RawTopic {
  /// Row mapper for queries selecting [`TOPIC_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact:      row.get(0)?,
      display_name: row.get(1)?,
      thread_id:    row.get(2)?,
      status:       row.get(3)?,
      opened_at:    row.get(4)?,
    })
  }

  pub fn into_topic(self) -> Result<Topic> {
    Ok(Topic {
      contact:      Contact::from_transport(self.contact),
      display_name: self.display_name,
      thread_id:    ThreadId(self.thread_id),
      status:       decode_status(&self.status)?,
      opened_at:    decode_dt(&self.opened_at)?,
    })
  }
}

pub const AGENT_COLUMNS: &str = "agent_id, initial, added_at";

/// An `agents` row as read from SQLite, before decoding.
pub struct RawAgent {
  pub agent_id: i64,
  pub initial:  String,
  pub added_at: String,
}

impl RawAgent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      agent_id: row.get(0)?,
      initial:  row.get(1)?,
      added_at: row.get(2)?,
    })
  }

  pub fn into_agent(self) -> Result<Agent> {
    Ok(Agent {
      agent_id: AgentId(self.agent_id),
      initial:  self.initial,
      added_at: decode_dt(&self.added_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_roundtrip() {
    for s in [TopicStatus::Open, TopicStatus::Closed] {
      assert_eq!(decode_status(encode_status(s)).unwrap(), s);
    }
    assert!(decode_status("archived").is_err());
  }

  #[test]
  fn bad_timestamp_is_an_error() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}

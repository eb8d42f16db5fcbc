//! Identifier newtypes shared by every layer.
//!
//! Internal-platform identifiers are numeric; external contacts are opaque
//! phone-number-like strings.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Contact ─────────────────────────────────────────────────────────────────

/// An address on the external messaging network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contact(String);

impl Contact {
  /// Parse an address: an optional leading `+` followed by 5 to 20 ASCII
  /// digits. Surrounding whitespace is ignored. The canonical form always
  /// carries the `+`, so `15551234` and `+15551234` are the same contact.
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let valid = (5..=20).contains(&digits.len())
      && digits.bytes().all(|b| b.is_ascii_digit());
    if !valid {
      return Err(Error::InvalidContact(raw.to_owned()));
    }
    Ok(Self(format!("+{digits}")))
  }

  /// Wrap an address without validation, e.g. one read back from storage or
  /// reported by a transport in a shape `parse` does not know.
  pub fn from_transport(raw: impl Into<String>) -> Self { Self(raw.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Contact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Numeric ids ─────────────────────────────────────────────────────────────

macro_rules! numeric_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
    }

    impl FromStr for $name {
      type Err = Error;

      fn from_str(s: &str) -> Result<Self> {
        s.trim()
          .parse::<i64>()
          .map(Self)
          .map_err(|_| Error::InvalidId(s.to_owned()))
      }
    }
  };
}

numeric_id!(
  /// A discussion thread inside the topic-group chat.
  ThreadId
);
numeric_id!(
  /// A chat (group or direct) on the internal platform.
  ChatId
);
numeric_id!(
  /// An internal-platform user.
  AgentId
);
numeric_id!(
  /// A message posted on the internal platform.
  MessageRef
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn contact_accepts_plus_and_digits() {
    let c = Contact::parse(" +15551234 ").unwrap();
    assert_eq!(c.as_str(), "+15551234");
    assert_eq!(Contact::parse("6281234567").unwrap().as_str(), "+6281234567");
  }

  #[test]
  fn contact_rejects_garbage() {
    assert!(Contact::parse("hello").is_err());
    assert!(Contact::parse("+12").is_err());
    assert!(Contact::parse("+1555-1234").is_err());
    assert!(Contact::parse("").is_err());
  }

  #[test]
  fn agent_id_parses_signed_integers() {
    assert_eq!("42".parse::<AgentId>().unwrap(), AgentId(42));
    assert_eq!("-1001".parse::<ChatId>().unwrap(), ChatId(-1001));
    assert!("abc".parse::<AgentId>().is_err());
  }
}

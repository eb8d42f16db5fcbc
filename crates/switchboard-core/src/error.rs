//! Error types for `switchboard-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid contact address: {0:?}")]
  InvalidContact(String),

  #[error("invalid identifier: {0:?}")]
  InvalidId(String),

  #[error("unknown topic status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

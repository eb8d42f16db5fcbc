//! Error type for `switchboard-store-sqlite`.

use switchboard_core::ids::ThreadId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] switchboard_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// No open topic is mapped to the thread.
  #[error("no open topic for thread {0}")]
  TopicNotFound(ThreadId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

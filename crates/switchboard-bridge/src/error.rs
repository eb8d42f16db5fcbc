//! Bridge error taxonomy and the chat replies each failure produces.

use switchboard_core::{ids::ThreadId, transport::TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
  /// The identity store failed or timed out. Nothing was committed by the
  /// failing call.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("transport error: {0}")]
  Transport(#[from] TransportError),

  #[error("not authorized")]
  Unauthorized,

  /// Malformed or unknown command; the message is shown to the agent as is.
  #[error("invalid command: {0}")]
  Validation(String),

  #[error("no open topic for thread {0}")]
  UnknownThread(ThreadId),
}

impl BridgeError {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  /// Short reply sent back into the chat the failing message came from.
  pub fn user_message(&self) -> String {
    match self {
      Self::Store(_) => "❌ Storage is unavailable right now; nothing was changed.".to_owned(),
      Self::NotFound(what) => format!("❌ {what}"),
      Self::Transport(e) => format!("❌ Delivery failed: {e}"),
      Self::Unauthorized => "⛔ You are not allowed to do that.".to_owned(),
      Self::Validation(msg) => msg.clone(),
      Self::UnknownThread(_) => {
        "❌ This thread has no open conversation. Start a conversation first with \
         !chat <number> <message>."
          .to_owned()
      }
    }
  }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

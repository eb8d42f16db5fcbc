//! Collaborator interfaces for the two chat platforms and the broadcast
//! destination, plus the inbound event shapes they produce.
//!
//! Session handling, wire formats and retries belong to the implementations;
//! the bridge only sees "send" and "receive".

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{AgentId, ChatId, Contact, MessageRef, ThreadId};

#[derive(Debug, Clone, Error)]
pub enum TransportError {
  #[error("platform unreachable: {0}")]
  Unreachable(String),

  #[error("platform rejected the request: {0}")]
  Rejected(String),

  #[error("platform call timed out")]
  Timeout,
}

// ─── Inbound events ──────────────────────────────────────────────────────────

/// A message from an external contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
  pub contact: Contact,
  pub text:    String,
}

/// A text message posted on the internal platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
  pub chat_id:    ChatId,
  /// The thread the message was posted in, if the chat has threads.
  pub thread_id:  Option<ThreadId>,
  pub message_id: MessageRef,
  pub sender:     AgentId,
  pub text:       String,
}

impl AgentMessage {
  /// Where replies to this message should go.
  pub fn reply_context(&self) -> ReplyContext {
    ReplyContext {
      chat_id:    self.chat_id,
      thread_id:  self.thread_id,
      message_id: self.message_id,
    }
  }
}

/// The originating chat context of an agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyContext {
  pub chat_id:    ChatId,
  pub thread_id:  Option<ThreadId>,
  pub message_id: MessageRef,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// The external messaging network.
pub trait ExternalTransport: Send + Sync {
  fn send(
    &self,
    contact: Contact,
    text: String,
  ) -> impl Future<Output = Result<(), TransportError>> + Send + '_;
}

/// The internal group-chat platform hosting one thread per contact.
pub trait InternalTransport: Send + Sync {
  /// Post `text` into a thread of the topic-group chat.
  fn post_to_thread(
    &self,
    thread_id: ThreadId,
    text: String,
  ) -> impl Future<Output = Result<MessageRef, TransportError>> + Send + '_;

  /// Allocate a new thread in the topic-group chat.
  fn create_thread(
    &self,
    title: String,
  ) -> impl Future<Output = Result<ThreadId, TransportError>> + Send + '_;

  /// Answer an agent message in its own chat context.
  fn reply(
    &self,
    context: ReplyContext,
    text: String,
  ) -> impl Future<Output = Result<(), TransportError>> + Send + '_;
}

/// Secondary destination receiving a copy of every bridged message.
/// Best-effort: callers log failures and carry on.
pub trait Broadcast: Send + Sync {
  fn post(&self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send + '_;
}

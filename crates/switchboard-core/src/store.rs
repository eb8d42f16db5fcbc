//! The `IdentityStore` trait.
//!
//! Implemented by storage backends (e.g. `switchboard-store-sqlite`). The
//! bridge depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  agent::Agent,
  ids::{AgentId, Contact, ThreadId},
  topic::Topic,
};

/// Durable record of contact ↔ thread mappings and of stored agents.
///
/// Every method is individually atomic. Only open topics are ever returned by
/// the lookups; a closed topic is unreachable.
///
/// All methods return `Send` futures so the trait can be used from tasks
/// spawned on a multi-threaded tokio runtime.
pub trait IdentityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Topics ────────────────────────────────────────────────────────────

  /// The open topic for `contact`, if any.
  fn find_topic_by_contact(
    &self,
    contact: Contact,
  ) -> impl Future<Output = Result<Option<Topic>, Self::Error>> + Send + '_;

  /// The open topic for `thread_id`, if any.
  fn find_topic_by_thread(
    &self,
    thread_id: ThreadId,
  ) -> impl Future<Output = Result<Option<Topic>, Self::Error>> + Send + '_;

  /// Create the mapping for `contact`, or update the display name and thread
  /// of the existing one. Never creates a second row for the same contact.
  fn upsert_topic(
    &self,
    contact: Contact,
    display_name: String,
    thread_id: ThreadId,
  ) -> impl Future<Output = Result<Topic, Self::Error>> + Send + '_;

  /// Close the open topic on `thread_id` and return it with status
  /// [`Closed`](crate::topic::TopicStatus::Closed). Fails with a not-found
  /// error when no open topic has that thread.
  fn close_topic(
    &self,
    thread_id: ThreadId,
  ) -> impl Future<Output = Result<Topic, Self::Error>> + Send + '_;

  /// All open topics, oldest first.
  fn list_topics(&self) -> impl Future<Output = Result<Vec<Topic>, Self::Error>> + Send + '_;

  // ── Agents ────────────────────────────────────────────────────────────

  /// Insert an agent, or replace the initial of an existing one.
  fn add_agent(
    &self,
    agent_id: AgentId,
    initial: String,
  ) -> impl Future<Output = Result<Agent, Self::Error>> + Send + '_;

  /// Remove an agent. Returns `false` if no such agent was stored.
  fn remove_agent(
    &self,
    agent_id: AgentId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_agent(
    &self,
    agent_id: AgentId,
  ) -> impl Future<Output = Result<Option<Agent>, Self::Error>> + Send + '_;

  fn list_agents(&self) -> impl Future<Output = Result<Vec<Agent>, Self::Error>> + Send + '_;

  /// Whether `err` is the "no open topic on that thread" failure of
  /// [`close_topic`](Self::close_topic), as opposed to an I/O failure.
  fn is_not_found(err: &Self::Error) -> bool;
}

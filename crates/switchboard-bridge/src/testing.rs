//! Test-only identity store: the in-memory SQLite store with switches for
//! outages and for pausing a lookup after it has read its row.

use std::sync::atomic::{AtomicBool, Ordering};

use switchboard_core::{
  agent::Agent,
  ids::{AgentId, Contact, ThreadId},
  store::IdentityStore,
  topic::Topic,
};
use switchboard_store_sqlite::SqliteStore;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
pub(crate) enum TestStoreError {
  #[error("store offline")]
  Offline,

  #[error(transparent)]
  Sqlite(#[from] switchboard_store_sqlite::Error),
}

pub(crate) struct TestStore {
  inner:     SqliteStore,
  offline:   AtomicBool,
  hold_find: AtomicBool,
  /// Signalled when a held lookup has its row.
  pub found:   Notify,
  /// Lets a held lookup return.
  pub release: Notify,
}

impl TestStore {
  pub async fn new() -> Self {
    Self {
      inner:     SqliteStore::open_in_memory().await.unwrap(),
      offline:   AtomicBool::new(false),
      hold_find: AtomicBool::new(false),
      found:     Notify::new(),
      release:   Notify::new(),
    }
  }

  pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }

  /// Pause the next `find_topic_by_*` call after the database answered,
  /// until [`release`](Self::release) is notified.
  pub fn hold_next_find(&self) { self.hold_find.store(true, Ordering::SeqCst); }

  fn check(&self) -> Result<(), TestStoreError> {
    if self.offline.load(Ordering::SeqCst) {
      return Err(TestStoreError::Offline);
    }
    Ok(())
  }

  async fn after_find(&self) {
    if self.hold_find.swap(false, Ordering::SeqCst) {
      self.found.notify_one();
      self.release.notified().await;
    }
  }
}

impl IdentityStore for TestStore {
  type Error = TestStoreError;

  async fn find_topic_by_contact(&self, contact: Contact) -> Result<Option<Topic>, TestStoreError> {
    self.check()?;
    let found = self.inner.find_topic_by_contact(contact).await?;
    self.after_find().await;
    Ok(found)
  }

  async fn find_topic_by_thread(&self, thread_id: ThreadId) -> Result<Option<Topic>, TestStoreError> {
    self.check()?;
    let found = self.inner.find_topic_by_thread(thread_id).await?;
    self.after_find().await;
    Ok(found)
  }

  async fn upsert_topic(
    &self,
    contact: Contact,
    display_name: String,
    thread_id: ThreadId,
  ) -> Result<Topic, TestStoreError> {
    self.check()?;
    Ok(self.inner.upsert_topic(contact, display_name, thread_id).await?)
  }

  async fn close_topic(&self, thread_id: ThreadId) -> Result<Topic, TestStoreError> {
    self.check()?;
    Ok(self.inner.close_topic(thread_id).await?)
  }

  async fn list_topics(&self) -> Result<Vec<Topic>, TestStoreError> {
    self.check()?;
    Ok(self.inner.list_topics().await?)
  }

  async fn add_agent(&self, agent_id: AgentId, initial: String) -> Result<Agent, TestStoreError> {
    self.check()?;
    Ok(self.inner.add_agent(agent_id, initial).await?)
  }

  async fn remove_agent(&self, agent_id: AgentId) -> Result<bool, TestStoreError> {
    self.check()?;
    Ok(self.inner.remove_agent(agent_id).await?)
  }

  async fn get_agent(&self, agent_id: AgentId) -> Result<Option<Agent>, TestStoreError> {
    self.check()?;
    Ok(self.inner.get_agent(agent_id).await?)
  }

  async fn list_agents(&self) -> Result<Vec<Agent>, TestStoreError> {
    self.check()?;
    Ok(self.inner.list_agents().await?)
  }

  fn is_not_found(err: &TestStoreError) -> bool {
    matches!(err, TestStoreError::Sqlite(e) if SqliteStore::is_not_found(e))
  }
}

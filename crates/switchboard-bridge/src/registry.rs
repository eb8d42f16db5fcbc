//! The topic registry: get-or-create with per-contact exclusion, over a
//! read-through cache of the identity store.
//!
//! The cache is advisory. A miss always falls back to the store before
//! absence is concluded, so an empty cache after a restart can never lead to
//! a duplicate topic. Entries leave the cache only when a topic is closed,
//! and a store read that overlapped a close is returned but not cached.

use std::{
  collections::HashMap,
  future::Future,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use switchboard_core::{
  ids::{Contact, ThreadId},
  store::IdentityStore,
  topic::Topic,
  transport::TransportError,
};
use tracing::{debug, info};

use crate::{
  deadline::{store_call, transport_call},
  error::{BridgeError, Result},
};

/// Outcome of [`TopicRegistry::get_or_create_topic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Existing(Topic),
  Created(Topic),
}

impl Resolution {
  pub fn was_created(&self) -> bool { matches!(self, Self::Created(_)) }

  pub fn topic(&self) -> &Topic {
    match self {
      Self::Existing(t) | Self::Created(t) => t,
    }
  }

  pub fn into_topic(self) -> Topic {
    match self {
      Self::Existing(t) | Self::Created(t) => t,
    }
  }
}

#[derive(Default)]
struct TopicCache {
  by_contact: HashMap<Contact, Topic>,
  by_thread:  HashMap<ThreadId, Contact>,
  /// Bumped on every eviction.
  closes:     u64,
}

impl TopicCache {
  /// Repopulate from a store read taken when `closes` was `seen`. A close
  /// in between may have removed the row the read returned.
  fn refill(&mut self, topic: Topic, seen: u64) {
    if self.closes == seen {
      self.insert(topic);
    }
  }

  fn insert(&mut self, topic: Topic) {
    if let Some(other) = self.by_thread.get(&topic.thread_id)
      && *other != topic.contact
    {
      let other = other.clone();
      self.by_contact.remove(&other);
    }
    if let Some(previous) = self.by_contact.get(&topic.contact)
      && previous.thread_id != topic.thread_id
    {
      let stale = previous.thread_id;
      self.by_thread.remove(&stale);
    }
    self.by_thread.insert(topic.thread_id, topic.contact.clone());
    self.by_contact.insert(topic.contact.clone(), topic);
  }

  fn by_contact(&self, contact: &Contact) -> Option<Topic> {
    self.by_contact.get(contact).cloned()
  }

  fn by_thread(&self, thread_id: ThreadId) -> Option<Topic> {
    self
      .by_thread
      .get(&thread_id)
      .and_then(|c| self.by_contact.get(c))
      .cloned()
  }

  fn evict(&mut self, topic: &Topic) {
    self.closes += 1;
    self.by_thread.remove(&topic.thread_id);
    if self
      .by_contact
      .get(&topic.contact)
      .is_some_and(|t| t.thread_id == topic.thread_id)
    {
      self.by_contact.remove(&topic.contact);
    }
  }
}

type ContactLock = Arc<tokio::sync::Mutex<()>>;

pub struct TopicRegistry<S> {
  store:             Arc<S>,
  store_timeout:     Duration,
  transport_timeout: Duration,
  cache:             Mutex<TopicCache>,
  /// One lock per contact with a creation or close in flight.
  contact_locks:     Mutex<HashMap<Contact, ContactLock>>,
}

impl<S: IdentityStore> TopicRegistry<S> {
  pub fn new(store: Arc<S>, store_timeout: Duration, transport_timeout: Duration) -> Self {
    Self {
      store,
      store_timeout,
      transport_timeout,
      cache: Mutex::default(),
      contact_locks: Mutex::default(),
    }
  }

  // ── Lookups ───────────────────────────────────────────────────────────────

  /// Cache first, then the store; a store hit repopulates the cache.
  pub async fn lookup_by_contact(&self, contact: &Contact) -> Result<Option<Topic>> {
    let seen = {
      let cache = self.cache();
      if let Some(topic) = cache.by_contact(contact) {
        return Ok(Some(topic));
      }
      cache.closes
    };
    let found = store_call(
      self.store_timeout,
      self.store.find_topic_by_contact(contact.clone()),
    )
    .await?;
    if let Some(topic) = &found {
      self.cache().refill(topic.clone(), seen);
    }
    Ok(found)
  }

  /// Cache first, then the store; a store hit repopulates the cache.
  pub async fn lookup_by_thread(&self, thread_id: ThreadId) -> Result<Option<Topic>> {
    let seen = {
      let cache = self.cache();
      if let Some(topic) = cache.by_thread(thread_id) {
        return Ok(Some(topic));
      }
      cache.closes
    };
    let found = store_call(self.store_timeout, self.store.find_topic_by_thread(thread_id)).await?;
    if let Some(topic) = &found {
      self.cache().refill(topic.clone(), seen);
    }
    Ok(found)
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  /// Return the open topic for `contact`, creating one if none exists.
  ///
  /// Creation runs under the contact's lock: the store is checked again
  /// once the lock is held, and only then is `create_thread` invoked and
  /// the mapping written. Unrelated contacts never wait on each other.
  pub async fn get_or_create_topic<F, Fut>(
    &self,
    contact: &Contact,
    default_display_name: &str,
    create_thread: F,
  ) -> Result<Resolution>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ThreadId, TransportError>>,
  {
    if let Some(topic) = self.lookup_by_contact(contact).await? {
      return Ok(Resolution::Existing(topic));
    }
    self
      .exclusive(contact, self.create_locked(contact, default_display_name, create_thread))
      .await
  }

  async fn create_locked<F, Fut>(
    &self,
    contact: &Contact,
    default_display_name: &str,
    create_thread: F,
  ) -> Result<Resolution>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ThreadId, TransportError>>,
  {
    // A concurrent creator may have finished while we waited for the lock.
    let existing = store_call(
      self.store_timeout,
      self.store.find_topic_by_contact(contact.clone()),
    )
    .await?;
    if let Some(topic) = existing {
      debug!(contact = %contact, thread = %topic.thread_id, "topic created concurrently");
      self.cache().insert(topic.clone());
      return Ok(Resolution::Existing(topic));
    }

    let thread_id = transport_call(self.transport_timeout, create_thread()).await?;
    let topic = store_call(
      self.store_timeout,
      self
        .store
        .upsert_topic(contact.clone(), default_display_name.to_owned(), thread_id),
    )
    .await?;

    info!(contact = %contact, thread = %thread_id, "topic opened");
    self.cache().insert(topic.clone());
    Ok(Resolution::Created(topic))
  }

  /// Close the open topic on `thread_id` and evict it from the cache.
  pub async fn close_topic(&self, thread_id: ThreadId) -> Result<Topic> {
    let Some(topic) = self.lookup_by_thread(thread_id).await? else {
      return Err(no_open_topic(thread_id));
    };
    self
      .exclusive(&topic.contact, self.close_locked(thread_id))
      .await
  }

  async fn close_locked(&self, thread_id: ThreadId) -> Result<Topic> {
    let closed = match tokio::time::timeout(self.store_timeout, self.store.close_topic(thread_id))
      .await
      .map_err(BridgeError::store)?
    {
      Ok(topic) => topic,
      Err(e) if S::is_not_found(&e) => {
        self.evict_thread(thread_id);
        return Err(no_open_topic(thread_id));
      }
      Err(e) => return Err(BridgeError::store(e)),
    };

    self.cache().evict(&closed);
    info!(contact = %closed.contact, thread = %thread_id, "topic closed");
    Ok(closed)
  }

  /// Change the display name of the open topic on `thread_id`.
  pub async fn rename_topic(&self, thread_id: ThreadId, display_name: &str) -> Result<Topic> {
    let Some(topic) = self.lookup_by_thread(thread_id).await? else {
      return Err(no_open_topic(thread_id));
    };
    self
      .exclusive(&topic.contact, self.rename_locked(thread_id, display_name))
      .await
  }

  async fn rename_locked(&self, thread_id: ThreadId, display_name: &str) -> Result<Topic> {
    // Re-read under the lock so a concurrent close is not undone by the
    // upsert below.
    let current = store_call(self.store_timeout, self.store.find_topic_by_thread(thread_id))
      .await?
      .ok_or_else(|| no_open_topic(thread_id))?;

    let topic = store_call(
      self.store_timeout,
      self
        .store
        .upsert_topic(current.contact, display_name.to_owned(), thread_id),
    )
    .await?;
    self.cache().insert(topic.clone());
    Ok(topic)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  fn cache(&self) -> MutexGuard<'_, TopicCache> {
    self.cache.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn evict_thread(&self, thread_id: ThreadId) {
    let mut cache = self.cache();
    if let Some(topic) = cache.by_thread(thread_id) {
      cache.evict(&topic);
    }
  }

  /// Run `fut` while holding `contact`'s lock.
  async fn exclusive<T>(&self, contact: &Contact, fut: impl Future<Output = T>) -> T {
    let lock = self.contact_lock(contact);
    let guard = lock.clone().lock_owned().await;
    let out = fut.await;
    drop(guard);
    self.release_contact_lock(contact, lock);
    out
  }

  fn contact_lock(&self, contact: &Contact) -> ContactLock {
    self
      .locks()
      .entry(contact.clone())
      .or_default()
      .clone()
  }

  /// Drop the table entry once nobody else holds or awaits the lock.
  fn release_contact_lock(&self, contact: &Contact, lock: ContactLock) {
    let mut locks = self.locks();
    // One reference in the table, one here.
    if Arc::strong_count(&lock) == 2 {
      locks.remove(contact);
    }
  }

  fn locks(&self) -> MutexGuard<'_, HashMap<Contact, ContactLock>> {
    self
      .contact_locks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  #[cfg(test)]
  fn lock_table_len(&self) -> usize { self.locks().len() }
}

fn no_open_topic(thread_id: ThreadId) -> BridgeError {
  BridgeError::NotFound(format!("There is no open conversation in thread {thread_id}."))
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

  use switchboard_store_sqlite::SqliteStore;
  use tokio::task::JoinSet;

  use super::*;
  use crate::testing::TestStore;

  async fn registry() -> (Arc<SqliteStore>, TopicRegistry<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let registry = TopicRegistry::new(
      store.clone(),
      Duration::from_secs(5),
      Duration::from_secs(5),
    );
    (store, registry)
  }

  async fn held_registry() -> (Arc<TestStore>, Arc<TopicRegistry<TestStore>>) {
    let store = Arc::new(TestStore::new().await);
    let registry = TopicRegistry::new(
      store.clone(),
      Duration::from_secs(5),
      Duration::from_secs(5),
    );
    (store, Arc::new(registry))
  }

  fn contact(s: &str) -> Contact { Contact::parse(s).unwrap() }

  async fn refuse() -> std::result::Result<ThreadId, TransportError> {
    Err(TransportError::Rejected("thread must not be created".into()))
  }

  #[tokio::test]
  async fn creates_once_then_returns_existing() {
    let (_, reg) = registry().await;
    let c = contact("+15551234");

    let first = reg
      .get_or_create_topic(&c, c.as_str(), || async { Ok(ThreadId(10)) })
      .await
      .unwrap();
    assert!(first.was_created());

    let second = reg
      .get_or_create_topic(&c, c.as_str(), refuse)
      .await
      .unwrap();
    assert_eq!(second, Resolution::Existing(first.into_topic()));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_creators_produce_one_topic() {
    let (store, reg) = registry().await;
    let reg = Arc::new(reg);
    let created = Arc::new(AtomicUsize::new(0));
    let next_thread = Arc::new(AtomicI64::new(100));
    let c = contact("+15551234");

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
      let (reg, created, next_thread, c) =
        (reg.clone(), created.clone(), next_thread.clone(), c.clone());
      tasks.spawn(async move {
        reg
          .get_or_create_topic(&c, c.as_str(), || async move {
            created.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(ThreadId(next_thread.fetch_add(1, Ordering::SeqCst)))
          })
          .await
          .unwrap()
          .into_topic()
      });
    }

    let mut threads = Vec::new();
    while let Some(res) = tasks.join_next().await {
      threads.push(res.unwrap().thread_id);
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(threads.iter().all(|t| *t == threads[0]));
    assert_eq!(store.list_topics().await.unwrap().len(), 1);
    assert_eq!(reg.lock_table_len(), 0);
  }

  #[tokio::test]
  async fn unrelated_contacts_do_not_share_a_lock() {
    let (_, reg) = registry().await;
    let reg = Arc::new(reg);
    let (a, b) = (contact("+15551111"), contact("+15552222"));

    // Hold a's lock while b is created; b must not wait on it.
    let held = reg.contact_lock(&a).lock_owned().await;
    let resolution = tokio::time::timeout(
      Duration::from_secs(1),
      reg.get_or_create_topic(&b, b.as_str(), || async { Ok(ThreadId(2)) }),
    )
    .await
    .expect("b blocked behind a")
    .unwrap();
    assert!(resolution.was_created());
    drop(held);
  }

  #[tokio::test]
  async fn thread_creation_failure_stores_nothing() {
    let (store, reg) = registry().await;
    let c = contact("+15551234");

    let err = reg
      .get_or_create_topic(&c, c.as_str(), || async {
        Err(TransportError::Unreachable("down".into()))
      })
      .await
      .unwrap_err();
    assert!(matches!(err, BridgeError::Transport(_)));
    assert!(store.find_topic_by_contact(c).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn empty_cache_falls_back_to_store() {
    let (store, reg) = registry().await;
    let c = contact("+15551234");
    store
      .upsert_topic(c.clone(), "Alice".into(), ThreadId(5))
      .await
      .unwrap();

    let by_thread = reg.lookup_by_thread(ThreadId(5)).await.unwrap().unwrap();
    assert_eq!(by_thread.contact, c);

    let resolution = reg
      .get_or_create_topic(&c, c.as_str(), refuse)
      .await
      .unwrap();
    assert!(!resolution.was_created());
  }

  #[tokio::test]
  async fn close_evicts_and_second_close_is_not_found() {
    let (store, reg) = registry().await;
    let c = contact("+15551234");
    reg
      .get_or_create_topic(&c, c.as_str(), || async { Ok(ThreadId(9)) })
      .await
      .unwrap();

    let closed = reg.close_topic(ThreadId(9)).await.unwrap();
    assert_eq!(closed.contact, c);

    assert!(reg.lookup_by_thread(ThreadId(9)).await.unwrap().is_none());
    assert!(reg.lookup_by_contact(&c).await.unwrap().is_none());
    assert!(store.find_topic_by_thread(ThreadId(9)).await.unwrap().is_none());
    assert!(matches!(
      reg.close_topic(ThreadId(9)).await,
      Err(BridgeError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn closed_contact_gets_a_fresh_topic() {
    let (_, reg) = registry().await;
    let c = contact("+15551234");
    reg
      .get_or_create_topic(&c, c.as_str(), || async { Ok(ThreadId(9)) })
      .await
      .unwrap();
    reg.close_topic(ThreadId(9)).await.unwrap();

    let reopened = reg
      .get_or_create_topic(&c, c.as_str(), || async { Ok(ThreadId(11)) })
      .await
      .unwrap();
    assert!(reopened.was_created());
    assert_eq!(reopened.topic().thread_id, ThreadId(11));
  }

  #[tokio::test]
  async fn rename_updates_cache_and_store() {
    let (store, reg) = registry().await;
    let c = contact("+15551234");
    reg
      .get_or_create_topic(&c, c.as_str(), || async { Ok(ThreadId(3)) })
      .await
      .unwrap();

    let renamed = reg.rename_topic(ThreadId(3), "Alice").await.unwrap();
    assert_eq!(renamed.display_name, "Alice");
    assert_eq!(
      reg.lookup_by_contact(&c).await.unwrap().unwrap().display_name,
      "Alice"
    );
    assert_eq!(
      store.find_topic_by_contact(c).await.unwrap().unwrap().display_name,
      "Alice"
    );
  }

  #[tokio::test]
  async fn lookup_overlapping_a_close_does_not_recache() {
    let (store, reg) = held_registry().await;
    let c = contact("+15551234");
    store
      .upsert_topic(c.clone(), c.as_str().into(), ThreadId(7))
      .await
      .unwrap();

    // A lookup reads the row, then stalls before caching it.
    store.hold_next_find();
    let lookup = tokio::spawn({
      let reg = reg.clone();
      async move { reg.lookup_by_thread(ThreadId(7)).await }
    });
    store.found.notified().await;

    reg.close_topic(ThreadId(7)).await.unwrap();
    store.release.notify_one();
    lookup.await.unwrap().unwrap();

    assert!(reg.lookup_by_thread(ThreadId(7)).await.unwrap().is_none());
    assert!(reg.lookup_by_contact(&c).await.unwrap().is_none());
    let reopened = reg
      .get_or_create_topic(&c, c.as_str(), || async { Ok(ThreadId(8)) })
      .await
      .unwrap();
    assert!(reopened.was_created());
  }

  #[tokio::test]
  async fn contact_lookup_overlapping_a_close_does_not_recache() {
    let (store, reg) = held_registry().await;
    let c = contact("+15551234");
    store
      .upsert_topic(c.clone(), c.as_str().into(), ThreadId(7))
      .await
      .unwrap();

    store.hold_next_find();
    let lookup = tokio::spawn({
      let (reg, c) = (reg.clone(), c.clone());
      async move { reg.lookup_by_contact(&c).await }
    });
    store.found.notified().await;

    reg.close_topic(ThreadId(7)).await.unwrap();
    store.release.notify_one();
    lookup.await.unwrap().unwrap();

    let reopened = reg
      .get_or_create_topic(&c, c.as_str(), || async { Ok(ThreadId(8)) })
      .await
      .unwrap();
    assert!(reopened.was_created());
    assert_eq!(reopened.topic().thread_id, ThreadId(8));
    assert!(reg.lookup_by_thread(ThreadId(7)).await.unwrap().is_none());
  }
}

//! [`SqliteStore`] — the SQLite implementation of [`IdentityStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use switchboard_core::{
  agent::Agent,
  ids::{AgentId, Contact, ThreadId},
  store::IdentityStore,
  topic::{Topic, TopicStatus},
};

use crate::{
  Error, Result,
  encode::{AGENT_COLUMNS, RawAgent, RawTopic, TOPIC_COLUMNS, encode_dt, encode_status},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An identity store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one topic row matching `column = value`.
  async fn topic_where(
    &self,
    column: &'static str,
    value: rusqlite::types::Value,
  ) -> Result<Option<Topic>> {
    let sql = format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE {column} = ?1");

    let raw: Option<RawTopic> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], RawTopic::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTopic::into_topic).transpose()
  }
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = Error;

  // ── Topics ────────────────────────────────────────────────────────────────

  async fn find_topic_by_contact(&self, contact: Contact) -> Result<Option<Topic>> {
    self
      .topic_where("contact", contact.as_str().to_owned().into())
      .await
  }

  async fn find_topic_by_thread(&self, thread_id: ThreadId) -> Result<Option<Topic>> {
    self.topic_where("thread_id", thread_id.0.into()).await
  }

  async fn upsert_topic(
    &self,
    contact:      Contact,
    display_name: String,
    thread_id:    ThreadId,
  ) -> Result<Topic> {
    let contact_str = contact.as_str().to_owned();
    let status_str  = encode_status(TopicStatus::Open);
    let at_str      = encode_dt(Utc::now());
    let select      = format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE contact = ?1");

    let raw: RawTopic = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // `opened_at` is kept from the first insert.
        tx.execute(
          "INSERT INTO topics (contact, display_name, thread_id, status, opened_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (contact) DO UPDATE SET
             display_name = excluded.display_name,
             thread_id    = excluded.thread_id",
          rusqlite::params![contact_str, display_name, thread_id.0, status_str, at_str],
        )?;
        let raw = tx.query_row(&select, rusqlite::params![contact_str], RawTopic::from_row)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_topic()
  }

  async fn close_topic(&self, thread_id: ThreadId) -> Result<Topic> {
    let select = format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE thread_id = ?1");

    let raw: Option<RawTopic> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(&select, rusqlite::params![thread_id.0], RawTopic::from_row)
          .optional()?;
        if raw.is_some() {
          tx.execute(
            "DELETE FROM topics WHERE thread_id = ?1",
            rusqlite::params![thread_id.0],
          )?;
        }
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let mut topic = raw.ok_or(Error::TopicNotFound(thread_id))?.into_topic()?;
    topic.status = TopicStatus::Closed;
    Ok(topic)
  }

  async fn list_topics(&self) -> Result<Vec<Topic>> {
    let sql = format!("SELECT {TOPIC_COLUMNS} FROM topics ORDER BY opened_at, contact");

    let raws: Vec<RawTopic> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawTopic::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTopic::into_topic).collect()
  }

  // ── Agents ────────────────────────────────────────────────────────────────

  async fn add_agent(&self, agent_id: AgentId, initial: String) -> Result<Agent> {
    let at_str = encode_dt(Utc::now());
    let select = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE agent_id = ?1");

    let raw: RawAgent = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO agents (agent_id, initial, added_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (agent_id) DO UPDATE SET initial = excluded.initial",
          rusqlite::params![agent_id.0, initial, at_str],
        )?;
        let raw = tx.query_row(&select, rusqlite::params![agent_id.0], RawAgent::from_row)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_agent()
  }

  async fn remove_agent(&self, agent_id: AgentId) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM agents WHERE agent_id = ?1",
          rusqlite::params![agent_id.0],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn get_agent(&self, agent_id: AgentId) -> Result<Option<Agent>> {
    let sql = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE agent_id = ?1");

    let raw: Option<RawAgent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![agent_id.0], RawAgent::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAgent::into_agent).transpose()
  }

  async fn list_agents(&self) -> Result<Vec<Agent>> {
    let sql = format!("SELECT {AGENT_COLUMNS} FROM agents ORDER BY agent_id");

    let raws: Vec<RawAgent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawAgent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAgent::into_agent).collect()
  }

  fn is_not_found(err: &Error) -> bool { matches!(err, Error::TopicNotFound(_)) }
}

//! Telegram Bot API adapter: the internal platform and the broadcast
//! destination.
//!
//! Contact threads are forum topics of one supergroup; the broadcast
//! destination is a plain chat. Inbound messages arrive by long polling.

use std::time::Duration;

use anyhow::Context as _;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use switchboard_core::{
  ids::{AgentId, ChatId, MessageRef, ThreadId},
  transport::{AgentMessage, Broadcast, InternalTransport, ReplyContext, TransportError},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Forum topic names are capped by Telegram.
const MAX_TOPIC_NAME: usize = 128;

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
  pub token:             String,
  /// Chat receiving a copy of every bridged message.
  pub broadcast_chat:    ChatId,
  #[serde(default = "default_api_base")]
  pub api_base:          String,
  #[serde(default = "default_poll_timeout")]
  pub poll_timeout_secs: u64,
}

fn default_api_base() -> String { "https://api.telegram.org".to_owned() }

fn default_poll_timeout() -> u64 { 30 }

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<R> {
  ok:          bool,
  result:      Option<R>,
  description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct User {
  pub id:       i64,
  #[serde(default)]
  pub is_bot:   bool,
  pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
  id: i64,
}

#[derive(Debug, Deserialize)]
struct Message {
  message_id:        i64,
  message_thread_id: Option<i64>,
  #[serde(default)]
  is_topic_message:  bool,
  from:              Option<User>,
  chat:              Chat,
  text:              Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
  update_id: i64,
  message:   Option<Message>,
}

#[derive(Debug, Deserialize)]
struct ForumTopic {
  message_thread_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
  chat_id:           i64,
  text:              &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  message_thread_id: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  reply_parameters:  Option<serde_json::Value>,
}

impl Message {
  /// Text messages from humans, as agent messages. Thread ids are kept only
  /// for forum-topic messages; in plain groups the field names a reply chain.
  fn into_agent_message(self) -> Option<AgentMessage> {
    let from = self.from.filter(|u| !u.is_bot)?;
    let text = self.text?;
    Some(AgentMessage {
      chat_id: ChatId(self.chat.id),
      thread_id: self
        .message_thread_id
        .filter(|_| self.is_topic_message)
        .map(ThreadId),
      message_id: MessageRef(self.message_id),
      sender: AgentId(from.id),
      text,
    })
  }
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Bot API client bound to the topic-group chat.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TelegramClient {
  client:     Client,
  base:       String,
  topic_chat: ChatId,
  poll_secs:  u64,
}

impl TelegramClient {
  pub fn new(config: &TelegramConfig, topic_chat: ChatId) -> anyhow::Result<Self> {
    let client = Client::builder()
      // Must outlive a long poll.
      .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self {
      client,
      base: format!("{}/bot{}", config.api_base.trim_end_matches('/'), config.token),
      topic_chat,
      poll_secs: config.poll_timeout_secs,
    })
  }

  async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TransportError>
  where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
  {
    let resp = self
      .client
      .post(format!("{}/{method}", self.base))
      .json(params)
      .send()
      .await
      .map_err(|e| TransportError::Unreachable(format!("{method}: {}", e.without_url())))?;

    let envelope: Envelope<R> = resp
      .json()
      .await
      .map_err(|e| TransportError::Rejected(format!("{method}: {}", e.without_url())))?;

    match envelope {
      Envelope { ok: true, result: Some(result), .. } => Ok(result),
      Envelope { description, .. } => Err(TransportError::Rejected(format!(
        "{method}: {}",
        description.unwrap_or_else(|| "no description".to_owned())
      ))),
    }
  }

  /// `getMe` — used as the startup reachability check.
  pub async fn get_me(&self) -> Result<User, TransportError> {
    self.call("getMe", &json!({})).await
  }

  async fn send_message(
    &self,
    chat: ChatId,
    thread: Option<ThreadId>,
    reply_to: Option<MessageRef>,
    text: &str,
  ) -> Result<MessageRef, TransportError> {
    let body = SendMessage {
      chat_id: chat.0,
      text,
      message_thread_id: thread.map(|t| t.0),
      reply_parameters: reply_to.map(|m| {
        json!({ "message_id": m.0, "allow_sending_without_reply": true })
      }),
    };
    let sent: Message = self.call("sendMessage", &body).await?;
    Ok(MessageRef(sent.message_id))
  }

  /// A broadcast destination posting into `chat`.
  pub fn broadcast(&self, chat: ChatId) -> TelegramBroadcast {
    TelegramBroadcast { client: self.clone(), chat }
  }

  /// Long-poll `getUpdates` and forward text messages until `events` closes.
  /// Errors are logged and retried after a short pause.
  pub async fn poll(self, events: mpsc::Sender<AgentMessage>) {
    let mut offset = 0_i64;
    loop {
      let params = json!({
        "offset": offset,
        "timeout": self.poll_secs,
        "allowed_updates": ["message"],
      });
      let updates: Vec<Update> = match self.call("getUpdates", &params).await {
        Ok(updates) => updates,
        Err(e) => {
          warn!(error = %e, "getUpdates failed");
          tokio::time::sleep(Duration::from_secs(3)).await;
          continue;
        }
      };

      for update in updates {
        offset = offset.max(update.update_id + 1);
        let Some(msg) = update.message.and_then(Message::into_agent_message) else {
          continue;
        };
        debug!(chat = %msg.chat_id, sender = %msg.sender, "telegram message received");
        if events.send(msg).await.is_err() {
          info!("internal event channel closed; stopping poller");
          return;
        }
      }
    }
  }
}

impl InternalTransport for TelegramClient {
  async fn post_to_thread(&self, thread_id: ThreadId, text: String) -> Result<MessageRef, TransportError> {
    self
      .send_message(self.topic_chat, Some(thread_id), None, &text)
      .await
  }

  async fn create_thread(&self, title: String) -> Result<ThreadId, TransportError> {
    let name: String = title.chars().take(MAX_TOPIC_NAME).collect();
    let topic: ForumTopic = self
      .call(
        "createForumTopic",
        &json!({ "chat_id": self.topic_chat.0, "name": name }),
      )
      .await?;
    Ok(ThreadId(topic.message_thread_id))
  }

  async fn reply(&self, context: ReplyContext, text: String) -> Result<(), TransportError> {
    self
      .send_message(
        context.chat_id,
        context.thread_id,
        Some(context.message_id),
        &text,
      )
      .await
      .map(|_| ())
  }
}

/// The broadcast destination as a Telegram chat.
#[derive(Clone)]
pub struct TelegramBroadcast {
  client: TelegramClient,
  chat:   ChatId,
}

impl Broadcast for TelegramBroadcast {
  async fn post(&self, text: String) -> Result<(), TransportError> {
    self
      .client
      .send_message(self.chat, None, None, &text)
      .await
      .map(|_| ())
  }
}

//! Entry point for internal-platform messages: commands, thread replies, or
//! nothing.
//!
//! Every failure is answered in the chat context the message came from.
//! Validation and authorization failures change no state.

use std::fmt::Write as _;

use switchboard_core::{
  agent::Role,
  ids::{AgentId, ThreadId},
  store::IdentityStore,
  transport::{AgentMessage, Broadcast, ExternalTransport, InternalTransport},
};
use tracing::{debug, info, warn};

use crate::{
  Bridge,
  command::{Access, Command, HELP, Invocation},
  deadline::{store_call, transport_call},
  error::{BridgeError, Result},
};

impl<S, X, T, B> Bridge<S, X, T, B>
where
  S: IdentityStore + 'static,
  X: ExternalTransport + 'static,
  T: InternalTransport + 'static,
  B: Broadcast + 'static,
{
  /// Handle one message from the internal platform.
  ///
  /// The error, if any, has already been reported to the sender; it is
  /// returned for logging.
  pub async fn handle_agent_message(&self, msg: AgentMessage) -> Result<()> {
    let outcome = if let Some(invocation) = Invocation::from_text(&msg.text) {
      self.run_command(&msg, &invocation).await
    } else if let Some(thread_id) = self.topic_thread(&msg) {
      self.relay_reply(&msg, thread_id).await
    } else {
      return Ok(());
    };

    match outcome {
      Ok(Some(text)) => {
        self.reply(&msg, text).await;
        Ok(())
      }
      Ok(None) => Ok(()),
      Err(e) => {
        debug!(sender = %msg.sender, error = %e, "agent message failed");
        self.reply(&msg, e.user_message()).await;
        Err(e)
      }
    }
  }

  async fn relay_reply(&self, msg: &AgentMessage, thread_id: ThreadId) -> Result<Option<String>> {
    self.authorize(msg.sender, Access::Agent).await?;
    self
      .reply_to_contact(msg.sender, thread_id, msg.text.trim())
      .await?;
    Ok(None)
  }

  async fn run_command(
    &self,
    msg: &AgentMessage,
    invocation: &Invocation<'_>,
  ) -> Result<Option<String>> {
    self.authorize(msg.sender, invocation.access()).await?;

    match invocation.parse()? {
      Command::Help => Ok(Some(HELP.to_owned())),

      Command::Add { agent_id, initial } => {
        let agent = store_call(
          self.config.store_timeout(),
          self.store.add_agent(agent_id, initial),
        )
        .await?;
        info!(by = %msg.sender, agent = %agent.agent_id, "agent added");
        Ok(Some(format!(
          "✅ Agent {} saved with initial {}.",
          agent.agent_id, agent.initial
        )))
      }

      Command::Remove { agent_id } => {
        let removed = store_call(
          self.config.store_timeout(),
          self.store.remove_agent(agent_id),
        )
        .await?;
        if !removed {
          return Err(BridgeError::NotFound(format!("Agent {agent_id} is not registered.")));
        }
        info!(by = %msg.sender, agent = %agent_id, "agent removed");
        Ok(Some(format!("✅ Agent {agent_id} removed.")))
      }

      Command::Chat { contact, message } => {
        self.send_to_contact(msg.sender, &contact, &message).await?;
        Ok(None)
      }

      Command::Close => {
        let thread_id = self.require_topic_thread(msg, "!close")?;
        let topic = self.registry.close_topic(thread_id).await?;
        Ok(Some(format!("✅ Conversation with {} closed.", topic.label())))
      }

      Command::Name { display_name } => {
        let thread_id = self.require_topic_thread(msg, "!name")?;
        let topic = self
          .registry
          .rename_topic(thread_id, &display_name)
          .await?;
        Ok(Some(format!("✅ This conversation is now {}.", topic.label())))
      }

      Command::Agents => {
        let agents = store_call(self.config.store_timeout(), self.store.list_agents()).await?;
        let mut out = String::from("Superadmins:");
        for id in &self.config.superadmins {
          let _ = write!(out, "\n• {id}");
        }
        out.push_str("\nAgents:");
        if agents.is_empty() {
          out.push_str("\n(none)");
        }
        for agent in agents {
          let _ = write!(out, "\n• {} — {}", agent.agent_id, agent.initial);
        }
        Ok(Some(out))
      }

      Command::Topics => {
        let topics = store_call(self.config.store_timeout(), self.store.list_topics()).await?;
        if topics.is_empty() {
          return Ok(Some("No open conversations.".to_owned()));
        }
        let mut out = String::from("Open conversations:");
        for topic in topics {
          let _ = write!(out, "\n• {} — thread {}", topic.label(), topic.thread_id);
        }
        Ok(Some(out))
      }
    }
  }

  async fn authorize(&self, sender: AgentId, required: Access) -> Result<()> {
    if required == Access::Anyone {
      return Ok(());
    }
    let role = self.role_of(sender).await?;
    if !required.permits(role) {
      warn!(sender = %sender, ?role, ?required, "message refused");
      return Err(BridgeError::Unauthorized);
    }
    Ok(())
  }

  /// Superadmins come from config, members from the store; anyone else is
  /// unrecognized.
  async fn role_of(&self, sender: AgentId) -> Result<Option<Role>> {
    if self.config.is_superadmin(sender) {
      return Ok(Some(Role::Superadmin));
    }
    let agent = store_call(self.config.store_timeout(), self.store.get_agent(sender)).await?;
    Ok(agent.map(|_| Role::Member))
  }

  /// The thread a message was posted in, if it was posted inside the
  /// topic-group chat.
  fn topic_thread(&self, msg: &AgentMessage) -> Option<ThreadId> {
    if msg.chat_id == self.config.topic_chat { msg.thread_id } else { None }
  }

  fn require_topic_thread(&self, msg: &AgentMessage, command: &str) -> Result<ThreadId> {
    self.topic_thread(msg).ok_or_else(|| {
      BridgeError::Validation(format!("❌ {command} must be sent inside a conversation thread."))
    })
  }

  async fn reply(&self, msg: &AgentMessage, text: String) {
    if let Err(e) = transport_call(
      self.config.transport_timeout(),
      self.internal.reply(msg.reply_context(), text),
    )
    .await
    {
      warn!(chat = %msg.chat_id, error = %e, "could not reply to agent");
    }
  }
}

//! Agent command grammar.
//!
//! | command | args | access |
//! |---------|------|--------|
//! | `!add`    | `<agent_id> <initial>` | superadmin |
//! | `!rm`     | `<agent_id>` | superadmin |
//! | `!chat`   | `<number> <message...>` | agent |
//! | `!close`  | — (inside a topic thread) | agent |
//! | `!name`   | `<display name...>` (inside a topic thread) | agent |
//! | `!agents` | — | agent |
//! | `!topics` | — | agent |
//! | `!help`   | — | anyone |

use switchboard_core::{
  agent::Role,
  ids::{AgentId, Contact},
};

use crate::error::BridgeError;

pub const COMMAND_PREFIX: char = '!';

/// Who may issue a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Anyone,
  Agent,
  Superadmin,
}

impl Access {
  /// Whether a sender with `role` (`None` for strangers) may proceed.
  pub fn permits(self, role: Option<Role>) -> bool {
    match self {
      Self::Anyone => true,
      Self::Agent => role.is_some(),
      Self::Superadmin => role == Some(Role::Superadmin),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Add { agent_id: AgentId, initial: String },
  Remove { agent_id: AgentId },
  Chat { contact: Contact, message: String },
  Close,
  Name { display_name: String },
  Agents,
  Topics,
  Help,
}

/// A prefixed message split into its lower-cased command word and the raw
/// argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
  pub name: String,
  pub args: &'a str,
}

impl<'a> Invocation<'a> {
  /// `None` unless `text` starts with [`COMMAND_PREFIX`]; leading
  /// whitespace makes it plain text.
  pub fn from_text(text: &'a str) -> Option<Self> {
    let body = text.strip_prefix(COMMAND_PREFIX)?;
    let (name, args) = split_token(body);
    Some(Self { name: name.to_lowercase(), args })
  }

  /// Unknown commands are open to anyone so they get the "unrecognized"
  /// reply rather than an authorization error.
  pub fn access(&self) -> Access {
    match self.name.as_str() {
      "add" | "rm" => Access::Superadmin,
      "chat" | "close" | "name" | "agents" | "topics" => Access::Agent,
      _ => Access::Anyone,
    }
  }

  pub fn parse(&self) -> Result<Command, BridgeError> {
    let args: Vec<&str> = self.args.split_whitespace().collect();
    match self.name.as_str() {
      "add" => match args.as_slice() {
        [id, initial] => Ok(Command::Add {
          agent_id: parse_agent_id(id)?,
          initial:  (*initial).to_owned(),
        }),
        _ => Err(usage("!add <agent_id> <initial>")),
      },
      "rm" => match args.as_slice() {
        [id] => Ok(Command::Remove { agent_id: parse_agent_id(id)? }),
        _ => Err(usage("!rm <agent_id>")),
      },
      "chat" => {
        let (number, message) = split_token(self.args);
        let message = message.trim();
        if number.is_empty() || message.is_empty() {
          return Err(usage("!chat <number> <message>"));
        }
        let contact = Contact::parse(number).map_err(|_| {
          BridgeError::Validation(format!(
            "❌ {number:?} is not a valid number. Use digits with an optional leading +."
          ))
        })?;
        Ok(Command::Chat { contact, message: message.to_owned() })
      }
      "name" => {
        let display_name = self.args.trim();
        if display_name.is_empty() {
          return Err(usage("!name <display name>"));
        }
        Ok(Command::Name { display_name: display_name.to_owned() })
      }
      "close" => no_args(&args, Command::Close, "!close"),
      "agents" => no_args(&args, Command::Agents, "!agents"),
      "topics" => no_args(&args, Command::Topics, "!topics"),
      "help" => Ok(Command::Help),
      other => Err(BridgeError::Validation(format!(
        "❓ Unrecognized command {COMMAND_PREFIX}{other}. Send {COMMAND_PREFIX}help for the list."
      ))),
    }
  }
}

pub const HELP: &str = "\
Commands:
!chat <number> <message> — message a contact, opening a thread if needed
!close — close the conversation of the current thread
!name <display name> — rename the contact of the current thread
!topics — list open conversations
!agents — list agents
!add <agent_id> <initial> — add or update an agent (superadmin)
!rm <agent_id> — remove an agent (superadmin)
Replies posted inside a conversation thread are sent to the contact.";

/// Split off the first whitespace-delimited token; the remainder keeps its
/// inner whitespace and line breaks.
fn split_token(s: &str) -> (&str, &str) {
  let s = s.trim_start();
  match s.find(char::is_whitespace) {
    Some(i) => (&s[..i], &s[i..]),
    None => (s, ""),
  }
}

fn parse_agent_id(raw: &str) -> Result<AgentId, BridgeError> {
  raw
    .parse()
    .map_err(|_| BridgeError::Validation(format!("❌ Agent id must be numeric, got {raw:?}.")))
}

fn no_args(args: &[&str], cmd: Command, form: &str) -> Result<Command, BridgeError> {
  if args.is_empty() { Ok(cmd) } else { Err(usage(form)) }
}

fn usage(form: &str) -> BridgeError { BridgeError::Validation(format!("Usage: {form}")) }

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(text: &str) -> Result<Command, BridgeError> {
    Invocation::from_text(text).expect("is a command").parse()
  }

  #[test]
  fn plain_text_is_not_a_command() {
    assert!(Invocation::from_text("hello there").is_none());
    assert!(Invocation::from_text("").is_none());
  }

  #[test]
  fn prefix_must_be_the_first_character() {
    assert!(Invocation::from_text("  !close").is_none());
    assert!(Invocation::from_text("\n!help").is_none());
    assert!(Invocation::from_text("!close").is_some());
  }

  #[test]
  fn command_word_is_case_insensitive() {
    let inv = Invocation::from_text("!CLOSE").unwrap();
    assert_eq!(inv.name, "close");
    assert_eq!(inv.parse().unwrap(), Command::Close);
  }

  #[test]
  fn add_requires_numeric_id_and_initial() {
    assert_eq!(
      parse("!add 42 AB").unwrap(),
      Command::Add { agent_id: AgentId(42), initial: "AB".into() }
    );
    assert!(matches!(parse("!add abc AB"), Err(BridgeError::Validation(_))));
    assert!(matches!(parse("!add 42"), Err(BridgeError::Validation(_))));
    assert!(matches!(parse("!add 42 AB extra"), Err(BridgeError::Validation(_))));
  }

  #[test]
  fn rm_takes_exactly_one_id() {
    assert_eq!(parse("!rm 7").unwrap(), Command::Remove { agent_id: AgentId(7) });
    assert!(matches!(parse("!rm"), Err(BridgeError::Validation(_))));
    assert!(matches!(parse("!rm x"), Err(BridgeError::Validation(_))));
  }

  #[test]
  fn chat_keeps_message_formatting() {
    let cmd = parse("!chat +15551234 hello\n  second line").unwrap();
    assert_eq!(
      cmd,
      Command::Chat {
        contact: Contact::parse("+15551234").unwrap(),
        message: "hello\n  second line".into(),
      }
    );
  }

  #[test]
  fn chat_rejects_missing_message_or_bad_number() {
    assert!(matches!(parse("!chat +15551234"), Err(BridgeError::Validation(_))));
    assert!(matches!(parse("!chat bob hi"), Err(BridgeError::Validation(_))));
  }

  #[test]
  fn close_rejects_arguments() {
    assert!(matches!(parse("!close now"), Err(BridgeError::Validation(_))));
  }

  #[test]
  fn unknown_command_is_reported() {
    let err = parse("!frobnicate").unwrap_err();
    assert!(err.user_message().contains("Unrecognized command"));
    assert_eq!(Invocation::from_text("!frobnicate").unwrap().access(), Access::Anyone);
  }

  #[test]
  fn access_levels() {
    assert_eq!(Invocation::from_text("!add 1 A").unwrap().access(), Access::Superadmin);
    assert_eq!(Invocation::from_text("!rm 1").unwrap().access(), Access::Superadmin);
    assert_eq!(Invocation::from_text("!chat 1 x").unwrap().access(), Access::Agent);
    assert_eq!(Invocation::from_text("!help").unwrap().access(), Access::Anyone);
  }

  #[test]
  fn roles_against_access() {
    let (admin, member) = (Some(Role::Superadmin), Some(Role::Member));
    assert!(Access::Superadmin.permits(admin));
    assert!(!Access::Superadmin.permits(member));
    assert!(Access::Agent.permits(member));
    assert!(!Access::Agent.permits(None));
    assert!(Access::Anyone.permits(None));
  }
}

//! Console stand-ins for the speech recognizer and notification surface, and
//! the parser for typed input lines.

use hark_assistant::quick_remainder;
use hark_core::{AckSink, Acknowledgment, Entity, EntityId, KeywordSink, RosterEvent};
use parking_lot::Mutex;
use tracing::debug;

/// Records the phrase list a channel is listening for.
pub struct ConsoleKeywords {
    channel: &'static str,
    phrases: Mutex<Vec<String>>,
}

impl ConsoleKeywords {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            phrases: Mutex::new(Vec::new()),
        }
    }

    pub fn phrases(&self) -> Vec<String> {
        self.phrases.lock().clone()
    }
}

impl KeywordSink for ConsoleKeywords {
    fn start_listening(&self, phrases: &[String]) {
        debug!(channel = self.channel, count = phrases.len(), "Recognizer restarted");
        *self.phrases.lock() = phrases.to_vec();
    }

    fn stop_listening(&self) {
        debug!(channel = self.channel, "Recognizer stopped");
        self.phrases.lock().clear();
    }
}

/// Prints acknowledgments to stdout.
pub struct ConsoleAcks;

impl AckSink for ConsoleAcks {
    fn acknowledge(&self, ack: Acknowledgment) {
        println!("{}", render_ack(&ack));
    }
}

pub fn render_ack(ack: &Acknowledgment) -> String {
    match ack {
        Acknowledgment::Wake { message } => format!("hark> {message}"),
        Acknowledgment::Asleep => "hark> (asleep)".to_string(),
        Acknowledgment::CommandFailed { command, error } => format!("hark> '{command}' failed: {error}"),
    }
}

// ---------------------------------------------------------------------------
// Input lines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    /// Routed to the main recognizer channel.
    Phrase(String),
    /// Starts with the quick-command prefix; routed to the quick channel.
    Quick(String),
    Roster(RosterEvent),
    Status,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "\
Type a phrase as if it were spoken. Lines starting with the quick-command
prefix go to the quick-command channel.

  :join <id> <name>   an entity joins the session
  :leave <id>         an entity leaves
  :session <id>=<name>,...  join a session with these members
  :end                the session ends
  :status             show assistant state and active phrases
  :help               this text
  :quit               exit";

pub fn parse_line(line: &str, quick_prefix: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(directive) = line.strip_prefix(':') else {
        return if quick_remainder(quick_prefix, line).is_some() {
            Input::Quick(line.to_string())
        } else {
            Input::Phrase(line.to_string())
        };
    };

    let mut parts = directive.split_whitespace();
    match parts.next().unwrap_or_default() {
        "join" => {
            let id = parts.next().and_then(|s| s.parse::<u64>().ok());
            let name = parts.collect::<Vec<_>>().join(" ");
            match id {
                Some(id) => Input::Roster(RosterEvent::EntityJoined {
                    entity: Entity::new(id, name),
                }),
                None => Input::Invalid("usage: :join <id> <name>".into()),
            }
        }
        "leave" => match parts.next().and_then(|s| s.parse::<u64>().ok()) {
            Some(id) => Input::Roster(RosterEvent::EntityLeft { id: EntityId(id) }),
            None => Input::Invalid("usage: :leave <id>".into()),
        },
        "session" => parse_session(&parts.collect::<Vec<_>>().join(" ")),
        "end" => Input::Roster(RosterEvent::SessionEnded),
        "status" => Input::Status,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Invalid(format!("unknown directive ':{other}'")),
    }
}

fn parse_session(list: &str) -> Input {
    let mut members = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let parsed = part
            .split_once('=')
            .and_then(|(id, name)| id.trim().parse::<u64>().ok().map(|id| Entity::new(id, name.trim())));
        match parsed {
            Some(entity) => members.push(entity),
            None => return Input::Invalid(format!("bad member '{part}', expected <id>=<name>")),
        }
    }
    Input::Roster(RosterEvent::SessionJoined { members })
}

//! Per-session conversation state
//!
//! A `Session` owns the transcript of one browser session, the flag that
//! says whether the assistant still has to open the conversation, and the
//! locally tracked grounding step. It is passed explicitly (`&mut`) to the
//! conversation driver; nothing here is global.

use crate::grounding::{self, GroundingStep, TurnEvent};
use crate::llm::{LlmMessage, MessageRole};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Who wrote a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

/// One message in the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The turn as the model client sees it
    pub fn to_llm_message(&self) -> LlmMessage {
        LlmMessage {
            role: self.role.into(),
            text: self.content.clone(),
        }
    }
}

/// Transcript plus session flags
#[derive(Debug)]
pub struct Session {
    id: String,
    transcript: Vec<Turn>,
    first_run: bool,
    step: GroundingStep,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transcript: Vec::new(),
            first_run: true,
            step: GroundingStep::NotStarted,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Add a turn to the end of the transcript
    pub fn append(&mut self, turn: Turn) {
        let event = match turn.role {
            Role::User => TurnEvent::UserTurn,
            Role::Assistant => TurnEvent::AssistantTurn {
                answered: self
                    .transcript
                    .last()
                    .is_some_and(|prev| prev.role == Role::User),
            },
        };
        let next = grounding::transition(self.step, event);
        if next != self.step {
            tracing::debug!(
                session = %self.id,
                from = ?self.step,
                to = ?next,
                "Grounding step advanced"
            );
            self.step = next;
        }
        self.transcript.push(turn);
    }

    /// The transcript in insertion order
    pub fn all(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// Whether the assistant still has to open the conversation
    pub fn first_run_pending(&self) -> bool {
        self.first_run
    }

    /// Return the first-run flag and clear it. True at most once.
    pub fn consume_first_run(&mut self) -> bool {
        std::mem::replace(&mut self.first_run, false)
    }

    pub fn step(&self) -> GroundingStep {
        self.step
    }
}

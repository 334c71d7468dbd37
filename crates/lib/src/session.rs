//! Chat session: the ordered turn log behind the chat panel.
//!
//! Turn 0 is the hidden primer. Turns are append-only; the only removal is a pending
//! turn, which is replaced by the final reply of the submission that created it.
//! Nothing here is persisted.

use crate::llm::{Content, Role};

/// Unique session identifier (opaque string, used for log correlation).
pub type SessionId = String;

/// Per-session submission counter value; correlates a pending turn with its fetch.
pub type SubmissionId = u64;

/// Text rendered for a pending turn.
pub const PENDING_TEXT: &str = "Thinking...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    User,
    Model,
    /// Placeholder for an in-flight submission.
    Pending(SubmissionId),
}

/// A single entry in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub kind: TurnKind,
    pub text: String,
    /// Only the primer is hidden: sent as context, never rendered.
    pub hidden_from_view: bool,
    /// Set when the turn reports a failed fetch.
    pub is_error: bool,
}

impl Turn {
    pub fn primer(text: impl Into<String>) -> Self {
        Self {
            kind: TurnKind::User,
            text: text.into(),
            hidden_from_view: true,
            is_error: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            kind: TurnKind::User,
            text: text.into(),
            hidden_from_view: false,
            is_error: false,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            kind: TurnKind::Model,
            text: text.into(),
            hidden_from_view: false,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::model(text)
        }
    }

    pub fn pending(submission: SubmissionId) -> Self {
        Self {
            kind: TurnKind::Pending(submission),
            text: PENDING_TEXT.to_string(),
            hidden_from_view: false,
            is_error: false,
        }
    }

    /// Role on the wire; pending turns count as model turns.
    pub fn role(&self) -> Role {
        match self.kind {
            TurnKind::User => Role::User,
            TurnKind::Model | TurnKind::Pending(_) => Role::Model,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.kind, TurnKind::Pending(_))
    }

    fn to_content(&self) -> Content {
        Content::text(self.role(), self.text.clone())
    }
}

/// A submission that has been recorded in the log and is waiting for its reply.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: SubmissionId,
    /// History to send: every non-pending turn up to and including the new user turn.
    pub history: Vec<Content>,
}

/// Where a resolved submission changed the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Index the pending turn occupied before removal.
    pub removed: usize,
    /// Index of the appended reply.
    pub appended: usize,
}

/// A session: id, ordered turn log, and chat panel visibility.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    turns: Vec<Turn>,
    panel_open: bool,
    next_submission: SubmissionId,
}

impl Session {
    /// New session seeded with the hidden primer turn; panel closed.
    pub fn new(primer: impl Into<String>) -> Self {
        Self {
            id: format!("sess-{}", uuid::Uuid::new_v4()),
            turns: vec![Turn::primer(primer)],
            panel_open: false,
            next_submission: 1,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns a view should render (everything but the primer).
    pub fn visible_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| !t.hidden_from_view)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the primer is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Quick menu shows only while the primer is the sole turn.
    pub fn show_quick_menu(&self) -> bool {
        self.turns.len() <= 1
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
    }

    pub fn pending_count(&self) -> usize {
        self.turns.iter().filter(|t| t.is_pending()).count()
    }

    /// Append the user turn and a pending turn for a fresh submission id.
    pub fn begin_submission(&mut self, text: impl Into<String>) -> Submission {
        let id = self.next_submission;
        self.next_submission += 1;
        self.turns.push(Turn::user(text));
        let history = self
            .turns
            .iter()
            .filter(|t| !t.is_pending())
            .map(Turn::to_content)
            .collect();
        self.turns.push(Turn::pending(id));
        Submission { id, history }
    }

    /// Remove the pending turn of `submission` and append its reply.
    /// Returns None (log untouched) when no such pending turn exists.
    pub fn resolve(
        &mut self,
        submission: SubmissionId,
        text: impl Into<String>,
        is_error: bool,
    ) -> Option<Resolution> {
        let removed = self
            .turns
            .iter()
            .position(|t| t.kind == TurnKind::Pending(submission))?;
        self.turns.remove(removed);
        let text = text.into();
        self.turns.push(if is_error {
            Turn::error(text)
        } else {
            Turn::model(text)
        });
        Some(Resolution {
            removed,
            appended: self.turns.len() - 1,
        })
    }
}

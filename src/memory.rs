//! Conversation memory: one linear, unbounded transcript.
//!
//! Turns are kept in arrival order and never trimmed or summarised. The
//! only way to shrink the transcript is [`ConversationMemory::clear`].

use parking_lot::Mutex;

use crate::models::Turn;

#[derive(Debug, Default)]
pub struct ConversationMemory {
    turns: Mutex<Vec<Turn>>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, turn: Turn) {
        self.turns.lock().push(turn);
    }

    /// Record a user message and the model's answer as one step, so
    /// concurrent chats never interleave between the two turns.
    pub fn append_exchange(&self, human: &str, ai: &str) {
        let mut turns = self.turns.lock();
        turns.push(Turn::human(human));
        turns.push(Turn::ai(ai));
    }

    /// Copy of the full transcript, oldest first.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.lock().clone()
    }

    pub fn clear(&self) {
        self.turns.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.turns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.lock().is_empty()
    }
}

/// Format turns as `Human: ...` / `AI: ...` lines.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.speaker.label(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

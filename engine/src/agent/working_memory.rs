//! Working Memory for Agent Loop
//!
//! Holds the conversation history for the whole session. History is
//! append-only: entries are never rewritten or dropped while the session
//! lives (only `clear` empties it). What the model sees each call is a
//! window over the tail, so long sessions stay within the model's context.

use super::action::{ConversationEntry, Role};

/// Default number of entries sent to the model per call
pub const DEFAULT_HISTORY_WINDOW: usize = 40;

/// Conversation history for a session
#[derive(Debug, Clone)]
pub struct WorkingMemory {
    /// All entries, oldest first
    entries: Vec<ConversationEntry>,

    /// Entries included in the transcript; 0 means no limit
    window: usize,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_HISTORY_WINDOW)
    }

    /// Create a working memory that exposes at most `window` entries to the
    /// model (0 for unbounded)
    pub fn with_window(window: usize) -> Self {
        Self {
            entries: Vec::new(),
            window,
        }
    }

    pub fn push(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    /// The full history
    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The tail of the history the model should see
    ///
    /// When the history is longer than the window, the cut is moved forward
    /// to the first user entry inside the window so the model never starts
    /// reading halfway through an earlier turn. If the window holds no user
    /// entry at all (one very long turn), the plain tail is returned.
    pub fn transcript_window(&self) -> &[ConversationEntry] {
        if self.window == 0 || self.entries.len() <= self.window {
            return &self.entries;
        }

        let start = self.entries.len() - self.window;
        let tail = &self.entries[start..];
        match tail.iter().position(|e| e.role == Role::User) {
            Some(offset) => &tail[offset..],
            None => tail,
        }
    }
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::action::Action;

    fn turn(memory: &mut WorkingMemory, text: &str) {
        memory.push(ConversationEntry::user(text));
        memory.push(ConversationEntry::assistant(&Action::Plan {
            plan: format!("handle {}", text),
        }));
        memory.push(ConversationEntry::assistant(&Action::Output {
            output: "ok".into(),
        }));
    }

    #[test]
    fn test_new_working_memory() {
        let memory = WorkingMemory::new();
        assert!(memory.is_empty());
        assert_eq!(memory.window(), DEFAULT_HISTORY_WINDOW);
    }

    #[test]
    fn test_short_history_is_sent_whole() {
        let mut memory = WorkingMemory::with_window(10);
        turn(&mut memory, "a");
        turn(&mut memory, "b");
        assert_eq!(memory.transcript_window().len(), 6);
    }

    #[test]
    fn test_window_starts_at_user_entry() {
        let mut memory = WorkingMemory::with_window(4);
        turn(&mut memory, "a");
        turn(&mut memory, "b");
        turn(&mut memory, "c");

        // Tail of 4 is [out(b), user(c), plan(c), out(c)]; cut moves to user(c)
        let window = memory.transcript_window();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0], ConversationEntry::user("c"));
        // Full history is untouched
        assert_eq!(memory.len(), 9);
    }

    #[test]
    fn test_window_without_user_entry_keeps_tail() {
        let mut memory = WorkingMemory::with_window(2);
        memory.push(ConversationEntry::user("long"));
        for i in 0..5 {
            memory.push(ConversationEntry::observation(i));
        }
        let window = memory.transcript_window();
        assert_eq!(window.len(), 2);
        assert_eq!(window[1], ConversationEntry::observation(4));
    }

    #[test]
    fn test_zero_window_is_unbounded() {
        let mut memory = WorkingMemory::with_window(0);
        for i in 0..100 {
            turn(&mut memory, &i.to_string());
        }
        assert_eq!(memory.transcript_window().len(), 300);
    }

    #[test]
    fn test_clear() {
        let mut memory = WorkingMemory::new();
        turn(&mut memory, "a");
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.last().is_none());
    }
}

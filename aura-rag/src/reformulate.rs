//! Query reformulation from recent dialogue.

use crate::conversation::ConversationMessage;
use crate::error::Result;

/// Rewrites a raw query into the text that gets embedded for search.
pub trait QueryReformulator: Send + Sync {
    /// Expand `query` using the conversation so far.
    fn reformulate(&self, query: &str, history: &[ConversationMessage]) -> Result<String>;
}

/// Appends the content of the last few turns to the query.
///
/// With turns available the result is `"{query}. Context: {turns}"`, turns
/// joined by single spaces; without any it is the query unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use aura_rag::{ConversationMessage, QueryReformulator, RecentTurnsReformulator};
///
/// let history = vec![ConversationMessage::user("I get headaches")];
/// let text = RecentTurnsReformulator::default().reformulate("Why?", &history)?;
/// assert_eq!(text, "Why?. Context: I get headaches");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RecentTurnsReformulator {
    window: usize,
}

impl RecentTurnsReformulator {
    /// Number of turns used by [`Default`].
    pub const DEFAULT_WINDOW: usize = 4;

    /// Use the last `window` turns, of any role.
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for RecentTurnsReformulator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl QueryReformulator for RecentTurnsReformulator {
    fn reformulate(&self, query: &str, history: &[ConversationMessage]) -> Result<String> {
        let start = history.len().saturating_sub(self.window);
        let context =
            history[start..].iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join(" ");

        if context.is_empty() { Ok(query.to_string()) } else { Ok(format!("{query}. Context: {context}")) }
    }
}

//! Composition root for retrieval and session context.
//!
//! A [`RagService`] is built once at startup and handed to request
//! handlers. It owns the retriever and the context manager and controls
//! the lifetime of the background cleanup sweep.

use std::sync::Arc;

use tracing::debug;

use crate::context::{CleanupTask, ContextManager, RelevantContext};
use crate::conversation::ConversationMessage;
use crate::retrieval::{RetrievalOptions, RetrievalOutcome, Retriever};

/// Retrieval plus per-session fusion behind one handle.
///
/// # Example
///
/// ```rust,ignore
/// use aura_rag::{ContextManager, RagService};
///
/// let service = RagService::new(Arc::new(retriever), Arc::new(ContextManager::new()));
/// let cleanup = service.start();
///
/// let bundle = service
///     .respond_context("user_123", "What could be causing them?", &history, &Default::default())
///     .await;
///
/// cleanup.shutdown().await;
/// ```
#[derive(Clone)]
pub struct RagService {
    retriever: Arc<Retriever>,
    contexts: Arc<ContextManager>,
}

impl RagService {
    /// Create a service from its two collaborators.
    pub fn new(retriever: Arc<Retriever>, contexts: Arc<ContextManager>) -> Self {
        Self { retriever, contexts }
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    /// Return a reference to the context manager.
    pub fn contexts(&self) -> &Arc<ContextManager> {
        &self.contexts
    }

    /// Start the periodic session cleanup.
    pub fn start(&self) -> CleanupTask {
        self.contexts.spawn_cleanup()
    }

    /// Retrieve for `query`, record the result in the session, and return
    /// the session's fused context.
    ///
    /// Degraded and empty retrievals are recorded too, so the session's
    /// queries and entities stay complete.
    pub async fn respond_context(
        &self,
        session_id: &str,
        query: &str,
        history: &[ConversationMessage],
        options: &RetrievalOptions,
    ) -> RelevantContext {
        let outcome = self.retriever.retrieve_context(query, history, options).await;
        if let RetrievalOutcome::Degraded { reason, .. } = &outcome {
            debug!(session_id, error = %reason, "recording degraded retrieval");
        }

        self.contexts.add_rag_context(session_id, outcome.into_context()).await;
        self.contexts.get_relevant_context(session_id, query).await
    }
}

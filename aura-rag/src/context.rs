//! Per-session conversational context.
//!
//! The [`ContextManager`] keeps one [`ConversationContext`] per session id.
//! Each context accumulates recent retrievals and the medical terms the user
//! has mentioned, and can fuse its retrievals into one ranked bundle for the
//! next prompt.
//!
//! Sessions are locked individually, so updates to one session are applied
//! one at a time in the order they acquire the lock, while different
//! sessions proceed in parallel. The session map itself is only
//! write-locked to create, clear, or sweep sessions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ContextConfig;
use crate::document::{DocumentType, RagContext, RetrievalResult};

/// Terms recognised as entities when they appear in a query.
pub const MEDICAL_VOCABULARY: &[&str] = &[
    "symptom",
    "diagnosis",
    "treatment",
    "medication",
    "disease",
    "condition",
    "syndrome",
    "disorder",
    "infection",
    "pain",
    "fever",
    "cough",
    "headache",
    "nausea",
    "fatigue",
];

/// Summary returned for a session with no retrievals.
pub const NO_PREVIOUS_CONTEXT: &str = "No previous context available.";

/// Accumulated retrieval state for one session.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    /// The session this context belongs to.
    pub session_id: String,
    /// Recent retrievals, oldest first.
    pub rag_contexts: VecDeque<RagContext>,
    /// Entities mentioned so far, oldest first, without duplicates.
    pub relevant_entities: Vec<String>,
    /// When a retrieval was last recorded (or the session was created).
    pub last_retrieval_time: Instant,
}

impl ConversationContext {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            rag_contexts: VecDeque::new(),
            relevant_entities: Vec::new(),
            last_retrieval_time: Instant::now(),
        }
    }

    fn record(&mut self, rag_context: RagContext, config: &ContextConfig) {
        let query = rag_context.query.clone();
        self.rag_contexts.push_back(rag_context);
        while self.rag_contexts.len() > config.max_contexts {
            self.rag_contexts.pop_front();
        }
        self.last_retrieval_time = Instant::now();
        self.extract_entities(&query, config.max_entities);
    }

    fn extract_entities(&mut self, query: &str, max_entities: usize) {
        let query = query.to_lowercase();
        for term in MEDICAL_VOCABULARY {
            if query.contains(term) && !self.relevant_entities.iter().any(|e| e == term) {
                self.relevant_entities.push((*term).to_string());
            }
        }
        if self.relevant_entities.len() > max_entities {
            let excess = self.relevant_entities.len() - max_entities;
            self.relevant_entities.drain(..excess);
        }
    }

    /// Merge every retained retrieval into one ranked list.
    ///
    /// A retrieval at position `i` (0 = oldest) has its similarities scaled
    /// by `i + 1`, so the newest retrieval weighs the most. A chunk seen in
    /// several retrievals keeps its highest weighted score; on equal scores
    /// the earlier one stays.
    fn fuse(&self, top_k: usize) -> Vec<RetrievalResult> {
        let mut fused: Vec<RetrievalResult> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for (index, rag_context) in self.rag_contexts.iter().enumerate() {
            let weight = (index + 1) as f32;
            for result in &rag_context.retrieved_docs {
                let weighted = result.similarity * weight;
                match positions.get(result.chunk.id.as_str()) {
                    Some(&position) => {
                        if fused[position].similarity < weighted {
                            fused[position] = RetrievalResult { similarity: weighted, ..result.clone() };
                        }
                    }
                    None => {
                        positions.insert(result.chunk.id.as_str(), fused.len());
                        fused.push(RetrievalResult { similarity: weighted, ..result.clone() });
                    }
                }
            }
        }

        fused.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        fused.truncate(top_k);
        for (index, result) in fused.iter_mut().enumerate() {
            result.rank = index + 1;
        }
        fused
    }

    fn summary(&self, window: usize) -> String {
        if self.rag_contexts.is_empty() {
            return NO_PREVIOUS_CONTEXT.to_string();
        }

        let start = self.rag_contexts.len().saturating_sub(window);
        let recent: Vec<&RagContext> = self.rag_contexts.iter().skip(start).collect();

        let queries = recent.iter().map(|c| c.query.as_str()).collect::<Vec<_>>().join("; ");

        let mut topics: Vec<DocumentType> = Vec::new();
        for result in recent.iter().flat_map(|c| c.retrieved_docs.iter().take(2)) {
            let topic = result.chunk.metadata.document_type;
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        let topics = topics.iter().map(DocumentType::as_str).collect::<Vec<_>>().join(", ");

        format!("Previous topics: {topics}. Recent queries: {queries}")
    }
}

/// The fused bundle handed to the prompt builder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevantContext {
    /// Top documents across the session's retrievals, recency-weighted.
    pub retrieved_docs: Vec<RetrievalResult>,
    /// One-line description of recent queries and topics.
    pub conversation_summary: String,
    /// Entities mentioned in the session.
    pub relevant_entities: Vec<String>,
}

type SessionHandle = Arc<Mutex<ConversationContext>>;

/// Owns every session's [`ConversationContext`].
///
/// # Example
///
/// ```rust,ignore
/// use aura_rag::ContextManager;
///
/// let manager = Arc::new(ContextManager::new());
/// let cleanup = manager.spawn_cleanup();
///
/// manager.add_rag_context("user_123", outcome.into_context()).await;
/// let bundle = manager.get_relevant_context("user_123", query).await;
///
/// cleanup.shutdown().await;
/// ```
#[derive(Debug, Default)]
pub struct ContextManager {
    config: ContextConfig,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl ContextManager {
    /// Create a manager with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with custom limits.
    pub fn with_config(config: ContextConfig) -> Self {
        Self { config, sessions: RwLock::new(HashMap::new()) }
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Lock a session, creating it if needed.
    ///
    /// The map lock is held until the session lock is acquired, so a
    /// cleanup sweep cannot drop a session between lookup and use.
    async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<ConversationContext> {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(session_id) {
                return Arc::clone(handle).lock_owned().await;
            }
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "created conversation context");
                Arc::new(Mutex::new(ConversationContext::new(session_id)))
            })
            .clone();
        handle.lock_owned().await
    }

    /// A snapshot of the session's context, creating an empty one if needed.
    pub async fn get_context(&self, session_id: &str) -> ConversationContext {
        self.lock_session(session_id).await.clone()
    }

    /// Record a retrieval in the session.
    ///
    /// Evicts the oldest retrieval beyond the cap, refreshes the session's
    /// last retrieval time, and adds any new entities from the query.
    pub async fn add_rag_context(&self, session_id: &str, rag_context: RagContext) {
        let mut context = self.lock_session(session_id).await;
        context.record(rag_context, &self.config);
        debug!(
            session_id,
            retained = context.rag_contexts.len(),
            entities = context.relevant_entities.len(),
            "recorded retrieval"
        );
    }

    /// Fuse the session's retrievals into a [`RelevantContext`].
    ///
    /// `current_query` is accepted for callers that pass it along; fusion
    /// depends only on the recorded retrievals.
    pub async fn get_relevant_context(
        &self,
        session_id: &str,
        current_query: &str,
    ) -> RelevantContext {
        let context = self.lock_session(session_id).await;
        let retrieved_docs = context.fuse(self.config.fused_top_k);
        debug!(
            session_id,
            query_len = current_query.len(),
            fused = retrieved_docs.len(),
            "fused session context"
        );
        RelevantContext {
            retrieved_docs,
            conversation_summary: context.summary(self.config.summary_window),
            relevant_entities: context.relevant_entities.clone(),
        }
    }

    /// Whether the session's last retrieval is older than the refresh window.
    pub async fn should_refresh_context(&self, session_id: &str) -> bool {
        let context = self.lock_session(session_id).await;
        context.last_retrieval_time.elapsed() > self.config.refresh_after
    }

    /// Drop a session. Returns whether it existed.
    pub async fn clear_context(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        debug!(session_id, removed, "cleared conversation context");
        removed
    }

    /// Drop every session idle for longer than the TTL. Returns how many
    /// were removed.
    pub async fn cleanup(&self) -> usize {
        let ttl = self.config.session_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        // A session locked right now is in use and therefore not idle.
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(context) => context.last_retrieval_time.elapsed() <= ttl,
            Err(_) => true,
        });

        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "removed expired conversation contexts");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Run [`cleanup`](Self::cleanup) every `cleanup_interval` on a
    /// background task until the returned handle is shut down or dropped.
    pub fn spawn_cleanup(self: &Arc<Self>) -> CleanupTask {
        let manager = Arc::clone(self);
        let period = self.config.cleanup_interval;
        let (shutdown, mut stop) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => {
                        manager.cleanup().await;
                    }
                }
            }
            debug!("context cleanup task stopped");
        });

        CleanupTask { shutdown: Some(shutdown), handle: Some(handle) }
    }
}

/// Handle to the background cleanup sweep.
///
/// Dropping the handle aborts the task; [`shutdown`](Self::shutdown) stops
/// it and waits for it to finish.
#[derive(Debug)]
pub struct CleanupTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CleanupTask {
    /// Stop the sweep and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

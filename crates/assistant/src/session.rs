//! Per-session conversation memory.
//!
//! Each session id maps to its own [`SessionMemory`] behind an async mutex,
//! so a slow generation in one conversation never blocks another. The map
//! lock is only taken to find or create a session, never across I/O.

use dermassist_core::classification::ClassificationResult;
use dermassist_core::message::{ConversationTurn, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Summary turn recorded when a classification first enters a session.
pub fn classification_summary(classification: &ClassificationResult) -> String {
    format!("Prediction context:\n{}", classification_lines(classification))
}

/// The `- Disease / - Confidence / - Description` lines shared by the
/// summary turn and the composed prompt.
pub(crate) fn classification_lines(classification: &ClassificationResult) -> String {
    format!(
        "- Disease: {}\n- Confidence: {}\n- Description: {}",
        classification.label(),
        classification.confidence_percent(),
        classification.description()
    )
}

/// The transcript of one conversation.
#[derive(Debug, Clone, Default)]
pub struct SessionMemory {
    turns: Vec<ConversationTurn>,
    /// The classification whose summary turn was most recently recorded.
    pinned: Option<ClassificationResult>,
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn pinned(&self) -> Option<&ClassificationResult> {
        self.pinned.as_ref()
    }

    /// Whether `classification` differs from the one already summarized.
    pub fn is_new_classification(&self, classification: &ClassificationResult) -> bool {
        self.pinned.as_ref() != Some(classification)
    }

    /// Append one completed exchange. Returns the number of turns added.
    ///
    /// A classification not yet pinned is summarized first and becomes the
    /// new pin.
    pub fn record_exchange(
        &mut self,
        classification: Option<&ClassificationResult>,
        user_message: &str,
        reply: &str,
    ) -> usize {
        let before = self.turns.len();

        if let Some(c) = classification.filter(|c| self.is_new_classification(c)) {
            self.turns
                .push(ConversationTurn::user(classification_summary(c)));
            self.pinned = Some(c.clone());
        }
        self.turns.push(ConversationTurn::user(user_message));
        self.turns.push(ConversationTurn::assistant(reply));

        self.turns.len() - before
    }
}

struct SessionSlot {
    memory: Arc<Mutex<SessionMemory>>,
    last_active: u64,
}

impl SessionSlot {
    /// No handle is held outside the store.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.memory) == 1
    }
}

#[derive(Default)]
struct Sessions {
    slots: HashMap<SessionId, SessionSlot>,
    clock: u64,
}

/// All live sessions, capped at `max_sessions`.
///
/// When full, opening a new session evicts the least recently active idle
/// one. A session whose handle is still held by a turn in flight is never
/// evicted; if every session is busy the store grows past the cap until
/// they go idle.
pub struct SessionStore {
    sessions: RwLock<Sessions>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Get the session's memory handle, creating an empty session if needed.
    pub async fn handle(&self, id: &SessionId) -> Arc<Mutex<SessionMemory>> {
        let mut sessions = self.sessions.write().await;
        sessions.clock += 1;
        let now = sessions.clock;

        if let Some(slot) = sessions.slots.get_mut(id) {
            slot.last_active = now;
            return slot.memory.clone();
        }

        if sessions.slots.len() >= self.max_sessions {
            let oldest = sessions
                .slots
                .iter()
                .filter(|(_, slot)| slot.is_idle())
                .min_by_key(|(_, slot)| slot.last_active)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    sessions.slots.remove(&key);
                    debug!(session = %key, "Evicted least recently active session");
                }
                None => debug!(
                    sessions = sessions.slots.len(),
                    "All sessions busy, admitting over capacity"
                ),
            }
        }

        let memory = Arc::new(Mutex::new(SessionMemory::new()));
        sessions.slots.insert(
            id.clone(),
            SessionSlot {
                memory: memory.clone(),
                last_active: now,
            },
        );
        memory
    }

    /// A copy of a session's memory, if the session exists.
    pub async fn snapshot(&self, id: &SessionId) -> Option<SessionMemory> {
        let memory = {
            let sessions = self.sessions.read().await;
            sessions.slots.get(id).map(|slot| slot.memory.clone())
        }?;
        let guard = memory.lock().await;
        Some(guard.clone())
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.slots.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.slots.remove(id).is_some()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dermassist_core::classification::DiseaseLabel;
    use dermassist_core::message::Speaker;

    fn acne() -> ClassificationResult {
        ClassificationResult::new(DiseaseLabel::Acne, 0.87, DiseaseLabel::Acne.description())
            .unwrap()
    }

    #[test]
    fn exchange_without_classification_adds_two_turns() {
        let mut memory = SessionMemory::new();
        assert_eq!(memory.record_exchange(None, "hi", "Hello!"), 2);
        assert_eq!(memory.turns()[0].speaker, Speaker::User);
        assert_eq!(memory.turns()[1].text, "Hello!");
        assert!(memory.pinned().is_none());
    }

    #[test]
    fn new_classification_adds_summary_turn() {
        let mut memory = SessionMemory::new();
        assert_eq!(memory.record_exchange(Some(&acne()), "what is it?", "Acne is..."), 3);
        assert!(memory.turns()[0].text.starts_with("Prediction context:\n- Disease: Acne"));
        assert!(memory.turns()[0].text.contains("- Confidence: 87.00%"));
        assert_eq!(memory.pinned(), Some(&acne()));
    }

    #[test]
    fn resent_classification_is_not_summarized_again() {
        let mut memory = SessionMemory::new();
        memory.record_exchange(Some(&acne()), "q1", "a1");
        assert_eq!(memory.record_exchange(Some(&acne()), "q2", "a2"), 2);
        assert_eq!(memory.len(), 5);
    }

    #[test]
    fn different_classification_is_summarized_and_pinned() {
        let mut memory = SessionMemory::new();
        memory.record_exchange(Some(&acne()), "q1", "a1");

        let eczema = ClassificationResult::new(DiseaseLabel::Eczema, 0.6, "Itchy").unwrap();
        assert_eq!(memory.record_exchange(Some(&eczema), "q2", "a2"), 3);
        assert_eq!(memory.pinned(), Some(&eczema));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new(10);
        let a = SessionId::parse("a").unwrap();
        let b = SessionId::parse("b").unwrap();

        store.handle(&a).await.lock().await.record_exchange(None, "hi", "hello");
        store.handle(&b).await;

        assert_eq!(store.snapshot(&a).await.unwrap().len(), 2);
        assert!(store.snapshot(&b).await.unwrap().is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn handle_returns_same_memory_for_same_id() {
        let store = SessionStore::default();
        let id = SessionId::new();
        let first = store.handle(&id).await;
        let second = store.handle(&id).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn least_recently_active_session_is_evicted() {
        let store = SessionStore::new(2);
        let a = SessionId::parse("a").unwrap();
        let b = SessionId::parse("b").unwrap();
        let c = SessionId::parse("c").unwrap();

        store.handle(&a).await;
        store.handle(&b).await;
        store.handle(&a).await; // a is now more recent than b
        store.handle(&c).await;

        assert!(store.contains(&a).await);
        assert!(!store.contains(&b).await);
        assert!(store.contains(&c).await);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn busy_session_is_not_evicted() {
        let store = SessionStore::new(2);
        let a = SessionId::parse("a").unwrap();
        let b = SessionId::parse("b").unwrap();
        let c = SessionId::parse("c").unwrap();

        let held = store.handle(&a).await;
        store.handle(&b).await;
        store.handle(&c).await;

        assert!(store.contains(&a).await);
        assert!(!store.contains(&b).await);
        assert!(Arc::ptr_eq(&held, &store.handle(&a).await));
    }

    #[tokio::test]
    async fn all_busy_sessions_admit_over_capacity() {
        let store = SessionStore::new(1);
        let a = SessionId::parse("a").unwrap();
        let b = SessionId::parse("b").unwrap();

        let _held = store.handle(&a).await;
        let _other = store.handle(&b).await;

        assert!(store.contains(&a).await);
        assert!(store.contains(&b).await);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn unknown_session_has_no_snapshot() {
        let store = SessionStore::default();
        assert!(store.snapshot(&SessionId::new()).await.is_none());
        assert!(store.is_empty().await);
    }
}

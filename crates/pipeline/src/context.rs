//! Per-chat context registry.
//!
//! One [`ChatContext`] per chat, created on first touch and kept for the
//! process lifetime unless the sweep evicts it. All mutable chat state lives
//! behind the context's lane mutex: the pipeline entry locks it for the whole
//! traversal, so downstream stages work on `&mut ChatState` and need no
//! locking of their own.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {dashmap::DashMap, tokio::sync::Mutex, tracing::debug};

use deskbot_common::{ChatId, MessageHandle};

use {
    crate::{correlator::RedirectionTable, receiver::PushBinding},
    deskbot_channels::Conversation,
};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Mutable state of one chat, guarded by the chat's lane.
pub struct ChatState {
    /// Highest accepted update sequence number.
    pub last_seq: i64,
    /// Active conversation state machine, created lazily on first dispatch.
    pub conversation: Option<Box<dyn Conversation>>,
    /// Pending continuations awaiting a matching reply.
    pub redirections: RedirectionTable,
    /// Inline-receiver bindings for pushed messages with controls attached.
    pub bindings: HashMap<MessageHandle, PushBinding>,
}

impl ChatState {
    fn new() -> Self {
        Self {
            last_seq: i64::MIN,
            conversation: None,
            redirections: RedirectionTable::default(),
            bindings: HashMap::new(),
        }
    }
}

/// One chat's context: the exclusive execution lane plus eviction bookkeeping.
pub struct ChatContext {
    pub chat: ChatId,
    /// Exclusive per-chat execution lane. Held for the entire pipeline
    /// traversal of one update; re-locking it from within that traversal
    /// deadlocks and is a contract violation.
    pub lane: Mutex<ChatState>,
    last_touch: AtomicU64,
}

impl ChatContext {
    fn new(chat: ChatId) -> Self {
        Self {
            chat,
            lane: Mutex::new(ChatState::new()),
            last_touch: AtomicU64::new(unix_now()),
        }
    }

    /// Record activity for idle-eviction bookkeeping.
    pub fn touch(&self) {
        self.last_touch.store(unix_now(), Ordering::Relaxed);
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        Duration::from_secs(unix_now().saturating_sub(self.last_touch.load(Ordering::Relaxed)))
    }
}

/// Counters reported by one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub contexts_evicted: usize,
    pub redirections_evicted: usize,
    pub bindings_evicted: usize,
}

/// Concurrent, lazily populated map from chat to its context.
pub struct ChatContextRegistry {
    contexts: DashMap<ChatId, Arc<ChatContext>>,
}

impl Default for ChatContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatContextRegistry {
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
        }
    }

    /// Atomic get-or-create: concurrent first touch of the same chat yields
    /// exactly one context.
    pub fn get_or_create(&self, chat: ChatId) -> Arc<ChatContext> {
        Arc::clone(
            &self
                .contexts
                .entry(chat)
                .or_insert_with(|| Arc::new(ChatContext::new(chat))),
        )
    }

    pub fn get(&self, chat: ChatId) -> Option<Arc<ChatContext>> {
        self.contexts.get(&chat).map(|entry| Arc::clone(&entry))
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Evict expired redirections, stale push bindings, and idle contexts.
    ///
    /// Best-effort: chats whose lane is currently held are skipped and
    /// revisited on the next pass. Redirections expire after
    /// `redirection_ttl`; bindings and whole contexts after `context_idle`.
    pub fn sweep(&self, context_idle: Duration, redirection_ttl: Duration) -> SweepStats {
        let mut stats = SweepStats::default();

        for entry in self.contexts.iter() {
            let Ok(mut state) = entry.lane.try_lock() else {
                continue;
            };
            stats.redirections_evicted += state.redirections.evict_older_than(redirection_ttl);
            let before = state.bindings.len();
            state
                .bindings
                .retain(|_, binding| binding.age() < context_idle);
            stats.bindings_evicted += before - state.bindings.len();
        }

        self.contexts.retain(|_, context| {
            if context.idle_for() < context_idle {
                return true;
            }
            // Only drop a context whose lane is free right now.
            let keep = context.lane.try_lock().is_err();
            if !keep {
                stats.contexts_evicted += 1;
                debug!(chat = %context.chat, "evicting idle chat context");
            }
            keep
        });

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_touch_creates_one_context() {
        let registry = Arc::new(ChatContextRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                Arc::as_ptr(&registry.get_or_create(ChatId(1))) as usize
            }));
        }
        let mut pointers = Vec::new();
        for handle in handles {
            pointers.push(handle.await.unwrap());
        }
        pointers.dedup();
        assert_eq!(pointers.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn distinct_chats_get_distinct_contexts() {
        let registry = ChatContextRegistry::new();
        let a = registry.get_or_create(ChatId(1));
        let b = registry.get_or_create(ChatId(2));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn sweep_keeps_active_contexts() {
        let registry = ChatContextRegistry::new();
        registry.get_or_create(ChatId(1));
        let stats = registry.sweep(Duration::from_secs(3600), Duration::from_secs(60));
        assert_eq!(stats.contexts_evicted, 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn sweep_evicts_idle_context_with_free_lane() {
        let registry = ChatContextRegistry::new();
        let context = registry.get_or_create(ChatId(1));
        context.last_touch.store(0, Ordering::Relaxed);

        let stats = registry.sweep(Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(stats.contexts_evicted, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn sweep_skips_context_with_busy_lane() {
        let registry = ChatContextRegistry::new();
        let context = registry.get_or_create(ChatId(1));
        context.last_touch.store(0, Ordering::Relaxed);

        let guard = context.lane.lock().await;
        let stats = registry.sweep(Duration::from_secs(1), Duration::from_secs(1));
        drop(guard);

        assert_eq!(stats.contexts_evicted, 0);
        assert_eq!(registry.len(), 1);
    }
}

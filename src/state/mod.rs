use crate::admin::{AdminFlow, FlowKind};
use crate::config::{Config, ShuffleSettings};
use crate::session::{shuffle_round, SessionHandle};
use crate::store::Store;
use crate::types::{Question, UserKey};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{timeout, Instant};

pub struct BotState {
    pub config: Config,
    pub store: Store,
    pub sessions: Mutex<HashMap<i64, Arc<SessionHandle>>>,
    pub admin_flows: Mutex<HashMap<UserKey, AdminFlow>>,
    /// Users asked for their name, keyed by the chat they were asked in.
    pub pending_names: Mutex<HashMap<(i64, UserKey), Instant>>,
    pub shuffle: Mutex<ShuffleSettings>,
    pub rng: Mutex<StdRng>,
}

impl BotState {
    pub fn new(config: Config, store: Store) -> Self {
        let shuffle = config.shuffle;
        Self {
            config,
            store,
            sessions: Mutex::new(HashMap::new()),
            admin_flows: Mutex::new(HashMap::new()),
            pending_names: Mutex::new(HashMap::new()),
            shuffle: Mutex::new(shuffle),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn is_admin(&self, user: UserKey) -> bool {
        self.config.is_admin(user)
    }

    /// Per-question time: the questions file wins over the environment.
    pub async fn question_time(&self) -> Duration {
        self.store
            .question_time()
            .await
            .map(Duration::from_secs)
            .unwrap_or(self.config.question_time)
    }

    /// Shuffles a private copy of `questions` for one session. A configured
    /// seed makes every session shuffle identically.
    pub async fn build_round(&self, questions: &[Question]) -> Vec<Question> {
        let settings = *self.shuffle.lock().await;
        match settings.seed {
            Some(seed) => shuffle_round(questions, &settings, &mut StdRng::seed_from_u64(seed)),
            None => {
                let mut rng = self.rng.lock().await;
                shuffle_round(questions, &settings, &mut *rng)
            }
        }
    }

    pub async fn session(&self, chat_id: i64) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().await.get(&chat_id).cloned()
    }

    /// Removes the chat's session if it is still `handle`.
    pub async fn finish_session(&self, chat_id: i64, handle: &Arc<SessionHandle>) {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(&chat_id).is_some_and(|current| Arc::ptr_eq(current, handle)) {
            sessions.remove(&chat_id);
            log::info!("Cleared state for chat {}", chat_id);
        }
    }

    /// Cancels and forgets the chat's session. Returns whether one existed.
    pub async fn clear_session(&self, chat_id: i64) -> bool {
        match self.sessions.lock().await.remove(&chat_id) {
            Some(handle) => {
                handle.cancel();
                log::info!("Cleared state for chat {}", chat_id);
                true
            }
            None => false,
        }
    }

    pub async fn clear_all_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let count = sessions.len();
        for (_, handle) in sessions.drain() {
            handle.cancel();
        }
        log::info!("Cleared all {} chat states", count);
        count
    }

    /// Takes the user's next plain message in `chat_id` as their name.
    pub async fn await_name(&self, chat_id: i64, user: UserKey) {
        self.pending_names
            .lock()
            .await
            .insert((chat_id, user), Instant::now());
    }

    pub async fn take_pending_name(&self, chat_id: i64, user: UserKey) -> bool {
        self.pending_names.lock().await.remove(&(chat_id, user)).is_some()
    }

    /// Forgets name prompts older than `ttl`.
    pub async fn expire_pending_names(&self, now: Instant, ttl: Duration) -> usize {
        let mut pending = self.pending_names.lock().await;
        let before = pending.len();
        pending.retain(|_, asked| now.saturating_duration_since(*asked) <= ttl);
        before - pending.len()
    }

    pub async fn acquire_flows_lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<UserKey, AdminFlow>>, Box<dyn Error + Send + Sync>> {
        match timeout(Duration::from_secs(5), self.admin_flows.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                log::error!("Timeout while acquiring admin flow lock");
                Err("Lock acquisition timeout".into())
            }
        }
    }

    pub async fn set_admin_flow(&self, user: UserKey, flow: AdminFlow) {
        self.admin_flows.lock().await.insert(user, flow);
    }

    pub async fn clear_admin_flow(&self, user: UserKey) -> Option<AdminFlow> {
        let removed = self.admin_flows.lock().await.remove(&user);
        if removed.is_some() {
            log::info!("Cleared admin state for user {}", user);
        }
        removed
    }

    /// The questions picked in the user's delete selection, left in place
    /// until the deletion is confirmed.
    pub async fn delete_selection(&self, user: UserKey) -> Option<BTreeSet<usize>> {
        match self.admin_flows.lock().await.get(&user).map(|f| &f.kind) {
            Some(FlowKind::DeleteSelection(selected)) if !selected.is_empty() => Some(selected.clone()),
            _ => None,
        }
    }

    pub async fn clear_all_admin_flows(&self) -> usize {
        let mut flows = self.admin_flows.lock().await;
        let count = flows.len();
        flows.clear();
        count
    }

    /// Wipes completions and statistics, then drops every live session and
    /// admin flow.
    pub async fn start_new_round(&self) -> Result<(), crate::error::QuizError> {
        self.store.new_round().await?;
        self.clear_all_sessions().await;
        self.clear_all_admin_flows().await;
        log::info!("Complete data reset for new round");
        Ok(())
    }
}

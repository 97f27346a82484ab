use crate::domain::account::PlayerId;
use crate::domain::ports::Clock;
use crate::domain::session::{AmountOutcome, AmountPolicy, Mode, SessionState};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct Entry {
    state: SessionState,
    touched_at: DateTime<Utc>,
}

/// One interaction session per sender, driving "pick a target, then type an
/// amount" for both payments and charges.
///
/// Selecting a new target replaces whatever the sender had in progress.
pub struct InteractionSessionManager {
    sessions: RwLock<HashMap<PlayerId, Entry>>,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
}

impl InteractionSessionManager {
    /// `timeout` of `None` keeps sessions until they finish or are cancelled.
    pub fn new(clock: Arc<dyn Clock>, timeout: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            timeout,
        }
    }

    pub async fn select_target(&self, sender: PlayerId, target: &str, mode: Mode) {
        let entry = Entry {
            state: SessionState::select(mode, target),
            touched_at: self.clock.now(),
        };
        if self.sessions.write().await.insert(sender, entry).is_some() {
            debug!(sender = %sender, "Replaced an unfinished session");
        }
        debug!(sender = %sender, target, ?mode, "Target selected");
    }

    /// Moves the sender's session to amount entry. Returns the new state, or
    /// `None` when the sender has no session.
    pub async fn begin_amount_entry(&self, sender: PlayerId) -> Option<SessionState> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&sender)?;
        entry.state = entry.state.clone().begin_amount_entry();
        entry.touched_at = now;
        Some(entry.state.clone())
    }

    /// Feeds typed text to the sender's session.
    ///
    /// The session ends on cancel, acceptance or expiry. Invalid and
    /// out-of-limit amounts leave it waiting for another try.
    pub async fn submit_amount(
        &self,
        sender: PlayerId,
        raw: &str,
        policy: &AmountPolicy<'_>,
    ) -> AmountOutcome {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(&sender) else {
            return AmountOutcome::NotAwaiting;
        };
        if !entry.state.is_awaiting_amount() {
            return AmountOutcome::NotAwaiting;
        }

        let outcome = match self.timeout {
            Some(timeout) if now - entry.touched_at > timeout => AmountOutcome::Expired {
                target: entry.state.target().to_string(),
            },
            _ => entry.state.submit(raw, policy),
        };

        if outcome.ends_session() {
            sessions.remove(&sender);
        } else {
            entry.touched_at = now;
        }
        debug!(sender = %sender, ?outcome, "Amount submitted");
        outcome
    }

    /// Returns whether a session was dropped.
    pub async fn cancel(&self, sender: PlayerId) -> bool {
        self.sessions.write().await.remove(&sender).is_some()
    }

    pub async fn state(&self, sender: PlayerId) -> Option<SessionState> {
        self.sessions
            .read()
            .await
            .get(&sender)
            .map(|entry| entry.state.clone())
    }

    pub async fn is_awaiting_amount(&self, sender: PlayerId) -> bool {
        self.sessions
            .read()
            .await
            .get(&sender)
            .is_some_and(|entry| entry.state.is_awaiting_amount())
    }
}

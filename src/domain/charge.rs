use super::account::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower-cases a player name for use as a pending-request recipient key.
pub fn recipient_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A charge raised against a player who was not online to receive it.
///
/// `id` is assigned by the persistence backend and grows with insertion
/// order; `created_at` is only used to order requests for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChargeRequest {
    pub id: u64,
    pub recipient: String,
    pub sender: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl PendingChargeRequest {
    /// Command the recipient runs to settle this request.
    pub fn settle_command(&self) -> String {
        settle_command(&self.sender, self.amount)
    }
}

pub fn settle_command(sender: &str, amount: Amount) -> String {
    format!("pay {sender} {amount}")
}

/// Result of delivering a recipient's queued requests on reconnect.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Drain {
    pub shown: Vec<PendingChargeRequest>,
    /// Requests still queued after this delivery.
    pub remaining: usize,
}

impl Drain {
    pub fn total(&self) -> usize {
        self.shown.len() + self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

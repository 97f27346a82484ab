use crate::application::ledger::Ledger;
use crate::domain::account::{Amount, Balance, PlayerId};
use crate::domain::limits::{Bypass, PayLimits};
use crate::error::{EconomyError, Result};
use std::sync::Arc;
use tracing::{debug, error};

/// Balances of both parties after a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub amount: Amount,
    pub sender_balance: Balance,
    pub target_balance: Balance,
}

/// Moves money between two accounts on the ledger.
///
/// The withdraw and the deposit are two separate ledger operations. If the
/// withdraw fails nothing is deposited; if the deposit fails the sender is
/// refunded.
#[derive(Clone)]
pub struct TransactionExecutor {
    ledger: Arc<Ledger>,
}

impl TransactionExecutor {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Checks `amount` against the configured limits for a sender holding
    /// the given bypasses.
    pub fn validate(&self, amount: Amount, limits: PayLimits, bypass: Bypass) -> Result<()> {
        limits.check(amount, bypass)?;
        Ok(())
    }

    pub async fn transfer(
        &self,
        sender: PlayerId,
        target: PlayerId,
        amount: Amount,
    ) -> Result<Transfer> {
        if !self.ledger.has(sender, amount).await {
            return Err(EconomyError::InsufficientFunds {
                balance: self.ledger.balance(sender).await.0,
                requested: amount.value(),
            });
        }

        let target_before = self.ledger.balance(target).await;
        if target_before.checked_add(amount).is_none() {
            return Err(EconomyError::BalanceOverflow {
                balance: target_before.0,
                requested: amount.value(),
            });
        }

        // A concurrent withdraw or deposit may still win between the checks
        // and here.
        let sender_balance = self.ledger.withdraw(sender, amount).await?;
        let target_balance = match self.ledger.deposit(target, amount).await {
            Ok(balance) => balance,
            Err(e) => {
                error!(sender = %sender, target = %target, amount = %amount, "Deposit failed after withdraw: {}", e);
                if let Err(refund) = self.ledger.deposit(sender, amount).await {
                    error!(sender = %sender, amount = %amount, "Refund failed: {}", refund);
                }
                return Err(e);
            }
        };

        debug!(sender = %sender, target = %target, amount = %amount, "Transfer completed");
        Ok(Transfer {
            amount,
            sender_balance,
            target_balance,
        })
    }
}

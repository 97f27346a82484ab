use crate::application::executor::{TransactionExecutor, Transfer};
use crate::application::ledger::Ledger;
use crate::application::pending::PendingRequestQueue;
use crate::application::sessions::InteractionSessionManager;
use crate::config::{Settings, required_permission};
use crate::domain::account::{Amount, Balance, format_amount};
use crate::domain::charge::{Drain, settle_command};
use crate::domain::limits::{Bypass, LimitViolation};
use crate::domain::notice::Notice;
use crate::domain::ports::{Clock, Host, Player};
use crate::domain::query::BalanceQuery;
use crate::domain::session::{AmountOutcome, AmountPolicy, Mode};
use crate::error::{EconomyError, Result};
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};

/// Whether a line of free text was taken by an amount-entry session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDisposition {
    /// The text was an amount, a cancel keyword or a rejected attempt.
    Consumed,
    /// Ordinary chat; the host should deliver it as usual.
    Passthrough,
}

/// The operations a host calls into: direct payments, the interactive pay and
/// charge flows, reconnect delivery and balance lookups.
///
/// Domain failures are reported to the acting player as notices and also
/// returned. Storage failures are logged by the lower layers and never reach
/// the player.
#[derive(Clone)]
pub struct PayService {
    ledger: Arc<Ledger>,
    pending: Arc<PendingRequestQueue>,
    sessions: Arc<InteractionSessionManager>,
    executor: TransactionExecutor,
    host: Arc<dyn Host>,
    settings: Arc<Settings>,
}

impl PayService {
    pub fn new(
        ledger: Arc<Ledger>,
        pending: Arc<PendingRequestQueue>,
        host: Arc<dyn Host>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Self {
        let timeout = match settings.session.timeout_secs {
            0 => None,
            secs => Duration::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX)),
        };
        Self {
            executor: TransactionExecutor::new(Arc::clone(&ledger)),
            sessions: Arc::new(InteractionSessionManager::new(clock, timeout)),
            ledger,
            pending,
            host,
            settings: Arc::new(settings),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn pending(&self) -> &Arc<PendingRequestQueue> {
        &self.pending
    }

    pub fn sessions(&self) -> &Arc<InteractionSessionManager> {
        &self.sessions
    }

    fn permitted(&self, player: &Player, permission: &str) -> bool {
        match required_permission(permission) {
            Some(name) => self.host.has_permission(player, name),
            None => true,
        }
    }

    fn bypass(&self, player: &Player) -> Bypass {
        let holds = |permission: &str| {
            required_permission(permission)
                .is_some_and(|name| self.host.has_permission(player, name))
        };
        Bypass {
            below_min: holds(&self.settings.permissions.bypass_min),
            above_max: holds(&self.settings.permissions.bypass_max),
        }
    }

    fn require(&self, player: &Player, permission: &str) -> Result<()> {
        if self.permitted(player, permission) {
            Ok(())
        } else {
            Err(EconomyError::PermissionDenied(permission.to_string()))
        }
    }

    fn online(&self, name: &str) -> Result<Player> {
        self.host
            .online_player(name)
            .ok_or_else(|| EconomyError::TargetUnreachable(name.to_string()))
    }

    /// Tells `player` about a domain failure. Storage and unsupported errors
    /// are not shown.
    fn report(&self, player: &Player, err: &EconomyError) {
        let notice = match err {
            EconomyError::InsufficientFunds { .. } => Notice::NotEnoughMoney,
            EconomyError::InvalidAmount(_) | EconomyError::BalanceOverflow { .. } => {
                Notice::InvalidAmount
            }
            EconomyError::LimitViolation(violation) => limit_notice(*violation),
            EconomyError::TargetUnreachable(name) => Notice::PlayerOffline {
                player: name.clone(),
            },
            EconomyError::PermissionDenied(_) => Notice::NoPermission,
            EconomyError::StorageUnavailable(_)
            | EconomyError::Unsupported(_)
            | EconomyError::MalformedEvent(_) => return,
        };
        self.host.notify(player, notice);
    }

    fn reported<T>(&self, player: &Player, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!(player = %player.name, "Operation refused: {}", e);
            self.report(player, e);
        }
        result
    }

    /// Pays `amount` from `sender` to the online player named `target_name`.
    ///
    /// Checks run in order: pay permission, target online, limits, funds.
    /// Both accounts are created before the funds check.
    pub async fn pay_direct(
        &self,
        sender: &Player,
        target_name: &str,
        amount: Amount,
    ) -> Result<Transfer> {
        let result = self.try_pay(sender, target_name, amount).await;
        self.reported(sender, result)
    }

    async fn try_pay(&self, sender: &Player, target_name: &str, amount: Amount) -> Result<Transfer> {
        self.require(sender, &self.settings.permissions.pay_use)?;
        let target = self.online(target_name)?;
        self.executor
            .validate(amount, self.settings.pay_limits, self.bypass(sender))?;

        self.ledger.create_account(sender.id).await;
        self.ledger.create_account(target.id).await;
        let transfer = self.executor.transfer(sender.id, target.id, amount).await?;

        let shown = format_amount(amount.value());
        self.host.notify(
            sender,
            Notice::PaySent {
                player: target.name.clone(),
                amount: shown.clone(),
            },
        );
        self.host.notify(
            &target,
            Notice::PayReceived {
                player: sender.name.clone(),
                amount: shown,
            },
        );
        info!(sender = %sender.name, target = %target.name, amount = %amount, "Payment sent");
        Ok(transfer)
    }

    /// Starts the interactive pay flow against an online target and prompts
    /// the sender for an amount.
    pub async fn start_pay(&self, sender: &Player, target_name: &str) -> Result<()> {
        let result = self.try_start_pay(sender, target_name).await;
        self.reported(sender, result)
    }

    async fn try_start_pay(&self, sender: &Player, target_name: &str) -> Result<()> {
        self.require(sender, &self.settings.permissions.pay_use)?;
        let target = self.online(target_name)?;
        self.sessions.select_target(sender.id, &target.name, Mode::Pay).await;
        self.sessions.begin_amount_entry(sender.id).await;
        self.host.notify(
            sender,
            Notice::PromptPayAmount {
                player: target.name,
            },
        );
        Ok(())
    }

    /// Starts the interactive charge flow. The target does not need to be
    /// online; an accepted charge for an absent target is queued.
    pub async fn raise_charge(&self, sender: &Player, target_name: &str) -> Result<()> {
        let result = self.require(sender, &self.settings.permissions.pay_use);
        self.reported(sender, result)?;

        let target = self
            .host
            .online_player(target_name)
            .map(|player| player.name)
            .unwrap_or_else(|| target_name.trim().to_string());
        self.sessions.select_target(sender.id, &target, Mode::Charge).await;
        self.sessions.begin_amount_entry(sender.id).await;
        self.host
            .notify(sender, Notice::PromptChargeAmount { player: target });
        Ok(())
    }

    /// Routes a line of free text to the sender's amount-entry session.
    ///
    /// Text from a sender without a waiting session passes through untouched.
    /// An accepted payment is executed later on the host's main context.
    pub async fn on_free_text_input(&self, sender: &Player, text: &str) -> InputDisposition {
        let policy = AmountPolicy {
            cancel_keywords: &self.settings.session.cancel_keywords,
            limits: self.settings.pay_limits,
            bypass: self.bypass(sender),
        };

        match self.sessions.submit_amount(sender.id, text, &policy).await {
            AmountOutcome::NotAwaiting => return InputDisposition::Passthrough,
            AmountOutcome::Cancelled => debug!(sender = %sender.name, "Session cancelled"),
            AmountOutcome::Invalid => self.host.notify(sender, Notice::InvalidAmount),
            AmountOutcome::Rejected(violation) => self.host.notify(sender, limit_notice(violation)),
            AmountOutcome::Expired { target } => self
                .host
                .notify(sender, Notice::SessionExpired { player: target }),
            AmountOutcome::Accepted {
                mode: Mode::Pay,
                target,
                amount,
            } => {
                let service = self.clone();
                let sender = sender.clone();
                self.host.run_on_main(Box::pin(async move {
                    // Failures were already shown to the sender.
                    let _ = service.pay_direct(&sender, &target, amount).await;
                }));
            }
            AmountOutcome::Accepted {
                mode: Mode::Charge,
                target,
                amount,
            } => self.deliver_charge(sender, &target, amount).await,
        }
        InputDisposition::Consumed
    }

    async fn deliver_charge(&self, sender: &Player, target: &str, amount: Amount) {
        let shown = format_amount(amount.value());
        match self.host.online_player(target) {
            Some(recipient) => {
                self.host.notify(
                    &recipient,
                    Notice::ChargeRequest {
                        player: sender.name.clone(),
                        amount: shown.clone(),
                        command: settle_command(&sender.name, amount),
                    },
                );
                self.host.notify(
                    sender,
                    Notice::ChargeSent {
                        player: recipient.name,
                        amount: shown,
                    },
                );
            }
            None => {
                self.pending.add_pending(target, &sender.name, amount).await;
                self.host.notify(
                    sender,
                    Notice::ChargeStored {
                        player: target.to_string(),
                        amount: shown,
                    },
                );
            }
        }
        info!(sender = %sender.name, target, amount = %amount, "Charge raised");
    }

    /// Drops the sender's session, if any.
    pub async fn cancel(&self, sender: &Player) -> bool {
        self.sessions.cancel(sender.id).await
    }

    /// Shows `player` the charge requests queued while they were away, up to
    /// `pay_pending.max_on_join` at a time.
    pub async fn on_reconnect(&self, player: &Player) -> Drain {
        let max_shown = self.settings.pay_pending.max_on_join;
        let drain = self.pending.drain_on_reconnect(&player.name, max_shown).await;
        if drain.is_empty() {
            return drain;
        }

        let total = drain.total();
        self.host
            .notify(player, Notice::PendingHeader { count: total });
        if drain.remaining > 0 {
            self.host.notify(
                player,
                Notice::PendingLimit {
                    shown: drain.shown.len(),
                    total,
                },
            );
        }
        for request in &drain.shown {
            self.host.notify(
                player,
                Notice::ChargeRequest {
                    player: request.sender.clone(),
                    amount: format_amount(request.amount.value()),
                    command: request.settle_command(),
                },
            );
        }
        info!(player = %player.name, shown = drain.shown.len(), remaining = drain.remaining, "Delivered pending charge requests");
        drain
    }

    pub async fn balance(&self, player: &Player) -> Result<Balance> {
        let result = self.require(player, &self.settings.permissions.balance_use);
        self.reported(player, result)?;

        let balance = self.ledger.create_account(player.id).await;
        self.host.notify(
            player,
            Notice::Balance {
                amount: format_amount(balance.0),
            },
        );
        Ok(balance)
    }

    /// Shows `viewer` the balance of an online player.
    pub async fn view_balance(&self, viewer: &Player, target_name: &str) -> Result<Balance> {
        let result = self
            .require(viewer, &self.settings.permissions.pay_use)
            .and_then(|()| self.online(target_name));
        let target = self.reported(viewer, result)?;

        let balance = self.ledger.create_account(target.id).await;
        self.host.notify(
            viewer,
            Notice::TargetBalance {
                player: target.name,
                amount: format_amount(balance.0),
            },
        );
        Ok(balance)
    }

    /// Finds a player by name: online players first, then anyone the host has
    /// seen, then the deterministic offline id when
    /// `players.offline_id_fallback` is on.
    pub fn resolve_player(&self, name: &str) -> Option<Player> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.host
            .online_player(name)
            .or_else(|| self.host.known_player(name))
            .or_else(|| {
                self.settings
                    .players
                    .offline_id_fallback
                    .then(|| Player::offline(name))
            })
    }

    /// Balance of the player named `name`, creating their account if needed.
    pub async fn lookup_balance(&self, name: &str) -> Option<(Player, Balance)> {
        let player = self.resolve_player(name)?;
        let balance = self.ledger.create_account(player.id).await;
        Some((player, balance))
    }

    /// Answers a balance query key on behalf of `player`.
    ///
    /// Raw answers are the plain decimal; formatted ones use the grouped
    /// two-decimal form. Unknown keys and names that resolve to nobody give
    /// `None`.
    pub async fn query_balance(&self, player: &Player, key: &str) -> Option<String> {
        let query = BalanceQuery::parse(key)?;
        let balance = match &query.player {
            Some(name) => self.lookup_balance(name).await?.1,
            None => self.ledger.create_account(player.id).await,
        };
        debug!(player = %player.name, key, "Answered balance query");
        Some(if query.formatted {
            format_amount(balance.0)
        } else {
            balance.0.normalize().to_string()
        })
    }

    /// Writes every balance back to storage.
    pub async fn shutdown(&self) {
        self.ledger.save_all().await;
    }
}

fn limit_notice(violation: LimitViolation) -> Notice {
    match violation {
        LimitViolation::BelowMinimum { min } => Notice::AmountTooSmall {
            min: format_amount(min),
        },
        LimitViolation::AboveMaximum { max } => Notice::AmountTooLarge {
            max: format_amount(max),
        },
    }
}

//! Typed messages the core asks the host to show a player.
//!
//! Rendering and translation belong to the host; the `Display` impl is the
//! plain English fallback used by the console host and in logs.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoPermission,
    PlayerOffline { player: String },
    InvalidAmount,
    AmountTooSmall { min: String },
    AmountTooLarge { max: String },
    NotEnoughMoney,
    PaySent { player: String, amount: String },
    PayReceived { player: String, amount: String },
    PromptPayAmount { player: String },
    PromptChargeAmount { player: String },
    /// Clickable request; `command` is what the host runs on click.
    ChargeRequest {
        player: String,
        amount: String,
        command: String,
    },
    ChargeSent { player: String, amount: String },
    ChargeStored { player: String, amount: String },
    PendingHeader { count: usize },
    PendingLimit { shown: usize, total: usize },
    Balance { amount: String },
    TargetBalance { player: String, amount: String },
    SessionExpired { player: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoPermission => write!(f, "You do not have permission to do that."),
            Notice::PlayerOffline { player } => write!(f, "{player} is not online."),
            Notice::InvalidAmount => write!(f, "That is not a valid amount."),
            Notice::AmountTooSmall { min } => write!(f, "The minimum amount is {min}."),
            Notice::AmountTooLarge { max } => write!(f, "The maximum amount is {max}."),
            Notice::NotEnoughMoney => write!(f, "You do not have enough money."),
            Notice::PaySent { player, amount } => write!(f, "You sent {amount} to {player}."),
            Notice::PayReceived { player, amount } => {
                write!(f, "You received {amount} from {player}.")
            }
            Notice::PromptPayAmount { player } => write!(
                f,
                "Type the amount to pay {player} in chat, or 'cancel' to abort."
            ),
            Notice::PromptChargeAmount { player } => write!(
                f,
                "Type the amount to request from {player} in chat, or 'cancel' to abort."
            ),
            Notice::ChargeRequest {
                player,
                amount,
                command,
            } => write!(f, "{player} requests {amount} from you. [/{command}]"),
            Notice::ChargeSent { player, amount } => {
                write!(f, "Requested {amount} from {player}.")
            }
            Notice::ChargeStored { player, amount } => write!(
                f,
                "{player} is offline; the request for {amount} will be shown when they return."
            ),
            Notice::PendingHeader { count } => {
                write!(f, "You have {count} pending payment request(s).")
            }
            Notice::PendingLimit { shown, total } => write!(
                f,
                "Showing {shown} of {total}; the rest will be shown next time."
            ),
            Notice::Balance { amount } => write!(f, "Your balance: {amount}"),
            Notice::TargetBalance { player, amount } => write!(f, "{player}'s balance: {amount}"),
            Notice::SessionExpired { player } => {
                write!(f, "Your pending transaction with {player} expired.")
            }
        }
    }
}

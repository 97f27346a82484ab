use super::account::Amount;
use super::limits::{Bypass, LimitViolation, PayLimits};

/// What the sender intends to do with the selected target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Send money directly.
    Pay,
    /// Ask the target for money.
    Charge,
}

/// Live state of one sender's interaction. Absence of a session is `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    TargetSelected { mode: Mode, target: String },
    AwaitingAmount { mode: Mode, target: String },
}

/// Everything `submit` needs besides the typed text.
#[derive(Debug, Clone, Copy)]
pub struct AmountPolicy<'a> {
    pub cancel_keywords: &'a [String],
    pub limits: PayLimits,
    pub bypass: Bypass,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AmountOutcome {
    /// The sender is not waiting to type an amount; the text is not ours.
    NotAwaiting,
    Cancelled,
    /// Unparseable text. The session keeps waiting.
    Invalid,
    /// Outside the configured limits. The session keeps waiting.
    Rejected(LimitViolation),
    Accepted {
        mode: Mode,
        target: String,
        amount: Amount,
    },
    /// The session sat idle past its timeout and was dropped unanswered.
    Expired { target: String },
}

impl AmountOutcome {
    /// Whether the session ends with this outcome.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            AmountOutcome::Cancelled | AmountOutcome::Accepted { .. } | AmountOutcome::Expired { .. }
        )
    }
}

impl SessionState {
    pub fn select(mode: Mode, target: impl Into<String>) -> Self {
        SessionState::TargetSelected {
            mode,
            target: target.into(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            SessionState::TargetSelected { mode, .. } | SessionState::AwaitingAmount { mode, .. } => {
                *mode
            }
        }
    }

    pub fn target(&self) -> &str {
        match self {
            SessionState::TargetSelected { target, .. }
            | SessionState::AwaitingAmount { target, .. } => target,
        }
    }

    pub fn is_awaiting_amount(&self) -> bool {
        matches!(self, SessionState::AwaitingAmount { .. })
    }

    pub fn begin_amount_entry(self) -> Self {
        match self {
            SessionState::TargetSelected { mode, target }
            | SessionState::AwaitingAmount { mode, target } => {
                SessionState::AwaitingAmount { mode, target }
            }
        }
    }

    pub fn submit(&self, raw: &str, policy: &AmountPolicy<'_>) -> AmountOutcome {
        let SessionState::AwaitingAmount { mode, target } = self else {
            return AmountOutcome::NotAwaiting;
        };

        let text = raw.trim();
        if policy
            .cancel_keywords
            .iter()
            .any(|keyword| keyword.trim().eq_ignore_ascii_case(text))
        {
            return AmountOutcome::Cancelled;
        }

        let Ok(amount) = Amount::parse(text) else {
            return AmountOutcome::Invalid;
        };

        if let Err(violation) = policy.limits.check(amount, policy.bypass) {
            return AmountOutcome::Rejected(violation);
        }

        AmountOutcome::Accepted {
            mode: *mode,
            target: target.clone(),
            amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn keywords() -> Vec<String> {
        vec!["cancel".to_string(), "cancelar".to_string()]
    }

    fn policy(keywords: &[String], limits: PayLimits, bypass: Bypass) -> AmountPolicy<'_> {
        AmountPolicy {
            cancel_keywords: keywords,
            limits,
            bypass,
        }
    }

    #[test]
    fn test_target_selected_ignores_text() {
        let keywords = keywords();
        let state = SessionState::select(Mode::Pay, "bob");
        let outcome = state.submit("10", &policy(&keywords, PayLimits::default(), Bypass::default()));
        assert_eq!(outcome, AmountOutcome::NotAwaiting);
    }

    #[test]
    fn test_cancel_keyword_is_case_insensitive() {
        let keywords = keywords();
        let state = SessionState::select(Mode::Charge, "bob").begin_amount_entry();
        let p = policy(&keywords, PayLimits::default(), Bypass::default());
        assert_eq!(state.submit("  CANCEL ", &p), AmountOutcome::Cancelled);
        assert_eq!(state.submit("Cancelar", &p), AmountOutcome::Cancelled);
    }

    #[test]
    fn test_invalid_text_keeps_waiting() {
        let keywords = keywords();
        let state = SessionState::select(Mode::Pay, "bob").begin_amount_entry();
        let outcome = state.submit("lots", &policy(&keywords, PayLimits::default(), Bypass::default()));
        assert_eq!(outcome, AmountOutcome::Invalid);
        assert!(!outcome.ends_session());
    }

    #[test]
    fn test_limits_apply_with_per_direction_bypass() {
        let keywords = keywords();
        let state = SessionState::select(Mode::Pay, "bob").begin_amount_entry();
        let limits = PayLimits::new(dec!(5), dec!(0));

        let denied = state.submit("3", &policy(&keywords, limits, Bypass::default()));
        assert_eq!(
            denied,
            AmountOutcome::Rejected(LimitViolation::BelowMinimum { min: dec!(5) })
        );

        let bypass = Bypass {
            below_min: true,
            above_max: false,
        };
        let accepted = state.submit("3", &policy(&keywords, limits, bypass));
        assert_eq!(
            accepted,
            AmountOutcome::Accepted {
                mode: Mode::Pay,
                target: "bob".into(),
                amount: Amount::new(dec!(3)).unwrap(),
            }
        );
        assert!(accepted.ends_session());
    }

    #[test]
    fn test_begin_amount_entry_keeps_mode_and_target() {
        let state = SessionState::select(Mode::Charge, "carol").begin_amount_entry();
        assert!(state.is_awaiting_amount());
        assert_eq!(state.mode(), Mode::Charge);
        assert_eq!(state.target(), "carol");
    }
}

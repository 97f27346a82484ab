use crate::error::EconomyError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Sub, SubAssign};
use std::str::FromStr;
use uuid::Uuid;

/// Stable 128-bit player identifier.
///
/// Persisted in its hyphenated string form, which is also the key of the
/// flat-file and durable balance tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id for hosts that run without an authentication service.
    ///
    /// The same name always maps to the same id, so balances survive restarts
    /// even when the host cannot supply a real account id.
    pub fn offline(name: &str) -> Self {
        Self(Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("OfflinePlayer:{name}").as_bytes(),
        ))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// An account balance.
///
/// The ledger never asserts this is non-negative; withdrawals are rejected
/// before they would take it below zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

/// A non-negative monetary amount used for transfers, deposits and charges.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, EconomyError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EconomyError::InvalidAmount(format!(
                "{value} is negative"
            )))
        }
    }

    /// Parses free text typed by a player. Accepts plain and scientific notation.
    /// Digit separators are refused.
    pub fn parse(raw: &str) -> Result<Self, EconomyError> {
        let text = raw.trim();
        if text.contains('_') {
            return Err(EconomyError::InvalidAmount(format!("'{text}' is not a number")));
        }
        let value = Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(|_| EconomyError::InvalidAmount(format!("'{text}' is not a number")))?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EconomyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.normalize().fmt(f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }

    /// `None` when the sum does not fit in a `Decimal`.
    pub fn checked_add(self, amount: Amount) -> Option<Self> {
        self.0.checked_add(amount.0).map(Self)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// Formats an amount with two decimals and comma thousands grouping.
///
/// Deterministic and locale-independent; ties round to even.
pub fn format_amount(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1 - b2, Balance::new(dec!(5.0)));
        assert_eq!(
            b1.checked_add(Amount::new(dec!(5.0)).unwrap()),
            Some(Balance::new(dec!(15.0)))
        );
    }

    #[test]
    fn test_checked_add_refuses_overflow() {
        let full = Balance::new(Decimal::MAX);
        assert_eq!(full.checked_add(Amount::new(dec!(1)).unwrap()), None);
        assert_eq!(full.checked_add(Amount::ZERO), Some(full));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(Amount::new(dec!(0.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(EconomyError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_amount_parse() {
        assert_eq!(Amount::parse(" 12.5 ").unwrap().value(), dec!(12.5));
        assert_eq!(Amount::parse("1e3").unwrap().value(), dec!(1000));
        assert!(matches!(
            Amount::parse("ten"),
            Err(EconomyError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::parse("-3"),
            Err(EconomyError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_amount_parse_refuses_digit_separators() {
        assert!(matches!(
            Amount::parse("1_000"),
            Err(EconomyError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::parse("1_0e2"),
            Err(EconomyError::InvalidAmount(_))
        ));
        assert_eq!(Amount::parse("1000").unwrap().value(), dec!(1000));
    }

    #[test]
    fn test_format_amount_grouping() {
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(5)), "5.00");
        assert_eq!(format_amount(dec!(999.999)), "1,000.00");
        assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(format_amount(dec!(-1234.5)), "-1,234.50");
    }

    #[test]
    fn test_format_amount_rounds_half_even() {
        assert_eq!(format_amount(dec!(0.125)), "0.12");
        assert_eq!(format_amount(dec!(0.135)), "0.14");
    }

    #[test]
    fn test_offline_id_is_deterministic() {
        assert_eq!(PlayerId::offline("Steve"), PlayerId::offline("Steve"));
        assert_ne!(PlayerId::offline("Steve"), PlayerId::offline("Alex"));
    }

    #[test]
    fn test_player_id_round_trips_through_text() {
        let id = PlayerId::random();
        let parsed: PlayerId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<PlayerId>().is_err());
    }
}

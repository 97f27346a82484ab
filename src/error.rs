use crate::domain::limits::LimitViolation;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EconomyError {
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("Balance overflow: balance {balance}, deposit {requested}")]
    BalanceOverflow { balance: Decimal, requested: Decimal },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error(transparent)]
    LimitViolation(#[from] LimitViolation),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Player {0} is not online")]
    TargetUnreachable(String),
    #[error("Missing permission {0}")]
    PermissionDenied(String),
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}

impl EconomyError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(Box::new(std::io::Error::other(message.into())))
    }

    /// Domain errors are reported to the player; storage errors and bad
    /// input events never are.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::StorageUnavailable(_) | Self::MalformedEvent(_))
    }
}

impl From<std::io::Error> for EconomyError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}

impl From<csv::Error> for EconomyError {
    fn from(err: csv::Error) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}

impl From<serde_json::Error> for EconomyError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EconomyError {
    fn from(err: rocksdb::Error) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for EconomyError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, EconomyError>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExchangeError>;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Insufficient funds: need {need}, have {available}")]
    InsufficientFunds { need: i64, available: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Winner already declared: {0}")]
    AlreadyDeclared(String),

    #[error("Payouts already approved: {0}")]
    AlreadyApproved(String),

    #[error("Winner not declared yet: {0}")]
    NotDeclaredYet(String),

    #[error("Account is restricted: {0}")]
    RestrictedAccount(String),

    #[error("Market is closed: {0}")]
    MarketClosed(String),

    #[error("Invalid number format: {0}")]
    InvalidNumberFormat(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Bet limit exceeded: limit {limit}, requested {requested}")]
    BetLimitExceeded { limit: i64, requested: i64 },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_declared(msg: impl Into<String>) -> Self {
        Self::AlreadyDeclared(msg.into())
    }

    pub fn already_approved(msg: impl Into<String>) -> Self {
        Self::AlreadyApproved(msg.into())
    }

    pub fn not_declared_yet(msg: impl Into<String>) -> Self {
        Self::NotDeclaredYet(msg.into())
    }

    pub fn restricted(msg: impl Into<String>) -> Self {
        Self::RestrictedAccount(msg.into())
    }

    pub fn market_closed(msg: impl Into<String>) -> Self {
        Self::MarketClosed(msg.into())
    }

    pub fn invalid_number(msg: impl Into<String>) -> Self {
        Self::InvalidNumberFormat(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::DuplicateId(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable kind string for the request layer's `{kind, message}` mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "InsufficientFunds",
            Self::NotFound(_) => "NotFound",
            Self::AlreadyDeclared(_) => "AlreadyDeclared",
            Self::AlreadyApproved(_) => "AlreadyApproved",
            Self::NotDeclaredYet(_) => "NotDeclaredYet",
            Self::RestrictedAccount(_) => "RestrictedAccount",
            Self::MarketClosed(_) => "MarketClosed",
            Self::InvalidNumberFormat(_) => "InvalidNumberFormat",
            Self::DuplicateId(_) => "DuplicateId",
            Self::BetLimitExceeded { .. } => "BetLimitExceeded",
            Self::Storage(_) => "Storage",
            Self::Serialization(_) => "Serialization",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
            Self::Internal(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_are_stable() {
        let cases = [
            (
                ExchangeError::InsufficientFunds {
                    need: 100,
                    available: 50,
                },
                "InsufficientFunds",
            ),
            (ExchangeError::not_found("account x"), "NotFound"),
            (ExchangeError::already_declared("game y"), "AlreadyDeclared"),
            (ExchangeError::already_approved("game y"), "AlreadyApproved"),
            (ExchangeError::not_declared_yet("game y"), "NotDeclaredYet"),
            (ExchangeError::restricted("account x"), "RestrictedAccount"),
            (ExchangeError::market_closed("game y"), "MarketClosed"),
            (ExchangeError::invalid_number("12x"), "InvalidNumberFormat"),
            (ExchangeError::duplicate("username"), "DuplicateId"),
            (
                ExchangeError::BetLimitExceeded {
                    limit: 100,
                    requested: 500,
                },
                "BetLimitExceeded",
            ),
            (ExchangeError::config("bad hour"), "Config"),
            (ExchangeError::internal("oops"), "Internal"),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn insufficient_funds_message_carries_amounts() {
        let err = ExchangeError::InsufficientFunds {
            need: 500,
            available: 120,
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("120"));
    }
}

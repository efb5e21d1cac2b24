//! error types for hushpay

use thiserror::Error;

use crate::types::Participant;

pub type Result<T> = std::result::Result<T, Error>;

/// rejected input, raised before any state is touched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("deposit for {participant} must be non-negative, got {amount}")]
    NegativeDeposit { participant: Participant, amount: i64 },

    #[error("payment amount must be positive, got {0}")]
    NonPositiveDelta(i64),

    #[error("{participant} balance {balance} insufficient for transfer {requested}")]
    InsufficientBalance {
        participant: Participant,
        balance: u64,
        requested: u64,
    },

    #[error("malformed channel id: {0:?}")]
    MalformedChannelId(String),

    #[error("channel capacity overflows u64")]
    BalanceOverflow,

    #[error("unknown participant: {0:?}")]
    UnknownParticipant(String),

    #[error("a supplied signature needs an explicit participant")]
    SignatureWithoutParticipant,

    #[error("no participant given and cosigning as both is disabled")]
    MissingParticipant,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// carries no detail on purpose, callers only learn that a check failed
    #[error("cryptographic verification failed")]
    Verification,

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("channel not found: {0}")]
    NotFound(String),

    #[error("no channel has been opened")]
    NoActiveChannel,

    #[error("channel {channel_id} is {actual}, operation requires {expected}")]
    InvalidState {
        channel_id: String,
        actual: &'static str,
        expected: &'static str,
    },

    #[error("channel {0} was modified concurrently")]
    Conflict(String),

    #[error("stale state for channel {channel_id}: ledger holds sequence {recorded}, offered {offered}")]
    StaleState {
        channel_id: String,
        recorded: u64,
        offered: u64,
    },

    #[error("malformed encoding: {0}")]
    Encoding(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// coarse error classes, one per row of the error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Verification,
    Internal,
    NotFound,
    State,
    Conflict,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Encoding(_) => ErrorKind::Validation,
            Self::Verification => ErrorKind::Verification,
            Self::Internal(_) | Self::Storage(_) => ErrorKind::Internal,
            Self::NotFound(_) | Self::NoActiveChannel => ErrorKind::NotFound,
            Self::InvalidState { .. } | Self::StaleState { .. } => ErrorKind::State,
            Self::Conflict(_) => ErrorKind::Conflict,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        let validation: Error = ValidationError::NonPositiveDelta(0).into();
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert_eq!(Error::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert!(Error::NoActiveChannel.is_not_found());
        assert!(!validation.is_not_found());
    }

    #[test]
    fn test_verification_message_has_no_detail() {
        assert_eq!(Error::Verification.to_string(), "cryptographic verification failed");
    }
}

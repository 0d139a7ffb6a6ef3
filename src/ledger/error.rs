//! Error types for wallet ledger operations.

use thiserror::Error;

use crate::Amount;
use crate::model::{TaskId, UserId};
use crate::store::TxnError;

/// Top-level error returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("credit failed: {0}")]
    Credit(#[from] CreditError),

    #[error("withdrawal debit failed: {0}")]
    Debit(#[from] DebitError),
}

/// Error during task-completion crediting.
///
/// `AlreadyCompleted` is a normal "nothing to do" outcome for the user, not
/// a fault; it exists so a second submission can never credit twice.
#[derive(Debug, Error)]
pub enum CreditError {
    #[error("task {0} already credited to this wallet")]
    AlreadyCompleted(TaskId),

    #[error("reward must not be negative, got {0}")]
    NegativeReward(Amount),

    /// Transient store failure. Retry the whole operation from the top;
    /// never assume partial success.
    #[error("credit transaction aborted after {0} attempts")]
    Aborted(u32),
}

/// Error during withdrawal debiting.
#[derive(Debug, Error)]
pub enum DebitError {
    #[error("withdrawal amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("no wallet found for user {0}")]
    NoWallet(UserId),

    #[error("insufficient balance for {user}: available {available}, requested {requested}")]
    Insufficient {
        user: UserId,
        available: Amount,
        requested: Amount,
    },

    /// Transient store failure. Retry the whole operation from the top;
    /// never assume partial success.
    #[error("debit transaction aborted after {0} attempts")]
    Aborted(u32),
}

impl From<TxnError<CreditError>> for CreditError {
    fn from(err: TxnError<CreditError>) -> Self {
        match err {
            TxnError::Aborted(e) => e,
            TxnError::Contention { attempts, .. } => CreditError::Aborted(attempts),
        }
    }
}

impl From<TxnError<DebitError>> for DebitError {
    fn from(err: TxnError<DebitError>) -> Self {
        match err {
            TxnError::Aborted(e) => e,
            TxnError::Contention { attempts, .. } => DebitError::Aborted(attempts),
        }
    }
}

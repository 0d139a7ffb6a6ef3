//! Withdrawal request queue.
//!
//! A payout request is an audit/fulfillment artifact, never the authority on
//! balance: it is appended strictly after, and only if, the ledger debit
//! commits. The pending records are consumed by an out-of-band settlement
//! process that moves them to a terminal status.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::Amount;
use crate::ledger::{DebitError, Ledger};
use crate::model::{RequestStatus, WithdrawalRequest};
use crate::store::Collection;

#[derive(Debug, Error)]
pub enum WithdrawError {
    /// Presence check only. Correctness of banking details is outside
    /// system responsibility.
    #[error("bank name and account number are required")]
    MissingBankDetails,

    #[error(transparent)]
    Debit(#[from] DebitError),
}

/// Outcome of a completed withdrawal request.
#[derive(Debug, Clone)]
pub struct WithdrawalReceipt {
    pub request_id: String,
    pub amount: Amount,
    pub remaining: Amount,
}

/// The withdrawal service: atomic debit followed by a request record.
pub struct Withdrawals {
    ledger: Arc<Ledger>,
    requests: Arc<Collection<WithdrawalRequest>>,
}

impl Withdrawals {
    pub fn new(ledger: Arc<Ledger>, requests: Arc<Collection<WithdrawalRequest>>) -> Self {
        Self { ledger, requests }
    }

    /// Full withdrawal flow: validate that bank details are present, debit
    /// the wallet atomically, then append a pending request for the exact
    /// debited amount.
    ///
    /// A failed debit leaves no request behind; a committed debit always
    /// gains its matching request before this returns.
    pub async fn request(
        &self,
        user_id: &str,
        username: &str,
        amount: Amount,
        bank_name: &str,
        account_number: &str,
    ) -> Result<WithdrawalReceipt, WithdrawError> {
        if bank_name.trim().is_empty() || account_number.trim().is_empty() {
            info!(user = user_id, "withdrawal skipped: missing bank details");
            return Err(WithdrawError::MissingBankDetails);
        }

        let remaining = self.ledger.debit_for_withdrawal(user_id, amount).await?;
        let request_id = self
            .enqueue(user_id, username, amount, bank_name, account_number)
            .await;

        info!(
            user = user_id,
            request = %request_id,
            amount = %amount,
            remaining = %remaining,
            "withdrawal recorded"
        );

        Ok(WithdrawalReceipt {
            request_id,
            amount,
            remaining,
        })
    }

    /// Pure append of a pending request record. Must only be called after a
    /// successful debit for the same amount.
    pub async fn enqueue(
        &self,
        user_id: &str,
        username: &str,
        amount: Amount,
        bank_name: &str,
        account_number: &str,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let request = WithdrawalRequest {
            id: id.clone(),
            user_id: user_id.to_owned(),
            username: username.to_owned(),
            account_number: account_number.to_owned(),
            bank_name: bank_name.to_owned(),
            amount,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        self.requests.set(&id, request).await;
        id
    }

    /// Requests awaiting settlement.
    pub async fn pending(&self) -> Vec<WithdrawalRequest> {
        self.requests
            .all()
            .await
            .into_iter()
            .map(|(_, request)| request)
            .filter(|request| request.status == RequestStatus::Pending)
            .collect()
    }
}

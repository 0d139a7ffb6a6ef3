//! Wallet ledger: task-completion crediting and withdrawal debiting.
//!
//! The only component here with real consistency requirements. Both
//! operations run as serializable single-document transactions on the
//! user's wallet, which guarantees at-most-once crediting per (user, task)
//! and that no debit ever drives the balance negative, even when two
//! devices act on the same wallet concurrently. The wallet document is the
//! unit of mutual exclusion; no in-process locking is assumed sufficient.

use std::sync::Arc;
use tracing::{info, warn};

use crate::Amount;
use crate::catalog::TaskDoc;
use crate::model::{UserId, Wallet};
use crate::store::{Collection, Txn};

mod error;
pub use error::{CreditError, DebitError, LedgerError};

/// The wallet ledger service.
pub struct Ledger {
    wallets: Arc<Collection<Wallet>>,
    tasks: Arc<Collection<TaskDoc>>,
}

impl Ledger {
    pub fn new(wallets: Arc<Collection<Wallet>>, tasks: Arc<Collection<TaskDoc>>) -> Self {
        Self { wallets, tasks }
    }

    /// Current balance for a user, if a wallet exists. Read-only.
    pub async fn balance(&self, user_id: &str) -> Option<Amount> {
        self.wallets.get(user_id).await.map(|w| w.balance)
    }

    /// Current wallet state for a user. Read-only.
    pub async fn wallet(&self, user_id: &str) -> Option<Wallet> {
        self.wallets.get(user_id).await
    }

    /// Credit `reward` to the user's wallet for completing `task_id`.
    ///
    /// Creates the wallet if absent. A task id already present in the
    /// wallet's completed set aborts with [`CreditError::AlreadyCompleted`]
    /// and writes nothing; completion is absorbing. Returns the new balance.
    ///
    /// After commit the task is marked unavailable as a best-effort
    /// follow-up that may fail independently without rolling back the
    /// credit.
    pub async fn credit_for_task(
        &self,
        user_id: &str,
        task_id: &str,
        reward: Amount,
    ) -> Result<Amount, CreditError> {
        if reward < Amount::ZERO {
            return Err(CreditError::NegativeReward(reward));
        }

        let result = self
            .wallets
            .transaction(user_id, |wallet| match wallet {
                None => {
                    let wallet = Wallet::opened_with(task_id.to_owned(), reward);
                    Ok(Txn::Write(wallet, reward))
                }
                Some(wallet) if wallet.has_completed(task_id) => {
                    Err(CreditError::AlreadyCompleted(task_id.to_owned()))
                }
                Some(wallet) => {
                    let mut next = wallet.clone();
                    next.balance += reward;
                    next.completed_tasks.insert(task_id.to_owned());
                    let balance = next.balance;
                    Ok(Txn::Write(next, balance))
                }
            })
            .await
            .map_err(CreditError::from);

        match &result {
            Ok(balance) => info!(
                user = user_id,
                task = task_id,
                reward = %reward,
                balance = %balance,
                "credit applied"
            ),
            Err(e) => info!(
                user = user_id,
                task = task_id,
                reward = %reward,
                reason = %e,
                "credit skipped"
            ),
        }

        let balance = result?;
        self.retire_task(task_id).await;
        Ok(balance)
    }

    /// Debit `amount` from the user's wallet for a withdrawal.
    ///
    /// Aborts with [`DebitError::NoWallet`] if no wallet exists and
    /// [`DebitError::Insufficient`] if the amount exceeds the balance; in
    /// both cases nothing is written. Returns the remaining balance.
    pub async fn debit_for_withdrawal(
        &self,
        user_id: &str,
        amount: Amount,
    ) -> Result<Amount, DebitError> {
        if !amount.is_positive() {
            return Err(DebitError::InvalidAmount(amount));
        }

        let result = self
            .wallets
            .transaction(user_id, |wallet| {
                let wallet = wallet.ok_or_else(|| DebitError::NoWallet(user_id.to_owned()))?;
                match wallet.balance.checked_sub(amount) {
                    None => Err(DebitError::Insufficient {
                        user: user_id.to_owned(),
                        available: wallet.balance,
                        requested: amount,
                    }),
                    Some(remaining) => {
                        let mut next = wallet.clone();
                        next.balance = remaining;
                        Ok(Txn::Write(next, remaining))
                    }
                }
            })
            .await
            .map_err(DebitError::from);

        match &result {
            Ok(remaining) => info!(
                user = user_id,
                amount = %amount,
                balance = %remaining,
                "debit applied"
            ),
            Err(e) => info!(
                user = user_id,
                amount = %amount,
                reason = %e,
                "debit skipped"
            ),
        }

        result
    }

    /// Flip the task's `available` flag off so it is no longer offered.
    /// Best-effort: a legacy composite id has no document of its own, and a
    /// failure here never affects the committed credit.
    async fn retire_task(&self, task_id: &str) {
        let updated = self
            .tasks
            .update(task_id, |doc| {
                if let Some(fields) = doc.as_object_mut() {
                    fields.insert("available".to_owned(), serde_json::Value::Bool(false));
                }
            })
            .await;

        if !updated {
            warn!(task = task_id, "could not mark task unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fresh() -> (Ledger, Arc<Collection<Wallet>>, Arc<Collection<TaskDoc>>) {
        let wallets = Arc::new(Collection::new("wallets"));
        let tasks = Arc::new(Collection::new("tasks"));
        let ledger = Ledger::new(Arc::clone(&wallets), Arc::clone(&tasks));
        (ledger, wallets, tasks)
    }

    fn naira(n: i64) -> Amount {
        Amount::from_major(n)
    }

    // Credit

    #[tokio::test]
    async fn credit_creates_wallet_with_reward() {
        let (ledger, ..) = fresh();
        let balance = ledger.credit_for_task("u1", "t1", naira(100)).await.unwrap();
        assert_eq!(balance, naira(100));

        let wallet = ledger.wallet("u1").await.unwrap();
        assert_eq!(wallet.balance, naira(100));
        assert!(wallet.has_completed("t1"));
    }

    #[tokio::test]
    async fn credit_accumulates_across_tasks() {
        let (ledger, ..) = fresh();
        ledger.credit_for_task("u1", "t1", naira(100)).await.unwrap();
        let balance = ledger.credit_for_task("u1", "t2", naira(50)).await.unwrap();
        assert_eq!(balance, naira(150));
    }

    #[tokio::test]
    async fn credit_same_task_twice_is_rejected() {
        let (ledger, ..) = fresh();
        ledger.credit_for_task("u1", "t1", naira(100)).await.unwrap();

        let result = ledger.credit_for_task("u1", "t1", naira(100)).await;
        assert!(matches!(result, Err(CreditError::AlreadyCompleted(t)) if t == "t1"));

        // Balance unchanged
        assert_eq!(ledger.balance("u1").await, Some(naira(100)));
    }

    #[tokio::test]
    async fn credit_negative_reward_is_rejected() {
        let (ledger, ..) = fresh();
        let result = ledger
            .credit_for_task("u1", "t1", Amount::from_minor(-1))
            .await;
        assert!(matches!(result, Err(CreditError::NegativeReward(_))));
        assert_eq!(ledger.balance("u1").await, None);
    }

    #[tokio::test]
    async fn credit_zero_reward_still_records_completion() {
        let (ledger, ..) = fresh();
        let balance = ledger.credit_for_task("u1", "t1", Amount::ZERO).await.unwrap();
        assert_eq!(balance, Amount::ZERO);
        assert!(ledger.wallet("u1").await.unwrap().has_completed("t1"));
    }

    #[tokio::test]
    async fn credit_marks_task_unavailable() {
        let (ledger, _, tasks) = fresh();
        tasks
            .set("t1", json!({ "title": "Share a post", "reward": 50 }))
            .await;

        ledger.credit_for_task("u1", "t1", naira(50)).await.unwrap();

        let doc = tasks.get("t1").await.unwrap();
        assert_eq!(doc["available"], json!(false));
    }

    #[tokio::test]
    async fn credit_without_task_doc_still_commits() {
        // legacy composite ids have no document to retire
        let (ledger, ..) = fresh();
        let balance = ledger
            .credit_for_task("u1", "doc1_task1", naira(25))
            .await
            .unwrap();
        assert_eq!(balance, naira(25));
    }

    #[tokio::test]
    async fn wallets_are_independent() {
        let (ledger, ..) = fresh();
        ledger.credit_for_task("u1", "t1", naira(100)).await.unwrap();
        ledger.credit_for_task("u2", "t1", naira(40)).await.unwrap();

        assert_eq!(ledger.balance("u1").await, Some(naira(100)));
        assert_eq!(ledger.balance("u2").await, Some(naira(40)));
    }

    // Debit

    #[tokio::test]
    async fn debit_decreases_balance() {
        let (ledger, ..) = fresh();
        ledger.credit_for_task("u1", "t1", naira(100)).await.unwrap();
        let remaining = ledger.debit_for_withdrawal("u1", naira(30)).await.unwrap();
        assert_eq!(remaining, naira(70));
    }

    #[tokio::test]
    async fn debit_exact_balance_reaches_zero() {
        let (ledger, ..) = fresh();
        ledger.credit_for_task("u1", "t1", naira(100)).await.unwrap();
        let remaining = ledger.debit_for_withdrawal("u1", naira(100)).await.unwrap();
        assert_eq!(remaining, Amount::ZERO);
    }

    #[tokio::test]
    async fn debit_more_than_balance_is_rejected() {
        let (ledger, ..) = fresh();
        ledger.credit_for_task("u1", "t1", naira(100)).await.unwrap();

        let result = ledger.debit_for_withdrawal("u1", naira(150)).await;
        assert!(matches!(
            result,
            Err(DebitError::Insufficient { available, requested, .. })
                if available == naira(100) && requested == naira(150)
        ));

        // Balance unchanged
        assert_eq!(ledger.balance("u1").await, Some(naira(100)));
    }

    #[tokio::test]
    async fn debit_without_wallet_is_rejected() {
        let (ledger, ..) = fresh();
        let result = ledger.debit_for_withdrawal("u1", naira(10)).await;
        assert!(matches!(result, Err(DebitError::NoWallet(u)) if u == "u1"));
    }

    #[tokio::test]
    async fn debit_zero_or_negative_is_rejected() {
        let (ledger, ..) = fresh();
        ledger.credit_for_task("u1", "t1", naira(100)).await.unwrap();

        let zero = ledger.debit_for_withdrawal("u1", Amount::ZERO).await;
        assert!(matches!(zero, Err(DebitError::InvalidAmount(_))));

        let negative = ledger
            .debit_for_withdrawal("u1", Amount::from_minor(-100))
            .await;
        assert!(matches!(negative, Err(DebitError::InvalidAmount(_))));

        assert_eq!(ledger.balance("u1").await, Some(naira(100)));
    }

    #[test]
    fn errors_nest_into_ledger_error() {
        let err: LedgerError = CreditError::AlreadyCompleted("t1".into()).into();
        assert_eq!(
            err.to_string(),
            "credit failed: task t1 already credited to this wallet"
        );

        let err: LedgerError = DebitError::NoWallet("u1".into()).into();
        assert_eq!(
            err.to_string(),
            "withdrawal debit failed: no wallet found for user u1"
        );
    }

    // Concurrency

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_double_submit_credits_once() {
        let wallets = Arc::new(Collection::new("wallets"));
        let tasks = Arc::new(Collection::new("tasks"));
        let ledger = Arc::new(Ledger::new(Arc::clone(&wallets), tasks));

        let a = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.credit_for_task("u1", "t1", naira(100)).await })
        };
        let b = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.credit_for_task("u1", "t1", naira(100)).await })
        };

        let outcomes = [a.await.unwrap(), b.await.unwrap()];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let rejected = outcomes
            .iter()
            .filter(|r| matches!(r, Err(CreditError::AlreadyCompleted(_))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(rejected, 1);
        assert_eq!(ledger.balance("u1").await, Some(naira(100)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_credits_for_distinct_tasks_all_land() {
        let wallets = Arc::new(Collection::new("wallets"));
        let tasks = Arc::new(Collection::new("tasks"));
        let ledger = Arc::new(Ledger::new(wallets, tasks));

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                // retry on contention, as a client would
                loop {
                    match ledger.credit_for_task("u1", &format!("t{i}"), naira(10)).await {
                        Err(CreditError::Aborted(_)) => continue,
                        other => break other,
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(ledger.balance("u1").await, Some(naira(80)));
        assert_eq!(ledger.wallet("u1").await.unwrap().completed_tasks.len(), 8);
    }
}

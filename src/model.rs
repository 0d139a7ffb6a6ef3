//! Core domain types for the wallet ledger.
//!
//! Serde field names follow the persisted document schema, so documents
//! written by this crate stay compatible with records already in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::Amount;

/// User identifier (auth uid, also the wallet document id).
pub type UserId = String;

/// Task identifier. Either a native document id, or `<doc>_<key>` for
/// legacy array-encoded sub-tasks.
pub type TaskId = String;

/// Chat identifier, derived from the sorted participant pair.
pub type ChatId = String;

/// A user's earned-balance account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Current balance. Never negative after a committed operation.
    pub balance: Amount,
    /// Tasks already credited to this wallet. Membership is permanent.
    #[serde(default)]
    pub completed_tasks: HashSet<TaskId>,
}

impl Wallet {
    /// Wallet as first created by an initial credit.
    pub fn opened_with(task_id: TaskId, reward: Amount) -> Self {
        Self {
            balance: reward,
            completed_tasks: HashSet::from([task_id]),
        }
    }

    pub fn has_completed(&self, task_id: &str) -> bool {
        self.completed_tasks.contains(task_id)
    }
}

/// Where a normalized task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSource {
    /// Document with structured fields.
    Structured,
    /// Reconstructed from a legacy array-encoded field; flagged for cleanup.
    LegacyArray,
}

/// An earn-opportunity, normalized from its stored representation.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub reward: Amount,
    pub url: Option<String>,
    pub available: bool,
    pub source: TaskSource,
}

/// Settlement status of a withdrawal request. `Pending` on creation;
/// terminal states are set by the out-of-band settlement process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

/// A pending payout record, created only after its debit committed.
/// The ledger debit is the source of truth for balance; this record is
/// an audit/fulfillment artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: String,
    pub user_id: UserId,
    pub username: String,
    pub account_number: String,
    pub bank_name: String,
    pub amount: Amount,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A two-party chat document with per-participant unread counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub last_message: String,
    pub last_updated: DateTime<Utc>,
    /// Unread message count per participant. Absent entries read as zero.
    #[serde(default)]
    pub unread_count: HashMap<UserId, u32>,
}

impl Chat {
    pub fn new(participants: Vec<UserId>) -> Self {
        Self {
            participants,
            last_message: String::new(),
            last_updated: Utc::now(),
            unread_count: HashMap::new(),
        }
    }

    pub fn unread_for(&self, user_id: &str) -> u32 {
        self.unread_count.get(user_id).copied().unwrap_or(0)
    }
}

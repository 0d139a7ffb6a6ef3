//! Wallet ledger core for a student marketplace app.
//!
//! Task-completion crediting, withdrawal debiting, proof uploads, task
//! catalog normalization and chat unread counters, built on a document
//! store with per-document serializable transactions. UI, navigation and
//! authentication live in the callers; every operation takes an explicit
//! user id instead of reading an ambient current-user singleton.

pub mod amount;
pub mod catalog;
pub mod chat;
pub mod ledger;
pub mod model;
pub mod proof;
pub mod replay;
pub mod store;
pub mod withdrawals;

pub use amount::Amount;
pub use catalog::Catalog;
pub use chat::{ChatService, chat_id_for};
pub use ledger::Ledger;
pub use proof::ProofPipeline;
pub use withdrawals::Withdrawals;

//! CSV replay of ledger operations.
//!
//! Admin/debug tool: re-applies credit and withdrawal rows through the real
//! services and reports final wallet state. Row errors are surfaced to the
//! caller; operation outcomes are logged by the services and never stop a
//! replay.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio_stream::{Stream, StreamExt};

use crate::model::{UserId, Wallet};
use crate::{Amount, Ledger, Withdrawals};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },
}

/// One replayable ledger operation.
#[derive(Debug, Clone)]
pub enum Op {
    Credit {
        user: UserId,
        task: String,
        reward: Amount,
    },
    Withdraw {
        user: UserId,
        amount: Amount,
        bank: String,
        account: String,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    user: String,
    task: Option<String>,
    amount: Option<f64>,
    bank: Option<String>,
    account: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    user: String,
    balance: String,
    completed: usize,
}

/// Read ledger operations from a csv file
pub fn read_ops(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Op, ReplayError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| ReplayError::Parse { line, source })?;
            let missing = |field| ReplayError::MissingField {
                line,
                op: row.op.clone(),
                field,
            };
            match row.op.as_str() {
                "credit" => {
                    let task = row.task.clone().ok_or_else(|| missing("task"))?;
                    let amount = row.amount.ok_or_else(|| missing("amount"))?;
                    Ok(Op::Credit {
                        user: row.user,
                        task,
                        reward: Amount::from_float(amount),
                    })
                }
                "withdraw" => {
                    let amount = row.amount.ok_or_else(|| missing("amount"))?;
                    let bank = row.bank.clone().ok_or_else(|| missing("bank"))?;
                    let account = row.account.clone().ok_or_else(|| missing("account"))?;
                    Ok(Op::Withdraw {
                        user: row.user,
                        amount: Amount::from_float(amount),
                        bank,
                        account,
                    })
                }
                other => Err(ReplayError::UnrecognizedOp {
                    line,
                    op: other.to_string(),
                }),
            }
        })
}

/// Apply a stream of operations to the services.
pub async fn run(
    ledger: &Ledger,
    withdrawals: &Withdrawals,
    mut stream: impl Stream<Item = Op> + Unpin,
) {
    while let Some(op) = stream.next().await {
        // a rejected operation should not stop the replay, so the outcome
        // (already logged by the services) is dropped here
        match op {
            Op::Credit { user, task, reward } => {
                let _ = ledger.credit_for_task(&user, &task, reward).await;
            }
            Op::Withdraw {
                user,
                amount,
                bank,
                account,
            } => {
                let _ = withdrawals
                    .request(&user, &user, amount, &bank, &account)
                    .await;
            }
        }
    }
}

/// write wallet state to stdout in csv format
pub fn write_wallets(wallets: impl IntoIterator<Item = (UserId, Wallet)>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for (user, wallet) in wallets {
        let row = OutputRow {
            user,
            balance: wallet.balance.to_string(),
            completed: wallet.completed_tasks.len(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}

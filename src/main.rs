use std::env;
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use paddi_ledger::replay::{read_ops, run, write_wallets};
use paddi_ledger::store::Collection;
use paddi_ledger::{Ledger, Withdrawals};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args()
        .nth(1)
        .expect("usage: paddi-ledger <operations.csv>");

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let wallets = Arc::new(Collection::new("wallets"));
    let tasks = Arc::new(Collection::new("tasks"));
    let ledger = Arc::new(Ledger::new(Arc::clone(&wallets), tasks));
    let withdrawals = Withdrawals::new(
        Arc::clone(&ledger),
        Arc::new(Collection::new("withdrawal")),
    );

    let (op_sender, op_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in read_ops(&path) {
            match result {
                Ok(op) => {
                    op_sender.send(op).await.unwrap();
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    run(&ledger, &withdrawals, ReceiverStream::new(op_receiver)).await;

    write_wallets(wallets.all().await);
}

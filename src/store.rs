//! In-memory document store with per-document serializable transactions.
//!
//! Stands in for the hosted document store the mobile clients talk to. The
//! primitives mirror what the ledger consumes remotely: plain reads and
//! writes, single-document atomic field updates, optimistic
//! read-then-conditionally-write transactions with bounded conflict retry,
//! and a change feed for reactive consumers.
//!
//! A transaction body runs against a versioned snapshot of one document. If
//! the document changed before commit, the body is re-run against a fresh
//! snapshot; stale state is never reused. A body error aborts with no write.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

/// Conflict retries before a transaction gives up.
const MAX_ATTEMPTS: u32 = 5;

const EVENT_CAPACITY: usize = 64;

/// What a transaction body stages: a document write plus the value returned
/// to the caller, or a read-only result.
pub enum Txn<V, T> {
    Write(V, T),
    ReadOnly(T),
}

/// Failure of a [`Collection::transaction`].
#[derive(Debug, Error)]
pub enum TxnError<E> {
    /// The body signalled abort. Nothing was written.
    #[error("transaction aborted: {0}")]
    Aborted(E),
    /// The document kept changing under the transaction. The caller should
    /// retry the whole operation from the top, never assume partial success.
    #[error("transaction on '{id}' gave up after {attempts} attempts")]
    Contention { id: String, attempts: u32 },
}

struct Versioned<V> {
    version: u64,
    value: V,
}

/// A named collection of documents keyed by id.
pub struct Collection<V> {
    name: &'static str,
    docs: Mutex<HashMap<String, Versioned<V>>>,
    events: broadcast::Sender<String>,
}

impl<V: Clone> Collection<V> {
    pub fn new(name: &'static str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name,
            docs: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Read one document.
    pub async fn get(&self, id: &str) -> Option<V> {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.get(id).map(|doc| doc.value.clone())
    }

    /// Write one document unconditionally.
    pub async fn set(&self, id: &str, value: V) {
        {
            let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
            let version = docs.get(id).map_or(0, |doc| doc.version) + 1;
            docs.insert(id.to_owned(), Versioned { version, value });
        }
        let _ = self.events.send(id.to_owned());
    }

    /// Snapshot of every document, in no particular order.
    pub async fn all(&self) -> Vec<(String, V)> {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.iter()
            .map(|(id, doc)| (id.clone(), doc.value.clone()))
            .collect()
    }

    /// Atomic single-document field update (the increment/set primitive).
    /// Returns `false` if the document does not exist.
    pub async fn update(&self, id: &str, mutate: impl FnOnce(&mut V)) -> bool {
        let found = {
            let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
            match docs.get_mut(id) {
                Some(doc) => {
                    mutate(&mut doc.value);
                    doc.version += 1;
                    true
                }
                None => false,
            }
        };
        if found {
            let _ = self.events.send(id.to_owned());
        }
        found
    }

    /// Merge-style write: create the document if absent, then mutate it.
    pub async fn upsert(&self, id: &str, init: impl FnOnce() -> V, mutate: impl FnOnce(&mut V)) {
        {
            let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
            let doc = docs.entry(id.to_owned()).or_insert_with(|| Versioned {
                version: 0,
                value: init(),
            });
            mutate(&mut doc.value);
            doc.version += 1;
        }
        let _ = self.events.send(id.to_owned());
    }

    /// Ids of committed writes, for reactive consumers (balance displays,
    /// task lists). Ledger operations never rely on this feed.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    /// Serializable read-then-conditionally-write on a single document.
    ///
    /// The body observes the current document (or its absence) and either
    /// stages a write, finishes read-only, or aborts with an error. On
    /// commit conflict the body re-runs against a fresh snapshot, up to
    /// [`MAX_ATTEMPTS`] times.
    pub async fn transaction<T, E, F>(&self, id: &str, mut body: F) -> Result<T, TxnError<E>>
    where
        F: FnMut(Option<&V>) -> Result<Txn<V, T>, E>,
    {
        for _ in 0..MAX_ATTEMPTS {
            let snapshot: Option<(u64, V)> = {
                let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
                docs.get(id).map(|doc| (doc.version, doc.value.clone()))
            };

            // Suspension point: a hosted store performs a network round-trip
            // between snapshot read and commit.
            tokio::task::yield_now().await;

            let observed = snapshot.as_ref().map(|(version, _)| *version);
            let staged =
                body(snapshot.as_ref().map(|(_, value)| value)).map_err(TxnError::Aborted)?;

            match staged {
                Txn::ReadOnly(result) => return Ok(result),
                Txn::Write(value, result) => {
                    let committed = {
                        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
                        let current = docs.get(id).map(|doc| doc.version);
                        if current == observed {
                            let version = current.unwrap_or(0) + 1;
                            docs.insert(id.to_owned(), Versioned { version, value });
                            true
                        } else {
                            false
                        }
                    };
                    if committed {
                        let _ = self.events.send(id.to_owned());
                        return Ok(result);
                    }
                    // conflict: loop re-reads and re-runs the body
                }
            }
        }

        warn!(
            collection = self.name,
            doc = id,
            attempts = MAX_ATTEMPTS,
            "transaction contention exhausted"
        );
        Err(TxnError::Contention {
            id: id.to_owned(),
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Synchronous write used by tests to interleave a conflicting commit
    /// while a transaction body is running.
    #[cfg(test)]
    fn set_sync(&self, id: &str, value: V) {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        let version = docs.get(id).map_or(0, |doc| doc.version) + 1;
        docs.insert(id.to_owned(), Versioned { version, value });
    }
}

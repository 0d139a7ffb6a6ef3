//! Chat unread counters.
//!
//! Per-chat, per-participant counters maintained with independent atomic
//! field updates rather than transactions. If a send and an open for the
//! same user race, the last write wins; that is acceptable for an
//! approximate UI affordance and explicitly weaker than the wallet ledger's
//! guarantees. Never copy this pattern for financial state.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::model::{Chat, ChatId, UserId};
use crate::store::Collection;

/// Deterministic chat id for a participant pair: deduplicated, sorted,
/// joined with `_`. Both parties derive the same id independently.
pub fn chat_id_for(a: &str, b: &str) -> ChatId {
    let mut ids = vec![a, b];
    ids.sort_unstable();
    ids.dedup();
    ids.join("_")
}

/// The chat counter service.
pub struct ChatService {
    chats: Arc<Collection<Chat>>,
}

impl ChatService {
    pub fn new(chats: Arc<Collection<Chat>>) -> Self {
        Self { chats }
    }

    /// Record a sent message: merge the chat document (created on first
    /// exchange) and bump the unread counter of every other participant.
    pub async fn on_send(
        &self,
        chat_id: &str,
        sender_id: &str,
        participants: &[UserId],
        text: &str,
    ) {
        self.chats
            .upsert(
                chat_id,
                || Chat::new(participants.to_vec()),
                |chat| {
                    chat.participants = participants.to_vec();
                    chat.last_message = text.to_owned();
                    chat.last_updated = Utc::now();
                },
            )
            .await;

        for participant in participants {
            if participant != sender_id {
                let recipient = participant.clone();
                self.chats
                    .update(chat_id, |chat| {
                        *chat.unread_count.entry(recipient).or_insert(0) += 1;
                    })
                    .await;
            }
        }
    }

    /// The user opened the chat: zero their unread counter, regardless of
    /// its value. A missing chat document is tolerated (first-open race).
    pub async fn on_open(&self, chat_id: &str, user_id: &str) {
        let updated = self
            .chats
            .update(chat_id, |chat| {
                chat.unread_count.insert(user_id.to_owned(), 0);
            })
            .await;
        if !updated {
            debug!(chat = chat_id, "open before first message; nothing to reset");
        }
    }

    pub async fn chat(&self, chat_id: &str) -> Option<Chat> {
        self.chats.get(chat_id).await
    }

    pub async fn unread(&self, chat_id: &str, user_id: &str) -> u32 {
        self.chats
            .get(chat_id)
            .await
            .map_or(0, |chat| chat.unread_for(user_id))
    }
}

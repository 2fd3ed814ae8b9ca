use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{HistoryEntry, HistoryStore};
use crate::error::Result;

/// History kept in process memory, lost on restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    chats: Arc<RwLock<HashMap<i64, Vec<HistoryEntry>>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all chats.
    pub async fn len(&self) -> usize {
        self.chats.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut chats = self.chats.write().await;
        let entries = chats.entry(entry.chat_id).or_default();
        // Same message id replaces the earlier text
        match entries.iter_mut().find(|e| e.message_id == entry.message_id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn history(&self, chat_id: i64) -> Result<Vec<HistoryEntry>> {
        let chats = self.chats.read().await;
        let mut entries = chats.get(&chat_id).cloned().unwrap_or_default();
        entries.sort_by_key(|e| e.message_id);
        Ok(entries)
    }

    async fn clear(&self, chat_id: i64) -> Result<()> {
        let removed = self.chats.write().await.remove(&chat_id);
        debug!(
            chat_id,
            removed = removed.map_or(0, |entries| entries.len()),
            "cleared history"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::Role;

    fn entry(chat_id: i64, message_id: i64, text: &str) -> HistoryEntry {
        HistoryEntry {
            message_id,
            chat_id,
            role: Role::User,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn history_is_ordered_by_message_id() {
        let store = InMemoryHistory::new();
        store.append(entry(1, 5, "later")).await.unwrap();
        store.append(entry(1, 2, "earlier")).await.unwrap();
        store.append(entry(2, 1, "other chat")).await.unwrap();

        let texts: Vec<_> = store
            .history(1)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(texts, vec!["earlier", "later"]);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn same_id_replaces() {
        let store = InMemoryHistory::new();
        store.append(entry(1, 1, "partial")).await.unwrap();
        store.append(entry(1, 1, "complete")).await.unwrap();
        assert_eq!(store.history(1).await.unwrap(), vec![entry(1, 1, "complete")]);
    }

    #[tokio::test]
    async fn clear_only_touches_one_chat() {
        let store = InMemoryHistory::new();
        store.append(entry(1, 1, "a")).await.unwrap();
        store.append(entry(2, 1, "b")).await.unwrap();
        store.clear(1).await.unwrap();
        assert!(store.history(1).await.unwrap().is_empty());
        assert_eq!(store.history(2).await.unwrap().len(), 1);
        store.clear(2).await.unwrap();
        assert!(store.is_empty().await);
    }
}

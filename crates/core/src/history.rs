use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::message::SessionRecord;

/// Durable storage for finished conversations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, record: SessionRecord) -> anyhow::Result<()>;
}

/// Keeps records in memory, newest last.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistoryStore {
    records: Arc<Mutex<Vec<SessionRecord>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save(&self, record: SessionRecord) -> anyhow::Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatMessage;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn memory_store_keeps_records_in_order() {
        let store = MemoryHistoryStore::new();
        for text in ["first", "second"] {
            let record = SessionRecord::from_conversation(
                Uuid::new_v4(),
                Utc::now(),
                &[ChatMessage::user(text)],
            )
            .unwrap();
            store.save(record).await.unwrap();
        }
        let titles: Vec<_> = store.records().await.into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }
}

use crate::database::schema::KEY_PATH;
use crate::database::{BackupQueueItem, Collection, Fields, Store};
use crate::error::Result;
use chrono::Utc;

/// Items waiting for an external synchronization pass.
///
/// Never drained here; the sync collaborator reads the queue and then
/// calls [`clear`](Self::clear).
#[derive(Clone)]
pub struct BackupQueueRepository {
    store: Store,
}

impl BackupQueueRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn enqueue(&self, mut payload: Fields) -> Result<BackupQueueItem> {
        // Identity and timestamp belong to the queue
        for reserved in [KEY_PATH, "timestamp"] {
            if payload.remove(reserved).is_some() {
                tracing::debug!("Dropped reserved field {} from queued payload", reserved);
            }
        }

        let mut item = BackupQueueItem {
            id: None,
            timestamp: Utc::now(),
            payload,
        };

        let key = self.store.insert(Collection::BackupQueue, &item).await?;
        item.id = key.as_int();

        tracing::debug!("Queued backup item {}", key);
        Ok(item)
    }

    pub async fn get_all(&self) -> Result<Vec<BackupQueueItem>> {
        self.store.get_all(Collection::BackupQueue).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear(Collection::BackupQueue).await
    }
}

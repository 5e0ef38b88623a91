use crate::database::{AnalyticsEvent, Collection, Fields, Store};
use crate::error::Result;
use chrono::Utc;

/// Append-only usage event log
#[derive(Clone)]
pub struct AnalyticsRepository {
    store: Store,
}

impl AnalyticsRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record an event. There is no update path.
    pub async fn log(&self, event_type: &str, data: Fields) -> Result<AnalyticsEvent> {
        let mut event = AnalyticsEvent {
            id: None,
            event_type: event_type.to_string(),
            data,
            timestamp: Utc::now(),
        };

        let key = self.store.insert(Collection::Analytics, &event).await?;
        event.id = key.as_int();

        tracing::debug!("Logged event {}: {}", key, event_type);
        Ok(event)
    }

    pub async fn get_all(&self) -> Result<Vec<AnalyticsEvent>> {
        self.store.get_all(Collection::Analytics).await
    }

    pub async fn get_by_type(&self, event_type: &str) -> Result<Vec<AnalyticsEvent>> {
        self.store
            .query_by_index(Collection::Analytics, "eventType", event_type)
            .await
    }

    /// Up to `limit` events, most recent first
    pub async fn recent(&self, limit: usize) -> Result<Vec<AnalyticsEvent>> {
        let mut events = self.get_all().await?;
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{event_types, to_fields};
    use serde_json::json;

    async fn create_test_repo() -> AnalyticsRepository {
        AnalyticsRepository::new(Store::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_log_is_append_only() {
        let repo = create_test_repo().await;

        for template_id in 1..=3 {
            repo.log(
                event_types::FORM_SUBMITTED,
                to_fields(json!({ "templateId": template_id })),
            )
            .await
            .unwrap();
        }
        repo.log(event_types::PDF_EXPORT, Fields::new()).await.unwrap();

        let submitted = repo.get_by_type(event_types::FORM_SUBMITTED).await.unwrap();
        assert_eq!(submitted.len(), 3);

        let ids: Vec<i64> = submitted.iter().filter_map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        for pair in submitted.windows(2) {
            assert!(pair[1].timestamp >= pair[0].timestamp);
        }
        assert_eq!(submitted[2].data["templateId"], 3);

        assert_eq!(repo.get_all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_recent() {
        let repo = create_test_repo().await;

        for event_type in ["a", "b", "c"] {
            repo.log(event_type, Fields::new()).await.unwrap();
        }

        let recent = repo.recent(2).await.unwrap();
        let types: Vec<&str> = recent.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["c", "b"]);
    }
}

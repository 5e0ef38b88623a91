use crate::database::{Collection, Response, Store};
use crate::error::{AppError, Result};
use chrono::Utc;

#[derive(Clone)]
pub struct ResponseRepository {
    store: Store,
}

impl ResponseRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Save a response, inserting it when it has no id yet.
    ///
    /// `submittedAt` is set on first save and never refreshed.
    pub async fn save(&self, mut response: Response) -> Result<Response> {
        response.submitted_at.get_or_insert_with(Utc::now);

        let key = match response.id {
            Some(_) => self.store.upsert(Collection::Responses, &response).await?,
            None => self.store.insert(Collection::Responses, &response).await?,
        };

        let id = key.as_int().ok_or_else(|| AppError::InvalidRecord {
            collection: Collection::Responses,
            reason: format!("unexpected key {}", key),
        })?;
        response.id = Some(id);

        tracing::debug!("Saved response {} for template {}", id, response.template_id);
        Ok(response)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Response>> {
        self.store.get(Collection::Responses, id).await
    }

    pub async fn get_all(&self) -> Result<Vec<Response>> {
        self.store.get_all(Collection::Responses).await
    }

    /// All responses, most recently submitted first
    pub async fn get_all_newest_first(&self) -> Result<Vec<Response>> {
        let mut responses = self.get_all().await?;
        responses.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        Ok(responses)
    }

    pub async fn get_by_template(&self, template_id: i64) -> Result<Vec<Response>> {
        self.store
            .query_by_index(Collection::Responses, "templateId", template_id)
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete(Collection::Responses, id).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.store.count(Collection::Responses).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Answer;
    use std::collections::BTreeMap;

    async fn create_test_repo() -> ResponseRepository {
        ResponseRepository::new(Store::open_in_memory().await.unwrap())
    }

    fn response_for(template_id: i64, client: &str) -> Response {
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), Answer::Text(client.to_string()));
        answers.insert("q2".to_string(), Answer::Choices(vec!["a".to_string()]));
        Response::new(template_id, Some(client.to_string()), answers)
    }

    #[tokio::test]
    async fn test_insert_and_update() {
        let repo = create_test_repo().await;

        let saved = repo.save(response_for(1, "Dana")).await.unwrap();
        assert_eq!(saved.id, Some(1));
        let submitted_at = saved.submitted_at;
        assert!(submitted_at.is_some());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut edited = saved.clone();
        edited.client_name = Some("Dana Scully".to_string());
        let resaved = repo.save(edited).await.unwrap();

        assert_eq!(resaved.id, saved.id);
        assert_eq!(resaved.submitted_at, submitted_at);
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
        assert_eq!(repo.get(1).await.unwrap().unwrap(), resaved);
    }

    #[tokio::test]
    async fn test_get_by_template() {
        let repo = create_test_repo().await;

        repo.save(response_for(1, "a")).await.unwrap();
        repo.save(response_for(2, "b")).await.unwrap();
        repo.save(response_for(1, "c")).await.unwrap();

        let for_first = repo.get_by_template(1).await.unwrap();
        let names: Vec<_> = for_first.iter().filter_map(|r| r.client_name.as_deref()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(repo.get_by_template(9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_newest_first() {
        let repo = create_test_repo().await;

        for client in ["first", "second", "third"] {
            repo.save(response_for(1, client)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let newest = repo.get_all_newest_first().await.unwrap();
        assert_eq!(newest[0].client_name.as_deref(), Some("third"));
        assert_eq!(newest[2].client_name.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = create_test_repo().await;

        let saved = repo.save(response_for(1, "a")).await.unwrap();
        repo.delete(saved.id.unwrap()).await.unwrap();

        assert!(repo.get(saved.id.unwrap()).await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}

use crate::database::{Collection, Store, Template};
use crate::error::{AppError, Result};
use crate::validation::{ensure_valid, validate_template};
use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct TemplateRepository {
    store: Store,
}

impl TemplateRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Save a template, inserting it when it has no id yet.
    ///
    /// `createdAt` is kept once set; `updatedAt` is refreshed on every save.
    pub async fn save(&self, template: Template) -> Result<Template> {
        let now = Utc::now();
        self.write(template, now, Some(now)).await
    }

    /// Write a template as exported, keeping timestamps it already carries.
    ///
    /// Ids and validation follow [`save`](Self::save).
    pub async fn restore(&self, template: Template) -> Result<Template> {
        self.write(template, Utc::now(), None).await
    }

    async fn write(
        &self,
        mut template: Template,
        now: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<Template> {
        ensure_valid(validate_template(&template))?;

        let created_at = *template.created_at.get_or_insert(now);
        template.updated_at = updated_at.or(template.updated_at).or(Some(created_at));

        let key = match template.id {
            Some(_) => self.store.upsert(Collection::Templates, &template).await?,
            None => self.store.insert(Collection::Templates, &template).await?,
        };

        let id = key.as_int().ok_or_else(|| AppError::InvalidRecord {
            collection: Collection::Templates,
            reason: format!("unexpected key {}", key),
        })?;
        template.id = Some(id);

        tracing::debug!("Saved template {}: {}", id, template.name);
        Ok(template)
    }

    /// Get a template by id, `None` if it does not exist
    pub async fn get(&self, id: i64) -> Result<Option<Template>> {
        self.store.get(Collection::Templates, id).await
    }

    pub async fn get_all(&self) -> Result<Vec<Template>> {
        self.store.get_all(Collection::Templates).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Vec<Template>> {
        self.store
            .query_by_index(Collection::Templates, "name", name)
            .await
    }

    /// Delete a template. Responses that reference it are left in place.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete(Collection::Templates, id).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.store.count(Collection::Templates).await
    }
}

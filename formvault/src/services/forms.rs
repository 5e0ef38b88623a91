//! Forms service
//!
//! High-level operations behind the designer, fill-out and response
//! screens. Template lookups that must succeed raise `NotFound`; listings
//! tolerate responses whose template has been deleted.

use crate::config::UNKNOWN_TEMPLATE_NAME;
use crate::database::{
    event_types, to_fields, Answer, AnalyticsRepository, QuestionType, Response, ResponseRepository,
    Template, TemplateRepository,
};
use crate::error::{AppError, Result};
use crate::validation::{ensure_valid, validate_response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

/// One row of the responses list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSummary {
    pub id: i64,
    pub template_id: i64,
    pub template_name: String,
    pub client_name: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Totals and recent submissions for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub template_count: usize,
    pub response_count: usize,
    pub templates: Vec<Template>,
    pub recent_responses: Vec<ResponseSummary>,
}

/// Service for designing templates and collecting responses
#[derive(Clone)]
pub struct FormsService {
    templates: TemplateRepository,
    responses: ResponseRepository,
    analytics: AnalyticsRepository,
}

impl FormsService {
    pub fn new(
        templates: TemplateRepository,
        responses: ResponseRepository,
        analytics: AnalyticsRepository,
    ) -> Self {
        Self {
            templates,
            responses,
            analytics,
        }
    }

    pub async fn save_template(&self, template: Template) -> Result<Template> {
        tracing::info!("Saving template: {}", template.name);

        let is_new = template.id.is_none();
        let saved = self.templates.save(template).await?;

        self.analytics
            .log(
                event_types::TEMPLATE_SAVED,
                to_fields(json!({ "templateId": saved.id, "isNew": is_new })),
            )
            .await?;

        tracing::info!("Template saved successfully: {:?}", saved.id);
        Ok(saved)
    }

    /// Fetch a template the caller cannot proceed without
    pub async fn require_template(&self, id: i64) -> Result<Template> {
        self.templates
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Template", id))
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        self.templates.get_all().await
    }

    /// Delete a template. Its responses are kept and become orphans.
    pub async fn delete_template(&self, id: i64) -> Result<()> {
        tracing::info!("Deleting template: {}", id);

        self.templates.delete(id).await?;
        self.analytics
            .log(event_types::TEMPLATE_DELETED, to_fields(json!({ "templateId": id })))
            .await?;

        Ok(())
    }

    /// Validate and store a filled-out form.
    ///
    /// Blank answers are dropped; checkbox questions always get a list.
    pub async fn submit_response(
        &self,
        template_id: i64,
        client_name: Option<String>,
        answers: BTreeMap<String, Answer>,
    ) -> Result<Response> {
        let template = self.require_template(template_id).await?;

        let client_name = client_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let response = Response::new(template_id, client_name, normalize_answers(&template, answers));

        ensure_valid(validate_response(&template, &response))?;

        let saved = self.responses.save(response).await?;

        self.analytics
            .log(
                event_types::FORM_SUBMITTED,
                to_fields(json!({ "templateId": template_id, "clientName": saved.client_name })),
            )
            .await?;

        tracing::info!("Response {:?} submitted for template {}", saved.id, template_id);
        Ok(saved)
    }

    pub async fn require_response(&self, id: i64) -> Result<Response> {
        self.responses
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Response", id))
    }

    pub async fn delete_response(&self, id: i64) -> Result<()> {
        tracing::info!("Deleting response: {}", id);
        self.responses.delete(id).await
    }

    /// Responses newest first, each labelled with its template's name
    pub async fn response_summaries(&self) -> Result<Vec<ResponseSummary>> {
        let (templates, responses) = tokio::try_join!(
            self.templates.get_all(),
            self.responses.get_all_newest_first()
        )?;
        Ok(summarize(&templates, responses))
    }

    pub async fn dashboard(&self, recent_limit: usize) -> Result<Dashboard> {
        let (templates, responses) = tokio::try_join!(
            self.templates.get_all(),
            self.responses.get_all_newest_first()
        )?;

        let response_count = responses.len();
        let mut recent_responses = summarize(&templates, responses);
        recent_responses.truncate(recent_limit);

        Ok(Dashboard {
            template_count: templates.len(),
            response_count,
            templates,
            recent_responses,
        })
    }
}

fn summarize(templates: &[Template], responses: Vec<Response>) -> Vec<ResponseSummary> {
    let names: HashMap<i64, &str> = templates
        .iter()
        .filter_map(|t| t.id.map(|id| (id, t.name.as_str())))
        .collect();

    responses
        .into_iter()
        .filter_map(|response| {
            let id = response.id?;
            let template_name = match names.get(&response.template_id) {
                Some(name) => name.to_string(),
                None => {
                    tracing::warn!(
                        "Response {} references missing template {}",
                        id,
                        response.template_id
                    );
                    UNKNOWN_TEMPLATE_NAME.to_string()
                }
            };
            Some(ResponseSummary {
                id,
                template_id: response.template_id,
                template_name,
                client_name: response.client_name,
                submitted_at: response.submitted_at,
            })
        })
        .collect()
}

/// Drop blank and unknown answers and give every checkbox question a list.
fn normalize_answers(template: &Template, mut answers: BTreeMap<String, Answer>) -> BTreeMap<String, Answer> {
    let mut normalized = BTreeMap::new();

    for question in template.questions() {
        match (question.question_type, answers.remove(&question.id)) {
            (QuestionType::Checkbox, Some(Answer::Text(text))) if text.is_empty() => {
                normalized.insert(question.id.clone(), Answer::Choices(Vec::new()));
            }
            (QuestionType::Checkbox, None) => {
                normalized.insert(question.id.clone(), Answer::Choices(Vec::new()));
            }
            (_, Some(Answer::Text(text))) if text.trim().is_empty() => {}
            (_, Some(answer)) => {
                normalized.insert(question.id.clone(), answer);
            }
            (_, None) => {}
        }
    }

    if !answers.is_empty() {
        tracing::debug!("Ignored {} answers to unknown questions", answers.len());
    }

    normalized
}

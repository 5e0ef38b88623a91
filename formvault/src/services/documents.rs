//! Document service
//!
//! Turns a template, optionally with a response, into the printable view
//! handed to the external PDF generator. Missing answers, malformed
//! signatures and deleted templates degrade to placeholder text.

use crate::config::{
    NO_ANSWER_TEXT, SIGNATURE_DATA_PREFIX, SIGNATURE_UNAVAILABLE_TEXT, UNKNOWN_TEMPLATE_NAME,
};
use crate::database::{
    event_types, to_fields, Answer, AnalyticsRepository, BrandingRecord, BrandingRepository, Question,
    QuestionType, Response, ResponseRepository, Template, TemplateRepository,
};
use crate::error::{AppError, Result};
use serde::Serialize;
use serde_json::json;

/// Company header printed at the top of every page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHeader {
    pub company_name: String,
    pub contact_lines: Vec<String>,
}

/// What is printed under a question label
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ItemValue {
    /// Blank form: an empty field of the question's type
    Blank {
        question_type: QuestionType,
        options: Vec<String>,
    },
    Text(String),
    /// Image data URI of a captured signature
    Signature(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentItem {
    pub label: String,
    pub required: bool,
    pub value: ItemValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSection {
    pub title: String,
    pub description: String,
    pub items: Vec<DocumentItem>,
}

/// Printable form, blank or filled
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDocument {
    pub title: String,
    pub client_name: Option<String>,
    pub header: Option<DocumentHeader>,
    pub sections: Vec<DocumentSection>,
}

impl FormDocument {
    /// Empty form for printing and filling by hand
    pub fn blank(template: &Template, branding: Option<&BrandingRecord>) -> Self {
        let sections = template
            .sections
            .iter()
            .map(|section| DocumentSection {
                title: section.title.clone(),
                description: section.description.clone(),
                items: section
                    .questions
                    .iter()
                    .map(|question| DocumentItem {
                        label: question.label.clone(),
                        required: question.required,
                        value: ItemValue::Blank {
                            question_type: question.question_type,
                            options: question.options.clone().unwrap_or_default(),
                        },
                    })
                    .collect(),
            })
            .collect();

        Self {
            title: template.name.clone(),
            client_name: None,
            header: branding.and_then(header),
            sections,
        }
    }

    /// Filled form. Without its template the raw answers are listed by
    /// question id under a placeholder title.
    pub fn filled(
        template: Option<&Template>,
        response: &Response,
        branding: Option<&BrandingRecord>,
    ) -> Self {
        let sections = match template {
            Some(template) => template
                .sections
                .iter()
                .map(|section| DocumentSection {
                    title: section.title.clone(),
                    description: section.description.clone(),
                    items: section
                        .questions
                        .iter()
                        .map(|question| answered_item(question, response.answers.get(&question.id)))
                        .collect(),
                })
                .collect(),
            None => vec![DocumentSection {
                title: "Responses".to_string(),
                description: String::new(),
                items: response
                    .answers
                    .iter()
                    .map(|(question_id, answer)| DocumentItem {
                        label: question_id.clone(),
                        required: false,
                        value: text_value(answer),
                    })
                    .collect(),
            }],
        };

        Self {
            title: template.map_or_else(|| UNKNOWN_TEMPLATE_NAME.to_string(), |t| t.name.clone()),
            client_name: response.client_name.clone(),
            header: branding.and_then(header),
            sections,
        }
    }
}

fn header(branding: &BrandingRecord) -> Option<DocumentHeader> {
    if branding.company_name.trim().is_empty() {
        return None;
    }

    let contact_lines = [&branding.email, &branding.phone, &branding.website]
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .cloned()
        .collect();

    Some(DocumentHeader {
        company_name: branding.company_name.clone(),
        contact_lines,
    })
}

fn answered_item(question: &Question, answer: Option<&Answer>) -> DocumentItem {
    let value = match answer {
        None => ItemValue::Text(NO_ANSWER_TEXT.to_string()),
        Some(answer) if answer.is_empty() => ItemValue::Text(NO_ANSWER_TEXT.to_string()),
        Some(Answer::Text(payload)) if question.question_type == QuestionType::Signature => {
            if is_signature_image(payload) {
                ItemValue::Signature(payload.clone())
            } else {
                tracing::warn!("Malformed signature payload for question {}", question.id);
                ItemValue::Text(SIGNATURE_UNAVAILABLE_TEXT.to_string())
            }
        }
        Some(answer) => text_value(answer),
    };

    DocumentItem {
        label: question.label.clone(),
        required: question.required,
        value,
    }
}

fn text_value(answer: &Answer) -> ItemValue {
    if answer.is_empty() {
        ItemValue::Text(NO_ANSWER_TEXT.to_string())
    } else {
        ItemValue::Text(answer.to_string())
    }
}

/// A data URI carrying an image with a non-empty payload
fn is_signature_image(payload: &str) -> bool {
    payload.starts_with(SIGNATURE_DATA_PREFIX)
        && payload
            .split_once(',')
            .map_or(false, |(_, data)| !data.trim().is_empty())
}

/// External PDF generator
pub trait PdfRenderer: Send + Sync {
    fn render(&self, document: &FormDocument) -> Result<Vec<u8>>;
}

/// Rendered document with its suggested download name
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Service producing blank and filled documents
#[derive(Clone)]
pub struct DocumentService {
    branding: BrandingRepository,
    templates: TemplateRepository,
    responses: ResponseRepository,
    analytics: AnalyticsRepository,
}

impl DocumentService {
    pub fn new(
        branding: BrandingRepository,
        templates: TemplateRepository,
        responses: ResponseRepository,
        analytics: AnalyticsRepository,
    ) -> Self {
        Self {
            branding,
            templates,
            responses,
            analytics,
        }
    }

    pub async fn blank_document(&self, template_id: i64) -> Result<FormDocument> {
        let (template, branding) =
            tokio::try_join!(self.templates.get(template_id), self.branding.get())?;
        let template = template.ok_or_else(|| AppError::not_found("Template", template_id))?;

        Ok(FormDocument::blank(&template, branding.as_ref()))
    }

    /// The response must exist; its template may not.
    pub async fn filled_document(&self, response_id: i64) -> Result<FormDocument> {
        let response = self
            .responses
            .get(response_id)
            .await?
            .ok_or_else(|| AppError::not_found("Response", response_id))?;

        let (template, branding) =
            tokio::try_join!(self.templates.get(response.template_id), self.branding.get())?;

        if template.is_none() {
            tracing::warn!(
                "Response {} references missing template {}",
                response_id,
                response.template_id
            );
        }

        Ok(FormDocument::filled(template.as_ref(), &response, branding.as_ref()))
    }

    pub async fn export_blank(&self, renderer: &dyn PdfRenderer, template_id: i64) -> Result<RenderedDocument> {
        let document = self.blank_document(template_id).await?;
        let bytes = renderer.render(&document)?;

        self.analytics
            .log(
                event_types::PDF_EXPORT,
                to_fields(json!({ "templateId": template_id, "type": "blank" })),
            )
            .await?;

        Ok(RenderedDocument {
            file_name: format!("{} - Blank.pdf", document.title),
            bytes,
        })
    }

    pub async fn export_filled(&self, renderer: &dyn PdfRenderer, response_id: i64) -> Result<RenderedDocument> {
        let document = self.filled_document(response_id).await?;
        let bytes = renderer.render(&document)?;

        self.analytics
            .log(
                event_types::PDF_EXPORT,
                to_fields(json!({ "responseId": response_id, "type": "filled" })),
            )
            .await?;

        let file_name = match &document.client_name {
            Some(client) => format!("{} - {}.pdf", document.title, client),
            None => format!("{} - Response {}.pdf", document.title, response_id),
        };

        Ok(RenderedDocument { file_name, bytes })
    }
}

//! Database models
//!
//! Typed records for every collection of the store.
//! Field names serialize in camelCase, which is also the layout of the
//! exported snapshot document.

use crate::config::BRANDING_KEY;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form event or payload fields
pub type Fields = Map<String, Value>;

/// Fields of a JSON object; anything else yields no fields
pub fn to_fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Company branding, stored once under the fixed key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandingRecord {
    #[serde(default = "branding_key")]
    pub id: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub ein: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn branding_key() -> String {
    BRANDING_KEY.to_string()
}

/// Branding fields to merge into the singleton record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandingUpdate {
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub ein: Option<String>,
    pub address: Option<String>,
}

impl From<BrandingRecord> for BrandingUpdate {
    fn from(record: BrandingRecord) -> Self {
        Self {
            company_name: Some(record.company_name),
            email: Some(record.email),
            phone: Some(record.phone),
            website: Some(record.website),
            ein: Some(record.ein),
            address: Some(record.address),
        }
    }
}

/// Question kinds a form can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Textarea,
    Checkbox,
    Radio,
    Select,
    Signature,
}

impl QuestionType {
    /// Choice questions carry an options list
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            QuestionType::Checkbox | QuestionType::Radio | QuestionType::Select
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuestionType::Text => "text",
            QuestionType::Textarea => "textarea",
            QuestionType::Checkbox => "checkbox",
            QuestionType::Radio => "radio",
            QuestionType::Select => "select",
            QuestionType::Signature => "signature",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Present iff the question is a choice question; order is significant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// A form template made of ordered sections of questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Assigned by the store on first save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Template {
    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    /// Every question in display order
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }
}

/// A submitted answer: one value, or the ticked boxes of a checkbox question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Choices(Vec<String>),
}

impl Answer {
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Text(text) => text.trim().is_empty(),
            Answer::Choices(choices) => choices.is_empty(),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Text(text) => f.write_str(text),
            Answer::Choices(choices) => f.write_str(&choices.join(", ")),
        }
    }
}

/// A client's filled-out form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// May reference a template that no longer exists
    pub template_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Keyed by question id; unanswered questions are absent
    #[serde(default)]
    pub answers: BTreeMap<String, Answer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Response {
    pub fn new(template_id: i64, client_name: Option<String>, answers: BTreeMap<String, Answer>) -> Self {
        Self {
            id: None,
            template_id,
            client_name,
            answers,
            submitted_at: None,
        }
    }
}

/// Well-known analytics event types
pub mod event_types {
    pub const APP_START: &str = "app_start";
    pub const FORM_SUBMITTED: &str = "form_submitted";
    pub const PDF_EXPORT: &str = "pdf_export";
    pub const NAVIGATION: &str = "navigation";
    pub const BRANDING_SETUP: &str = "branding_setup";
    pub const DATA_EXPORT: &str = "data_export";
    pub const DATA_IMPORT: &str = "data_import";
    pub const TEMPLATE_SAVED: &str = "template_saved";
    pub const TEMPLATE_DELETED: &str = "template_deleted";
}

/// Append-only usage event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub event_type: String,
    #[serde(default)]
    pub data: Fields,
    pub timestamp: DateTime<Utc>,
}

/// Work waiting for an external synchronization pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupQueueItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: Fields,
}

/// Portable export of the whole dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branding: Option<BrandingRecord>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub responses: Vec<Response>,
    #[serde(default)]
    pub analytics: Vec<AnalyticsEvent>,
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
}

/// Snapshot as read back from a file.
///
/// Only the envelope is checked up front; each record stays raw JSON until
/// import decodes it, so one malformed record is reported by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    #[serde(default)]
    pub branding: Option<Value>,
    #[serde(default)]
    pub templates: Vec<Value>,
    #[serde(default)]
    pub responses: Vec<Value>,
    #[serde(default)]
    pub analytics: Vec<Value>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

impl SnapshotDocument {
    pub fn from_snapshot(snapshot: &Snapshot) -> serde_json::Result<Self> {
        Ok(Self {
            branding: snapshot.branding.as_ref().map(serde_json::to_value).transpose()?,
            templates: snapshot
                .templates
                .iter()
                .map(serde_json::to_value)
                .collect::<serde_json::Result<_>>()?,
            responses: snapshot
                .responses
                .iter()
                .map(serde_json::to_value)
                .collect::<serde_json::Result<_>>()?,
            analytics: snapshot
                .analytics
                .iter()
                .map(serde_json::to_value)
                .collect::<serde_json::Result<_>>()?,
            exported_at: Some(snapshot.exported_at),
        })
    }
}

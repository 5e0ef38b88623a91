//! Sample templates
//!
//! Ready-made starter forms bundled with the application. Installing one
//! saves a copy as a new template.

use crate::database::{Section, Template, TemplateRepository};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

const SAMPLE_TEMPLATES_JSON: &str = include_str!("sample_templates.json");

/// Bundled starter form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleTemplate {
    pub name: String,
    pub description: String,
    pub category: String,
    pub icon: String,
    pub sections: Vec<Section>,
}

impl SampleTemplate {
    pub fn to_template(&self) -> Template {
        Template {
            sections: self.sections.clone(),
            ..Template::new(self.name.clone())
        }
    }
}

#[derive(Clone)]
pub struct SamplesService {
    templates: TemplateRepository,
    catalog: Vec<SampleTemplate>,
}

impl SamplesService {
    pub fn new(templates: TemplateRepository) -> Result<Self> {
        let catalog: Vec<SampleTemplate> = serde_json::from_str(SAMPLE_TEMPLATES_JSON)?;
        Ok(Self { templates, catalog })
    }

    pub fn list(&self) -> &[SampleTemplate] {
        &self.catalog
    }

    /// Save the sample with the given name (case-insensitive) as a new template
    pub async fn install(&self, name: &str) -> Result<Template> {
        let sample = self
            .catalog
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| AppError::not_found("Sample template", name))?;

        tracing::info!("Installing sample template: {}", sample.name);
        self.templates.save(sample.to_template()).await
    }
}

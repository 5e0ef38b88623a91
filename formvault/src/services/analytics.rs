//! Analytics service
//!
//! Usage totals and the recent activity feed.

use crate::config::RECENT_ACTIVITY_LIMIT;
use crate::database::{
    event_types, AnalyticsEvent, AnalyticsRepository, Fields, ResponseRepository, TemplateRepository,
};
use crate::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total_forms: u64,
    pub total_responses: u64,
    pub form_submissions: usize,
    pub pdf_exports: usize,
    /// Most recent first
    pub recent_activity: Vec<AnalyticsEvent>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    analytics: AnalyticsRepository,
    templates: TemplateRepository,
    responses: ResponseRepository,
}

impl AnalyticsService {
    pub fn new(
        analytics: AnalyticsRepository,
        templates: TemplateRepository,
        responses: ResponseRepository,
    ) -> Self {
        Self {
            analytics,
            templates,
            responses,
        }
    }

    pub async fn log(&self, event_type: &str, data: Fields) -> Result<AnalyticsEvent> {
        self.analytics.log(event_type, data).await
    }

    pub async fn summary(&self) -> Result<UsageSummary> {
        let (total_forms, total_responses, submissions, exports, recent_activity) = tokio::try_join!(
            self.templates.count(),
            self.responses.count(),
            self.analytics.get_by_type(event_types::FORM_SUBMITTED),
            self.analytics.get_by_type(event_types::PDF_EXPORT),
            self.analytics.recent(RECENT_ACTIVITY_LIMIT),
        )?;

        Ok(UsageSummary {
            total_forms,
            total_responses,
            form_submissions: submissions.len(),
            pdf_exports: exports.len(),
            recent_activity,
        })
    }
}

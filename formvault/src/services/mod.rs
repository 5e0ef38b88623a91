//! Services module
//!
//! Business logic services that coordinate between the CLI and repositories.

pub mod analytics;
pub mod backup;
pub mod documents;
pub mod forms;
pub mod samples;

pub use analytics::{AnalyticsService, UsageSummary};
pub use backup::{BackupService, ImportSummary};
pub use documents::{DocumentService, FormDocument, PdfRenderer, RenderedDocument};
pub use forms::{Dashboard, FormsService, ResponseSummary};
pub use samples::{SampleTemplate, SamplesService};

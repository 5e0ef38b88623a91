//! Domain repositories
//!
//! Thin facades over the [`Store`](super::Store), one per collection.
//! Each repository owns the identity and timestamp rules of its records
//! and checks their shape before anything reaches the store.

mod analytics;
mod backup_queue;
mod branding;
mod responses;
mod templates;

pub use analytics::AnalyticsRepository;
pub use backup_queue::BackupQueueRepository;
pub use branding::BrandingRepository;
pub use responses::ResponseRepository;
pub use templates::TemplateRepository;

//! FormVault library
//!
//! Offline persistence for a form builder: a versioned local store of
//! branding, templates, responses, analytics and the backup queue, plus
//! snapshot export and import.

pub mod app;
pub mod builder;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod validation;

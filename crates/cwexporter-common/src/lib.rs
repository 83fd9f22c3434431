//! Shared data model for the cwexporter workspace.
//!
//! [`types`] holds what a scrape cycle produces, [`jobs`] holds the
//! immutable job configuration that drives one.

pub mod jobs;
pub mod types;

//! Waste disposal declarations: validation, lifecycle, derived metrics,
//! hazardous-waste tracking numbers and company rollups.

pub mod aggregation;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod service;
pub mod store;
pub mod utils;

pub use service::DeclarationService;

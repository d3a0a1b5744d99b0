//! Cohort report aggregation and rendering.

pub mod aggregator;
pub mod generator;

pub use aggregator::{Framework, ReportAggregator, ReportRequest};
pub use generator::{generate_json_report, generate_markdown_report};

//! Insight generation against an external text-generation service.
//!
//! This module provides the prompt builder, the provider seam, and the
//! validating client used by the ingestor and the report aggregator.

pub mod client;
#[cfg(test)]
pub mod fake;
pub mod prompt;
pub mod provider;

pub use client::{InsightClient, InsightStatus};
pub use prompt::{build_insight_prompt, Prompt, INSIGHT_SYSTEM_PROMPT};
pub use provider::{ChatCompletionProvider, InsightProvider, ProviderConfig};

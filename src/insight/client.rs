//! Insight requests with validation and graceful degradation.
//!
//! `request_insight` never fails. Transport errors yield the zero-value
//! [`InsightResult`]; a reply that is not JSON is kept verbatim in `summary`;
//! a JSON reply is read field by field with per-field defaults.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::insight::prompt::Prompt;
use crate::insight::provider::InsightProvider;
use crate::models::InsightResult;

/// How an insight reply was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightStatus {
    /// Reply parsed as a JSON object.
    Parsed,
    /// Reply arrived but was not valid JSON; kept as raw summary.
    Unparseable,
    /// Reply was valid JSON of the wrong shape; nothing kept.
    NotAnObject,
    /// The provider call itself failed.
    Failed,
}

impl InsightStatus {
    pub fn is_degraded(self) -> bool {
        self != InsightStatus::Parsed
    }
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Non-string elements are dropped; a non-array value yields an empty list.
fn string_list(obj: &serde_json::Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Validate a raw model reply against the five-field insight schema.
pub fn parse_insight_reply(raw: &str) -> (InsightResult, InsightStatus) {
    let text = raw.trim();

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Insight reply is not valid JSON: {}", e);
            debug!("Raw insight reply: {}", text);
            return (InsightResult::raw(text), InsightStatus::Unparseable);
        }
    };

    let Some(obj) = value.as_object() else {
        warn!("Insight reply is JSON but not an object");
        debug!("Raw insight reply: {}", text);
        return (InsightResult::default(), InsightStatus::NotAnObject);
    };

    let insight = InsightResult {
        summary: string_field(obj, "summary"),
        strengths: string_list(obj, "strengths"),
        weaknesses: string_list(obj, "weaknesses"),
        learning_plan: string_field(obj, "learningPlan"),
        assessment_feedback: string_field(obj, "assessmentFeedback"),
    };

    (insight, InsightStatus::Parsed)
}

/// Best-effort insight generation on top of an [`InsightProvider`].
#[derive(Clone)]
pub struct InsightClient {
    provider: Arc<dyn InsightProvider>,
}

impl InsightClient {
    pub fn new(provider: Arc<dyn InsightProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn InsightProvider> {
        &self.provider
    }

    /// Request an insight; degrades instead of failing.
    pub async fn request_insight(&self, prompt: &Prompt) -> InsightResult {
        self.request_with_status(prompt).await.0
    }

    /// Like [`Self::request_insight`], also reporting whether the result degraded.
    pub async fn request_with_status(&self, prompt: &Prompt) -> (InsightResult, InsightStatus) {
        match self.provider.generate(prompt).await {
            Ok(raw) => parse_insight_reply(&raw),
            Err(e) => {
                warn!("Insight request failed, continuing without insight: {}", e);
                (InsightResult::default(), InsightStatus::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::fake::ScriptedProvider;

    const WELL_FORMED: &str = include_str!("../../fixtures/insight/well_formed.json");
    const WRAPPED_IN_PROSE: &str = include_str!("../../fixtures/insight/wrapped_in_prose.txt");
    const TRUNCATED: &str = include_str!("../../fixtures/insight/truncated.json");
    const EMPTY: &str = include_str!("../../fixtures/insight/empty.txt");

    #[test]
    fn test_golden_well_formed() {
        let (insight, status) = parse_insight_reply(WELL_FORMED);
        assert_eq!(status, InsightStatus::Parsed);
        assert!(insight.summary.starts_with("Avery has shown steady growth"));
        assert_eq!(insight.strengths.len(), 3);
        assert_eq!(insight.weaknesses, vec!["Multi-step word problems", "Showing work"]);
        assert!(insight.learning_plan.contains("word-problem sets"));
        assert!(insight.assessment_feedback.starts_with("Strong result"));
    }

    #[test]
    fn test_golden_wrapped_in_prose_keeps_raw_text() {
        let (insight, status) = parse_insight_reply(WRAPPED_IN_PROSE);
        assert_eq!(status, InsightStatus::Unparseable);
        assert_eq!(insight.summary, WRAPPED_IN_PROSE.trim());
        assert!(insight.strengths.is_empty());
        assert!(insight.weaknesses.is_empty());
        assert!(insight.learning_plan.is_empty());
        assert!(insight.assessment_feedback.is_empty());
    }

    #[test]
    fn test_golden_truncated_keeps_raw_text() {
        let (insight, status) = parse_insight_reply(TRUNCATED);
        assert_eq!(status, InsightStatus::Unparseable);
        assert!(insight.summary.starts_with("{\n  \"summary\""));
        assert!(insight.strengths.is_empty());
        assert!(insight.weaknesses.is_empty());
    }

    #[test]
    fn test_golden_empty_string() {
        let (insight, status) = parse_insight_reply(EMPTY);
        assert_eq!(status, InsightStatus::Unparseable);
        assert!(insight.is_empty());
    }

    #[test]
    fn test_wrong_field_types_fall_back_to_defaults() {
        let raw = r#"{"summary": 42, "strengths": "not a list", "weaknesses": ["ok", 7, null],
                      "learningPlan": ["x"], "assessmentFeedback": null}"#;
        let (insight, status) = parse_insight_reply(raw);
        assert_eq!(status, InsightStatus::Parsed);
        assert_eq!(insight.summary, "");
        assert!(insight.strengths.is_empty());
        assert_eq!(insight.weaknesses, vec!["ok"]);
        assert_eq!(insight.learning_plan, "");
        assert_eq!(insight.assessment_feedback, "");
    }

    #[test]
    fn test_missing_fields_default() {
        let (insight, _) = parse_insight_reply(r#"{"summary": "only this"}"#);
        assert_eq!(insight.summary, "only this");
        assert!(insight.strengths.is_empty());
        assert!(insight.learning_plan.is_empty());
    }

    #[test]
    fn test_non_object_json_is_zero_value() {
        for reply in ["[1, 2, 3]", "null", "\"text\""] {
            let (insight, status) = parse_insight_reply(reply);
            assert!(insight.is_empty(), "{}", reply);
            assert_eq!(status, InsightStatus::NotAnObject);
            assert!(status.is_degraded());
        }
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_zero_value() {
        let client = InsightClient::new(Arc::new(ScriptedProvider::failing()));
        let (insight, status) = client
            .request_with_status(&Prompt::new("s", "u"))
            .await;
        assert_eq!(status, InsightStatus::Failed);
        assert!(status.is_degraded());
        assert!(insight.is_empty());
    }

    #[tokio::test]
    async fn test_request_insight_parses_reply() {
        let client = InsightClient::new(Arc::new(ScriptedProvider::always(WELL_FORMED)));
        let insight = client.request_insight(&Prompt::new("s", "u")).await;
        assert_eq!(insight.strengths.len(), 3);
    }
}

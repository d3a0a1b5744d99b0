//! Prompt construction for per-assessment insights.
//!
//! The reply contract is textual: the model is asked for exactly one JSON
//! object with five fields and no markdown. Everything the model sends back is
//! re-validated by [`crate::insight::client`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Assessment, Student};

/// System prompt used for per-assessment insights.
pub const INSIGHT_SYSTEM_PROMPT: &str = "You are an educational data analyst.";

/// A system/user message pair sent to the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Format a date the way prompts show it, e.g. `Fri Oct 16 2026`.
pub fn prompt_date(date: &DateTime<Utc>) -> String {
    date.format("%a %b %d %Y").to_string()
}

fn notes_or<'a>(notes: &'a str, fallback: &'a str) -> &'a str {
    if notes.trim().is_empty() {
        fallback
    } else {
        notes
    }
}

/// Numbered block of every assessment on record, in insertion order.
fn format_history(assessments: &[Assessment]) -> String {
    let mut history = String::new();

    for (i, a) in assessments.iter().enumerate() {
        history.push_str(&format!("{}.\n", i + 1));
        history.push_str(&format!("  Date: {}\n", prompt_date(&a.date)));
        history.push_str(&format!("  Type: {}\n", a.assessment_type));
        history.push_str(&format!("  Score: {}/{}\n", a.score, a.max_score));
        history.push_str(&format!("  Percentage: {:.2}%\n", a.percentage));
        history.push_str(&format!("  Notes: {}\n", notes_or(&a.notes, "None")));
        history.push('\n');
    }

    history
}

/// Build the insight prompt for `student` after `latest` has been appended.
///
/// Output depends only on the inputs, so identical histories produce
/// identical prompts.
pub fn build_insight_prompt(student: &Student, latest: &Assessment, system: &str) -> Prompt {
    let mut user = String::new();

    user.push_str("You are an educational analytics expert.\n\n");
    user.push_str("Analyze the following student's performance:\n\n");

    user.push_str("Student:\n");
    user.push_str(&format!("- Name: {}\n", student.name));
    user.push_str(&format!("- ELL: {}\n", if student.ell { "Yes" } else { "No" }));
    user.push('\n');

    user.push_str("LATEST ASSESSMENT:\n");
    user.push_str(&format!("- Type: {}\n", latest.assessment_type));
    user.push_str(&format!("- Score: {}/{}\n", latest.score, latest.max_score));
    user.push_str(&format!("- Percentage: {:.2}%\n", latest.percentage));
    user.push_str(&format!("- Date: {}\n", prompt_date(&latest.date)));
    user.push_str(&format!("- Notes: {}\n", notes_or(&latest.notes, "No notes provided")));
    user.push('\n');

    user.push_str("FULL ASSESSMENT HISTORY:\n");
    user.push_str(&format_history(&student.assessments));

    user.push_str("### REQUIRED OUTPUT FORMAT (VERY IMPORTANT):\n");
    user.push_str("Return the answer in the EXACT JSON structure below. No extra text.\n\n");
    user.push_str(
        r#"{
  "summary": "1-2 paragraph growth summary...",
  "strengths": ["strength 1", "strength 2", "..."],
  "weaknesses": ["weakness 1", "weakness 2", "..."],
  "learningPlan": "short actionable plan...",
  "assessmentFeedback": "1-2 sentence feedback on latest assessment"
}"#,
    );
    user.push_str("\n\nOnly valid JSON. Do NOT return markdown headings or code fences.\n");

    Prompt::new(system, user)
}

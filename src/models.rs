//! Data models for the assessment pipeline.
//!
//! This module contains the records kept in the datastore (students,
//! classrooms and their assessments), the request types accepted by the
//! ingestor, and the report structures produced for a cohort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single scored piece of work belonging to one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    /// Classroom the assessment was given in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classroom_id: Option<Uuid>,
    /// Free-text category (quiz, test, essay, ...).
    #[serde(rename = "type")]
    pub assessment_type: String,
    pub score: f64,
    pub max_score: f64,
    /// Always `score / max_score * 100`; re-derived whenever either changes.
    pub percentage: f64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    /// One-line AI commentary on this specific assessment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_feedback: Option<String>,
}

/// One point of a student's growth trail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub date: DateTime<Utc>,
    pub avg: f64,
}

/// A logged remedial action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    #[serde(rename = "type")]
    pub intervention_type: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

/// A student record, owned by the teacher who created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub teacher_id: String,
    pub name: String,
    /// English-language-learner flag.
    #[serde(default)]
    pub ell: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<DateTime<Utc>>,
    #[serde(default)]
    pub classroom_ids: Vec<Uuid>,

    /// Insertion order, which is entry order and not necessarily date order.
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub interventions: Vec<Intervention>,
    #[serde(default)]
    pub intervention_flag: bool,

    // Cache state, recomputed by the stats aggregator.
    #[serde(default)]
    pub average_score: f64,
    #[serde(default)]
    pub growth_data: Vec<GrowthPoint>,

    // Latest AI insight.
    #[serde(default)]
    pub ai_summary: String,
    #[serde(default)]
    pub ai_strengths: Vec<String>,
    #[serde(default)]
    pub ai_weaknesses: Vec<String>,
    #[serde(default)]
    pub ai_learning_plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_last_updated: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Creates a new student with an empty history.
    pub fn new(teacher_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            teacher_id: teacher_id.into(),
            name: name.into(),
            ell: false,
            gender: None,
            dob: None,
            classroom_ids: Vec::new(),
            assessments: Vec::new(),
            interventions: Vec::new(),
            intervention_flag: false,
            average_score: 0.0,
            growth_data: Vec::new(),
            ai_summary: String::new(),
            ai_strengths: Vec::new(),
            ai_weaknesses: Vec::new(),
            ai_learning_plan: String::new(),
            ai_last_updated: None,
            created_at: Utc::now(),
        }
    }

    pub fn assessment_mut(&mut self, id: Uuid) -> Option<&mut Assessment> {
        self.assessments.iter_mut().find(|a| a.id == id)
    }

    /// Copies the student-level insight fields and stamps the update time.
    pub fn apply_insight(&mut self, insight: &InsightResult, now: DateTime<Utc>) {
        self.ai_summary = insight.summary.clone();
        self.ai_strengths = insight.strengths.clone();
        self.ai_weaknesses = insight.weaknesses.clone();
        self.ai_learning_plan = insight.learning_plan.clone();
        self.ai_last_updated = Some(now);
    }
}

/// A classroom roster. Holds student ids only; students are owned elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: Uuid,
    pub teacher_id: String,
    pub name: String,
    #[serde(default)]
    pub grade_level: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub students: Vec<Uuid>,
    /// Incremented once per batch submission, not once per student.
    #[serde(default)]
    pub assessment_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Classroom {
    pub fn new(teacher_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            teacher_id: teacher_id.into(),
            name: name.into(),
            grade_level: String::new(),
            subject: String::new(),
            students: Vec::new(),
            assessment_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Structured output of one insight call.
///
/// Always well-formed: on degradation the sequences are empty, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightResult {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub learning_plan: String,
    pub assessment_feedback: String,
}

impl InsightResult {
    /// A result carrying unparseable reply text in `summary` for human inspection.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            summary: text.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A new assessment for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classroom_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub assessment_type: String,
    pub score: f64,
    pub max_score: f64,
    /// Defaults to the time of ingestion.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

/// Partial update of an existing assessment. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentPatch {
    #[serde(rename = "type", default)]
    pub assessment_type: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One student's score within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub student_id: Uuid,
    pub score: f64,
}

/// A classroom-wide assessment event covering several students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubmission {
    pub classroom_id: Uuid,
    #[serde(rename = "type")]
    pub assessment_type: String,
    pub max_score: f64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
    pub entries: Vec<BatchEntry>,
}

/// What happened to one batch entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntryOutcome {
    Processed {
        student_id: Uuid,
        assessment_id: Uuid,
        average_score: f64,
        intervention_flag: bool,
        insight_degraded: bool,
    },
    Skipped {
        student_id: Uuid,
        reason: String,
    },
}

impl EntryOutcome {
    pub fn student_id(&self) -> Uuid {
        match self {
            EntryOutcome::Processed { student_id, .. } | EntryOutcome::Skipped { student_id, .. } => {
                *student_id
            }
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, EntryOutcome::Processed { .. })
    }
}

/// Result of a batch submission, one outcome per entry in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub classroom_id: Uuid,
    pub assessment_count: u32,
    pub outcomes: Vec<EntryOutcome>,
}

impl BatchResult {
    pub fn processed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_processed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.processed_count()
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped (classroom assessment #{})",
            self.processed_count(),
            self.skipped_count(),
            self.assessment_count
        )
    }
}

/// An assessment as it appears inside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAssessment {
    #[serde(rename = "type")]
    pub assessment_type: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub date: DateTime<Utc>,
    pub notes: String,
}

impl From<&Assessment> for ReportAssessment {
    fn from(a: &Assessment) -> Self {
        Self {
            assessment_type: a.assessment_type.clone(),
            score: a.score,
            max_score: a.max_score,
            percentage: a.percentage,
            date: a.date,
            notes: a.notes.clone(),
        }
    }
}

/// Per-student section of a cohort report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentReport {
    pub student_id: Uuid,
    pub name: String,
    pub gender: Option<String>,
    pub ell: bool,
    pub dob: Option<DateTime<Utc>>,
    /// Approximate age in whole years.
    pub age: Option<i64>,
    pub intervention_flag: bool,
    /// Mean percentage inside the window, `None` when nothing matched.
    pub overall_average: Option<f64>,
    pub total_assessments: usize,
    pub ai_summary: String,
    pub ai_strengths: Vec<String>,
    pub ai_weaknesses: Vec<String>,
    pub assessments: Vec<ReportAssessment>,
}

/// Cohort-wide figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAnalysis {
    /// Mean of the non-null student averages.
    pub group_average: Option<f64>,
    pub total_assessments: usize,
}

/// The complete cohort report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classroom_id: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    pub students: Vec<StudentReport>,
    pub group: GroupAnalysis,
    /// Framework-aligned prose produced by the narrative call.
    pub narrative: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insight_default_is_zero_value() {
        let insight = InsightResult::default();
        assert!(insight.summary.is_empty());
        assert!(insight.strengths.is_empty());
        assert!(insight.weaknesses.is_empty());
        assert!(insight.is_empty());
    }

    #[test]
    fn test_insight_raw_keeps_text_only_in_summary() {
        let insight = InsightResult::raw("not json");
        assert_eq!(insight.summary, "not json");
        assert!(insight.strengths.is_empty());
        assert!(insight.learning_plan.is_empty());
        assert!(!insight.is_empty());
    }

    #[test]
    fn test_apply_insight_stamps_time() {
        let mut student = Student::new("t-1", "Avery Lee");
        let now = Utc::now();
        let insight = InsightResult {
            summary: "Steady growth".to_string(),
            strengths: vec!["Fractions".to_string()],
            weaknesses: vec![],
            learning_plan: "More word problems".to_string(),
            assessment_feedback: "Good work".to_string(),
        };

        student.apply_insight(&insight, now);

        assert_eq!(student.ai_summary, "Steady growth");
        assert_eq!(student.ai_strengths, vec!["Fractions"]);
        assert_eq!(student.ai_learning_plan, "More word problems");
        assert_eq!(student.ai_last_updated, Some(now));
    }

    #[test]
    fn test_assessment_serializes_type_field() {
        let assessment = Assessment {
            id: Uuid::new_v4(),
            classroom_id: None,
            assessment_type: "quiz".to_string(),
            score: 8.0,
            max_score: 10.0,
            percentage: 80.0,
            date: Utc::now(),
            notes: String::new(),
            ai_feedback: None,
        };
        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["type"], "quiz");
        assert!(json.get("ai_feedback").is_none());
    }

    #[test]
    fn test_batch_result_counts() {
        let id = Uuid::new_v4();
        let result = BatchResult {
            classroom_id: Uuid::new_v4(),
            assessment_count: 3,
            outcomes: vec![
                EntryOutcome::Processed {
                    student_id: id,
                    assessment_id: Uuid::new_v4(),
                    average_score: 70.0,
                    intervention_flag: false,
                    insight_degraded: false,
                },
                EntryOutcome::Skipped {
                    student_id: Uuid::new_v4(),
                    reason: "student not found".to_string(),
                },
            ],
        };
        assert_eq!(result.processed_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.outcomes[0].student_id(), id);
        assert!(result.to_string().starts_with("1 processed, 1 skipped"));
    }
}

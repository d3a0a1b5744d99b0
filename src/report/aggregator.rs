//! Cohort report aggregation.
//!
//! Filters each student's history to a date window, computes per-student and
//! group averages, and asks the text-generation service for a narrative.
//! Unlike per-assessment insights, a failed narrative call fails the report.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::stats::{mean, round_to};
use crate::error::{Error, Result};
use crate::insight::{InsightProvider, Prompt};
use crate::models::{GroupAnalysis, Report, ReportAssessment, Student, StudentReport};
use crate::store::Datastore;

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

/// System prompt for the narrative call.
pub const NARRATIVE_SYSTEM_PROMPT: &str = "You are a master educator and assessment expert.";

/// Pedagogical framework the narrative is organised around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framework {
    pub name: String,
    pub dimensions: Vec<String>,
}

impl Default for Framework {
    fn default() -> Self {
        Self {
            name: "Washington State CEL 5D Framework for Teaching".to_string(),
            dimensions: vec![
                "Student Engagement".to_string(),
                "Classroom Environment & Culture".to_string(),
                "Assessment for Student Learning".to_string(),
                "Purpose & Teaching for Learning".to_string(),
                "Curriculum & Pedagogy".to_string(),
            ],
        }
    }
}

/// Which students and which window to report on.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub classroom_id: Option<Uuid>,
    pub student_ids: Vec<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Start of the window when none is given.
pub fn default_start_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Whole years between `dob` and `now`, ignoring leap days.
pub fn approximate_age(dob: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - dob).num_seconds().div_euclid(SECONDS_PER_YEAR)
}

/// Build the per-student section for the inclusive window `[start, end]`.
pub fn student_report(
    student: &Student,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> StudentReport {
    let in_window: Vec<_> = student
        .assessments
        .iter()
        .filter(|a| a.date >= start && a.date <= end)
        .collect();

    let overall_average = mean(in_window.iter().map(|a| a.percentage)).map(|avg| round_to(avg, 1));

    StudentReport {
        student_id: student.id,
        name: student.name.clone(),
        gender: student.gender.clone(),
        ell: student.ell,
        dob: student.dob,
        age: student.dob.map(|dob| approximate_age(dob, now)),
        intervention_flag: student.intervention_flag,
        overall_average,
        total_assessments: in_window.len(),
        ai_summary: student.ai_summary.clone(),
        ai_strengths: student.ai_strengths.clone(),
        ai_weaknesses: student.ai_weaknesses.clone(),
        assessments: in_window.into_iter().map(ReportAssessment::from).collect(),
    }
}

/// Group figures. Students without an in-window average are left out of the mean.
pub fn group_analysis(students: &[StudentReport]) -> GroupAnalysis {
    GroupAnalysis {
        group_average: mean(students.iter().filter_map(|s| s.overall_average))
            .map(|avg| round_to(avg, 2)),
        total_assessments: students.iter().map(|s| s.total_assessments).sum(),
    }
}

/// `ids` without repeats, first occurrence wins.
fn unique_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Data handed to the narrative call.
#[derive(Debug, Serialize)]
struct NarrativePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    classroom_id: Option<Uuid>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    group_average: Option<f64>,
    total_assessments: usize,
    students: &'a [StudentReport],
}

/// Build the free-form narrative prompt around `framework`.
pub fn build_narrative_prompt(framework: &Framework, payload_json: &str) -> Prompt {
    let mut user = String::new();

    user.push_str("You are an expert education evaluator. You are generating a formal performance report for a teacher.\n\n");
    user.push_str(&format!(
        "Use the {} as reference, especially these dimensions:\n",
        framework.name
    ));
    for dimension in &framework.dimensions {
        user.push_str(&format!("- {}\n", dimension));
    }
    user.push('\n');

    user.push_str("Generate a formal, multi-student performance report. The report should include:\n\n");
    user.push_str("1. Group-Level Overview\n");
    user.push_str("   - Average performance across all selected students\n");
    user.push_str("   - Overall growth patterns\n");
    user.push_str("   - Common strengths and weaknesses\n");
    user.push_str("   - Intervention needs\n");
    user.push_str("   - Comparison of ELL vs Non-ELL performance\n\n");
    user.push_str("2. Individual Student Profiles\n");
    user.push_str("   For each student: name, age, ELL status, strengths, weaknesses, assessment trends,\n");
    user.push_str(&format!(
        "   areas that meet {} proficiency, areas needing support, recommended next steps,\n",
        framework.name
    ));
    user.push_str("   and suggested interventions or accommodations.\n\n");
    user.push_str("3. Formal Academic Tone\n");
    user.push_str("   Use district-appropriate language suitable for parent conferences, IEP/MTSS reviews,\n");
    user.push_str("   administrator evaluations and progress monitoring evidence.\n\n");
    user.push_str("4. Standards Alignment\n");
    user.push_str("   Relate findings loosely to state ELA/math standards, learning targets and growth mindset language.\n\n");
    user.push_str("5. Clarity\n");
    user.push_str("   Avoid unnecessary jargon. Write clearly and professionally.\n\n");
    user.push_str("Here is the structured data you will use to generate the report:\n\n");
    user.push_str(payload_json);
    user.push_str("\n\nNow produce a complete, polished, administrator-level report.\n");

    Prompt::new(NARRATIVE_SYSTEM_PROMPT, user)
}

/// Builds cohort reports from stored students and a narrative provider.
pub struct ReportAggregator {
    store: Arc<dyn Datastore>,
    provider: Arc<dyn InsightProvider>,
    framework: Framework,
    default_start: DateTime<Utc>,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn Datastore>, provider: Arc<dyn InsightProvider>) -> Self {
        Self {
            store,
            provider,
            framework: Framework::default(),
            default_start: default_start_date(),
        }
    }

    pub fn with_framework(mut self, framework: Framework) -> Self {
        self.framework = framework;
        self
    }

    pub fn with_default_start(mut self, start: DateTime<Utc>) -> Self {
        self.default_start = start;
        self
    }

    /// Aggregate the requested students and generate the narrative.
    pub async fn build_report(&self, request: &ReportRequest) -> Result<Report> {
        if request.student_ids.is_empty() {
            return Err(Error::Validation("student list is empty".to_string()));
        }

        let now = Utc::now();
        let start = request.start_date.unwrap_or(self.default_start);
        let end = request.end_date.unwrap_or(now);
        if start > end {
            return Err(Error::Validation(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        let student_ids = unique_ids(&request.student_ids);
        let students = self.store.find_students(&student_ids).await?;
        if students.len() < student_ids.len() {
            warn!(
                "{} of {} requested students were not found",
                student_ids.len() - students.len(),
                student_ids.len()
            );
        }

        let student_reports: Vec<StudentReport> = students
            .iter()
            .map(|s| student_report(s, start, end, now))
            .collect();
        let group = group_analysis(&student_reports);
        info!(
            "Report over {} students: group average {:?}, {} assessments",
            student_reports.len(),
            group.group_average,
            group.total_assessments
        );

        let payload = NarrativePayload {
            classroom_id: request.classroom_id,
            start_date: start,
            end_date: end,
            group_average: group.group_average,
            total_assessments: group.total_assessments,
            students: &student_reports,
        };
        let payload_json = serde_json::to_string_pretty(&payload)?;
        debug!("Narrative payload is {} bytes", payload_json.len());

        let prompt = build_narrative_prompt(&self.framework, &payload_json);
        let narrative = self.provider.generate(&prompt).await?;

        Ok(Report {
            classroom_id: request.classroom_id,
            start_date: start,
            end_date: end,
            generated_at: now,
            model_used: self.provider.model_name().to_string(),
            students: student_reports,
            group,
            narrative,
        })
    }
}

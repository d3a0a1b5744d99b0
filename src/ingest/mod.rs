//! Assessment ingestion.
//!
//! One pass for one student: normalize the score, append the assessment,
//! recompute cached stats, ask for an insight on the updated history, attach
//! it, and persist. Insight generation is best-effort; persistence failures
//! are fatal.
//!
//! Batches fan out one pass per student with bounded concurrency. Entries for
//! the same student stay sequential inside a single task so no pass can
//! overwrite another's append.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{normalize, recompute};
use crate::error::{Error, Result};
use crate::insight::{build_insight_prompt, InsightClient, InsightStatus, INSIGHT_SYSTEM_PROMPT};
use crate::models::{
    Assessment, AssessmentInput, AssessmentPatch, BatchEntry, BatchResult, BatchSubmission,
    EntryOutcome, InsightResult, Intervention, Student,
};
use crate::store::Datastore;

/// Default number of students processed at once within a batch.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome of one successful pass.
#[derive(Debug, Clone)]
struct Pass {
    student: Student,
    assessment_id: Uuid,
    status: InsightStatus,
}

/// Entries addressed to one student, with their positions in the submission.
struct StudentGroup {
    student_id: Uuid,
    entries: Vec<(usize, BatchEntry)>,
}

fn group_by_student(entries: &[BatchEntry]) -> Vec<StudentGroup> {
    let mut groups: Vec<StudentGroup> = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        match groups.iter_mut().find(|g| g.student_id == entry.student_id) {
            Some(group) => group.entries.push((index, *entry)),
            None => groups.push(StudentGroup {
                student_id: entry.student_id,
                entries: vec![(index, *entry)],
            }),
        }
    }

    groups
}

fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Build an assessment from validated input. The percentage is derived here and nowhere else.
fn build_assessment(input: &AssessmentInput, now: DateTime<Utc>) -> Result<Assessment> {
    require_text(&input.assessment_type, "assessment type")?;
    let percentage = normalize(input.score, input.max_score)?;

    Ok(Assessment {
        id: Uuid::new_v4(),
        classroom_id: input.classroom_id,
        assessment_type: input.assessment_type.clone(),
        score: input.score,
        max_score: input.max_score,
        percentage,
        date: input.date.unwrap_or(now),
        notes: input.notes.clone(),
        ai_feedback: None,
    })
}

/// Orchestrates normalization, stats, insight and persistence per student.
pub struct AssessmentIngestor {
    store: Arc<dyn Datastore>,
    insights: InsightClient,
    system_prompt: String,
    concurrency: usize,
}

impl AssessmentIngestor {
    pub fn new(store: Arc<dyn Datastore>, insights: InsightClient) -> Self {
        Self {
            store,
            insights,
            system_prompt: INSIGHT_SYSTEM_PROMPT.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Cap on students processed at once in a batch (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    async fn load_student(&self, student_id: Uuid) -> Result<Student> {
        self.store
            .find_student(student_id)
            .await?
            .ok_or_else(|| Error::student_not_found(student_id))
    }

    /// Full pipeline pass for one new assessment.
    async fn run_pass(&self, student_id: Uuid, input: &AssessmentInput) -> Result<Pass> {
        let mut student = self.load_student(student_id).await?;

        let assessment = build_assessment(input, Utc::now())?;
        let assessment_id = assessment.id;
        student.assessments.push(assessment.clone());
        recompute(&mut student, assessment.date);

        let prompt = build_insight_prompt(&student, &assessment, &self.system_prompt);
        let (insight, status) = self.insights.request_with_status(&prompt).await;
        if status.is_degraded() {
            warn!("Insight for {} degraded ({:?})", student.name, status);
        }

        student.apply_insight(&insight, Utc::now());
        if !insight.assessment_feedback.is_empty() {
            if let Some(created) = student.assessment_mut(assessment_id) {
                created.ai_feedback = Some(insight.assessment_feedback);
            }
        }

        self.store.save_student(&student).await?;
        debug!("Saved {} with {} assessments", student.name, student.assessments.len());

        Ok(Pass {
            student,
            assessment_id,
            status,
        })
    }

    /// Ingest one assessment for one student, returning the updated record.
    pub async fn ingest_assessment(
        &self,
        student_id: Uuid,
        input: AssessmentInput,
    ) -> Result<Student> {
        let pass = self.run_pass(student_id, &input).await?;
        info!(
            "Ingested {} for {} (average {:.2})",
            input.assessment_type, pass.student.name, pass.student.average_score
        );
        Ok(pass.student)
    }

    fn validate_batch(submission: &BatchSubmission) -> Result<()> {
        require_text(&submission.assessment_type, "assessment type")?;

        if submission.entries.is_empty() {
            return Err(Error::Validation("student list is empty".to_string()));
        }

        normalize(0.0, submission.max_score)?;
        for entry in &submission.entries {
            normalize(entry.score, submission.max_score)?;
        }

        Ok(())
    }

    async fn process_group(
        &self,
        group: StudentGroup,
        template: &AssessmentInput,
    ) -> Result<Vec<(usize, EntryOutcome)>> {
        let mut outcomes = Vec::with_capacity(group.entries.len());

        for (index, entry) in group.entries {
            let input = AssessmentInput {
                score: entry.score,
                ..template.clone()
            };

            let outcome = match self.run_pass(group.student_id, &input).await {
                Ok(pass) => EntryOutcome::Processed {
                    student_id: group.student_id,
                    assessment_id: pass.assessment_id,
                    average_score: pass.student.average_score,
                    intervention_flag: pass.student.intervention_flag,
                    insight_degraded: pass.status.is_degraded(),
                },
                Err(e) if e.is_not_found() => {
                    warn!("Skipping batch entry: {}", e);
                    EntryOutcome::Skipped {
                        student_id: group.student_id,
                        reason: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            };
            outcomes.push((index, outcome));
        }

        Ok(outcomes)
    }

    /// Ingest a classroom-wide assessment event.
    ///
    /// The classroom's assessment counter is bumped and saved once, before any
    /// student is processed. Unknown students are skipped.
    pub async fn ingest_batch(&self, submission: BatchSubmission) -> Result<BatchResult> {
        Self::validate_batch(&submission)?;

        let mut classroom = self
            .store
            .find_classroom(submission.classroom_id)
            .await?
            .ok_or_else(|| Error::classroom_not_found(submission.classroom_id))?;

        classroom.assessment_count += 1;
        self.store.save_classroom(&classroom).await?;

        let template = AssessmentInput {
            classroom_id: Some(classroom.id),
            assessment_type: submission.assessment_type.clone(),
            score: 0.0,
            max_score: submission.max_score,
            date: Some(submission.date.unwrap_or_else(Utc::now)),
            notes: submission.notes.clone(),
        };

        let groups = group_by_student(&submission.entries);
        info!(
            "Processing {} entries for {} students in {} (concurrency {})",
            submission.entries.len(),
            groups.len(),
            classroom.name,
            self.concurrency
        );

        let grouped: Vec<Vec<(usize, EntryOutcome)>> = stream::iter(groups)
            .map(|group| self.process_group(group, &template))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut indexed: Vec<(usize, EntryOutcome)> = grouped.into_iter().flatten().collect();
        indexed.sort_by_key(|(index, _)| *index);

        let result = BatchResult {
            classroom_id: classroom.id,
            assessment_count: classroom.assessment_count,
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        };
        info!("Batch complete: {}", result);

        Ok(result)
    }

    /// Append an assessment without requesting an insight.
    pub async fn append_assessment(
        &self,
        student_id: Uuid,
        input: AssessmentInput,
    ) -> Result<Student> {
        let mut student = self.load_student(student_id).await?;

        let assessment = build_assessment(&input, Utc::now())?;
        let event_date = assessment.date;
        student.assessments.push(assessment);
        recompute(&mut student, event_date);

        self.store.save_student(&student).await?;
        Ok(student)
    }

    /// Apply a partial update; the percentage and stats are re-derived.
    pub async fn update_assessment(
        &self,
        student_id: Uuid,
        assessment_id: Uuid,
        patch: AssessmentPatch,
    ) -> Result<Student> {
        let mut student = self.load_student(student_id).await?;
        let assessment = student
            .assessment_mut(assessment_id)
            .ok_or_else(|| Error::assessment_not_found(assessment_id))?;

        let mut updated = assessment.clone();
        if let Some(assessment_type) = patch.assessment_type {
            require_text(&assessment_type, "assessment type")?;
            updated.assessment_type = assessment_type;
        }
        if let Some(score) = patch.score {
            updated.score = score;
        }
        if let Some(max_score) = patch.max_score {
            updated.max_score = max_score;
        }
        if let Some(date) = patch.date {
            updated.date = date;
        }
        if let Some(notes) = patch.notes {
            updated.notes = notes;
        }
        updated.percentage = normalize(updated.score, updated.max_score)?;

        let event_date = updated.date;
        *assessment = updated;
        recompute(&mut student, event_date);

        self.store.save_student(&student).await?;
        info!("Updated assessment {} for {}", assessment_id, student.name);
        Ok(student)
    }

    /// Remove one assessment and recompute stats.
    pub async fn delete_assessment(&self, student_id: Uuid, assessment_id: Uuid) -> Result<Student> {
        let mut student = self.load_student(student_id).await?;

        let before = student.assessments.len();
        student.assessments.retain(|a| a.id != assessment_id);
        if student.assessments.len() == before {
            return Err(Error::assessment_not_found(assessment_id));
        }
        recompute(&mut student, Utc::now());

        self.store.save_student(&student).await?;
        info!("Deleted assessment {} for {}", assessment_id, student.name);
        Ok(student)
    }

    /// Log an intervention. Always raises the intervention flag.
    pub async fn add_intervention(
        &self,
        student_id: Uuid,
        intervention_type: &str,
        notes: &str,
    ) -> Result<Student> {
        require_text(intervention_type, "intervention type")?;
        let mut student = self.load_student(student_id).await?;

        student.interventions.push(Intervention {
            intervention_type: intervention_type.to_string(),
            date: Utc::now(),
            notes: notes.to_string(),
        });
        student.intervention_flag = true;

        self.store.save_student(&student).await?;
        Ok(student)
    }

    /// Overwrite the AI fields by hand, e.g. after a teacher edits them.
    pub async fn update_ai_summary(
        &self,
        student_id: Uuid,
        insight: &InsightResult,
    ) -> Result<Student> {
        let mut student = self.load_student(student_id).await?;
        student.apply_insight(insight, Utc::now());
        self.store.save_student(&student).await?;
        Ok(student)
    }
}

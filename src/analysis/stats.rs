//! Cached average, growth trail and intervention flag.
//!
//! `average_score` is always the mean of the current percentages rounded to
//! two decimals. The same rounded value is compared against the intervention
//! threshold and recorded in the growth trail, on every mutation path.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::models::{Assessment, GrowthPoint, Student};

/// Averages strictly below this raise the intervention flag.
pub const INTERVENTION_THRESHOLD: f64 = 60.0;

/// Arithmetic mean, `None` for an empty input.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Mean percentage over a set of assessments, rounded to two decimals; 0 when empty.
pub fn average_percentage(assessments: &[Assessment]) -> f64 {
    mean(assessments.iter().map(|a| a.percentage))
        .map(|avg| round_to(avg, 2))
        .unwrap_or(0.0)
}

/// What a recomputation changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recomputed {
    pub average_score: f64,
    /// True only when this recomputation turned the flag on.
    pub flag_raised: bool,
}

/// Recompute a student's cache state from the current assessment set.
///
/// Appends one growth point per call. The intervention flag is only ever set,
/// never cleared.
pub fn recompute(student: &mut Student, event_date: DateTime<Utc>) -> Recomputed {
    let average = average_percentage(&student.assessments);
    student.average_score = average;

    student.growth_data.push(GrowthPoint {
        date: event_date,
        avg: average,
    });

    let was_flagged = student.intervention_flag;
    if average < INTERVENTION_THRESHOLD {
        student.intervention_flag = true;
    }
    let flag_raised = !was_flagged && student.intervention_flag;

    debug!(
        "Recomputed {}: avg {:.2} over {} assessments",
        student.name,
        average,
        student.assessments.len()
    );
    if flag_raised {
        info!(
            "Intervention flag raised for {} (average {:.2})",
            student.name, average
        );
    }

    Recomputed {
        average_score: average,
        flag_raised,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn assessment(percentage: f64) -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            classroom_id: None,
            assessment_type: "quiz".to_string(),
            score: percentage,
            max_score: 100.0,
            percentage,
            date: Utc::now(),
            notes: String::new(),
            ai_feedback: None,
        }
    }

    fn student_with(percentages: &[f64]) -> Student {
        let mut student = Student::new("t-1", "Jules Moreno");
        student.assessments = percentages.iter().copied().map(assessment).collect();
        student
    }

    #[test]
    fn test_empty_history_averages_zero() {
        let mut student = student_with(&[]);
        let out = recompute(&mut student, Utc::now());
        assert_eq!(student.average_score, 0.0);
        assert_eq!(out.average_score, 0.0);
        assert_eq!(student.growth_data.len(), 1);
    }

    #[test]
    fn test_one_growth_point_per_event() {
        let mut student = Student::new("t-1", "Kiara Patel");
        let start = Utc::now();

        for (i, pct) in [50.0, 70.0, 90.0].into_iter().enumerate() {
            student.assessments.push(assessment(pct));
            recompute(&mut student, start + Duration::days(i as i64));
        }

        assert_eq!(student.average_score, 70.0);
        assert_eq!(student.growth_data.len(), 3);
        assert_eq!(student.growth_data[0].avg, 50.0);
        assert_eq!(student.growth_data[1].avg, 60.0);
        assert_eq!(student.growth_data[2].avg, 70.0);
        assert_eq!(student.growth_data[2].date, start + Duration::days(2));
    }

    #[test]
    fn test_average_is_rounded_to_two_places() {
        let mut student = student_with(&[100.0, 100.0, 0.0]);
        recompute(&mut student, Utc::now());
        assert_eq!(student.average_score, 66.67);
    }

    #[test]
    fn test_average_independent_of_order() {
        let mut a = student_with(&[33.25, 81.5, 64.75, 12.0]);
        let mut b = student_with(&[12.0, 64.75, 33.25, 81.5]);
        recompute(&mut a, Utc::now());
        recompute(&mut b, Utc::now());
        assert_eq!(a.average_score, b.average_score);
        assert_eq!(a.average_score, 47.88);
    }

    #[test]
    fn test_flag_raised_below_threshold() {
        let mut student = student_with(&[40.0, 70.0]);
        let out = recompute(&mut student, Utc::now());
        assert!(student.intervention_flag);
        assert!(out.flag_raised);
    }

    #[test]
    fn test_flag_not_raised_at_threshold() {
        let mut student = student_with(&[60.0]);
        recompute(&mut student, Utc::now());
        assert!(!student.intervention_flag);
    }

    #[test]
    fn test_flag_is_monotonic() {
        let mut student = student_with(&[30.0]);
        recompute(&mut student, Utc::now());
        assert!(student.intervention_flag);

        student.assessments.push(assessment(100.0));
        student.assessments.push(assessment(100.0));
        let out = recompute(&mut student, Utc::now());

        assert!(student.average_score >= INTERVENTION_THRESHOLD);
        assert!(student.intervention_flag);
        assert!(!out.flag_raised);
    }

    #[test]
    fn test_mean_and_round_helpers() {
        assert_eq!(mean(Vec::<f64>::new()), None);
        assert_eq!(mean(vec![1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(round_to(72.456, 1), 72.5);
        assert_eq!(round_to(72.444, 2), 72.44);
    }
}

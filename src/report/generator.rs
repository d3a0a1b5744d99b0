//! Markdown and JSON rendering of cohort reports.

use crate::models::{GroupAnalysis, Report, StudentReport};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# SmartAssess Performance Report\n\n");

    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_group_section(&report.group, &report.students));
    output.push_str(&generate_students_section(&report.students));
    output.push_str(&generate_narrative_section(&report.narrative));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    if let Some(classroom_id) = report.classroom_id {
        section.push_str(&format!("- **Classroom:** `{}`\n", classroom_id));
    }
    section.push_str(&format!(
        "- **Period:** {} to {}\n",
        report.start_date.format("%Y-%m-%d"),
        report.end_date.format("%Y-%m-%d")
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", report.model_used));
    section.push_str(&format!("- **Students:** {}\n", report.students.len()));
    section.push('\n');

    section
}

fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Group Overview](#group-overview)\n");
    toc.push_str("- [Students](#students)\n");
    for student in &report.students {
        toc.push_str(&format!("  - [{}](#{})\n", student.name, anchor(&student.name)));
    }
    if !report.narrative.trim().is_empty() {
        toc.push_str("- [Narrative](#narrative)\n");
    }
    toc.push('\n');

    toc
}

fn anchor(name: &str) -> String {
    name.replace(['/', '.', ' '], "-").to_lowercase()
}

fn format_average(avg: Option<f64>) -> String {
    match avg {
        Some(v) => format!("{:.1}%", v),
        None => "n/a".to_string(),
    }
}

fn generate_group_section(group: &GroupAnalysis, students: &[StudentReport]) -> String {
    let mut section = String::new();

    section.push_str("## Group Overview\n\n");
    section.push_str("| Group Average | Assessments | Flagged for Intervention |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        format_average(group.group_average),
        group.total_assessments,
        students.iter().filter(|s| s.intervention_flag).count()
    ));

    if students.is_empty() {
        return section;
    }

    section.push_str("| Student | ELL | Average | Assessments | Intervention |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");

    let mut ranked: Vec<_> = students.iter().collect();
    ranked.sort_by(|a, b| {
        b.overall_average
            .unwrap_or(f64::MIN)
            .total_cmp(&a.overall_average.unwrap_or(f64::MIN))
    });
    for student in ranked {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            student.name,
            if student.ell { "yes" } else { "no" },
            format_average(student.overall_average),
            student.total_assessments,
            if student.intervention_flag { "⚠️" } else { "" }
        ));
    }
    section.push('\n');

    section
}

fn generate_students_section(students: &[StudentReport]) -> String {
    let mut section = String::new();

    section.push_str("## Students\n\n");
    if students.is_empty() {
        section.push_str("None of the requested students were found.\n\n");
        return section;
    }

    for student in students {
        section.push_str(&generate_student_block(student));
    }

    section
}

fn generate_student_block(student: &StudentReport) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {} {{#{}}}\n\n", student.name, anchor(&student.name)));

    let mut facts = vec![format!("ELL: {}", if student.ell { "yes" } else { "no" })];
    if let Some(age) = student.age {
        facts.push(format!("Age: {}", age));
    }
    if let Some(ref gender) = student.gender {
        facts.push(format!("Gender: {}", gender));
    }
    facts.push(format!("Average: {}", format_average(student.overall_average)));
    block.push_str(&format!("*{}*\n\n", facts.join(" | ")));

    if student.intervention_flag {
        block.push_str("> ⚠️ **Flagged for intervention**\n\n");
    }

    if !student.ai_summary.is_empty() {
        block.push_str(&format!("**Summary:** {}\n\n", student.ai_summary));
    }
    if !student.ai_strengths.is_empty() {
        block.push_str("**Strengths:**\n");
        for s in &student.ai_strengths {
            block.push_str(&format!("- {}\n", s));
        }
        block.push('\n');
    }
    if !student.ai_weaknesses.is_empty() {
        block.push_str("**Areas for growth:**\n");
        for w in &student.ai_weaknesses {
            block.push_str(&format!("- {}\n", w));
        }
        block.push('\n');
    }

    if !student.assessments.is_empty() {
        block.push_str("| Date | Type | Score | Percentage |\n");
        block.push_str("|:---|:---|:---:|:---:|\n");
        let mut assessments = student.assessments.clone();
        assessments.sort_by_key(|a| a.date);
        for a in &assessments {
            block.push_str(&format!(
                "| {} | {} | {}/{} | {:.1}% |\n",
                a.date.format("%Y-%m-%d"),
                a.assessment_type,
                a.score,
                a.max_score,
                a.percentage
            ));
        }
        block.push('\n');
    }

    block.push_str("---\n\n");

    block
}

fn generate_narrative_section(narrative: &str) -> String {
    if narrative.trim().is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Narrative\n\n");
    section.push_str(narrative.trim());
    section.push_str("\n\n");
    section
}

fn generate_footer() -> String {
    "---\n\n*Report generated by SmartAssess*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportAssessment;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn create_test_report() -> Report {
        let date = Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap();
        Report {
            classroom_id: Some(Uuid::nil()),
            start_date: Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2025, 9, 30, 0, 0, 0).unwrap(),
            generated_at: date,
            model_used: "test-model".to_string(),
            students: vec![
                StudentReport {
                    student_id: Uuid::new_v4(),
                    name: "Avery Lee".to_string(),
                    gender: None,
                    ell: true,
                    dob: None,
                    age: Some(9),
                    intervention_flag: true,
                    overall_average: Some(55.5),
                    total_assessments: 1,
                    ai_summary: "Working on fractions.".to_string(),
                    ai_strengths: vec!["Persistence".to_string()],
                    ai_weaknesses: vec!["Equivalent fractions".to_string()],
                    assessments: vec![ReportAssessment {
                        assessment_type: "quiz".to_string(),
                        score: 11.1,
                        max_score: 20.0,
                        percentage: 55.5,
                        date,
                        notes: String::new(),
                    }],
                },
                StudentReport {
                    student_id: Uuid::new_v4(),
                    name: "Jules Moreno".to_string(),
                    gender: Some("M".to_string()),
                    ell: false,
                    dob: None,
                    age: None,
                    intervention_flag: false,
                    overall_average: None,
                    total_assessments: 0,
                    ai_summary: String::new(),
                    ai_strengths: vec![],
                    ai_weaknesses: vec![],
                    assessments: vec![],
                },
            ],
            group: GroupAnalysis {
                group_average: Some(55.5),
                total_assessments: 1,
            },
            narrative: "The group shows steady engagement.".to_string(),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# SmartAssess Performance Report"));
        assert!(markdown.contains("## Group Overview"));
        assert!(markdown.contains("| 55.5% | 1 | 1 |"));
        assert!(markdown.contains("### Avery Lee {#avery-lee}"));
        assert!(markdown.contains("- Equivalent fractions"));
        assert!(markdown.contains("| 2025-09-15 | quiz | 11.1/20 | 55.5% |"));
        assert!(markdown.contains("Average: n/a"));
        assert!(markdown.contains("## Narrative\n\nThe group shows steady engagement."));
    }

    #[test]
    fn test_metadata_section() {
        let section = generate_metadata_section(&create_test_report());
        assert!(section.contains("2025-09-01 to 2025-09-30"));
        assert!(section.contains("`test-model`"));
        assert!(section.contains("Classroom:"));
    }

    #[test]
    fn test_empty_narrative_is_omitted() {
        let mut report = create_test_report();
        report.narrative = "  ".to_string();
        let markdown = generate_markdown_report(&report);
        assert!(!markdown.contains("## Narrative"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"group_average\": 55.5"));
        assert!(json.contains("\"overall_average\": null"));
        assert!(json.contains("\"narrative\""));
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and value parsers for dates and batch scores.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::models::BatchEntry;

/// SmartAssess - assessment analytics and AI insights for teachers
///
/// Records scores, keeps running averages and growth trails per student,
/// flags students who need intervention, and produces narrative reports.
///
/// Examples:
///   smartassess classroom add --name "Period 3 Math" --grade 4
///   smartassess student add --name "Avery Lee" --ell --classroom <ID>
///   smartassess assess add --student <ID> --type quiz --score 17 --max-score 20
///   smartassess assess batch --classroom <ID> --type exit-ticket --max-score 10 --score <ID>=8
///   smartassess report --classroom <ID> --start 2025-09-01 --format json
///   smartassess init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .smartassess.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// JSON datastore path
    #[arg(long, value_name = "FILE", env = "SMARTASSESS_DATA_FILE", global = true)]
    pub data_file: Option<PathBuf>,

    /// Teacher whose records to operate on
    #[arg(long, value_name = "ID", env = "SMARTASSESS_TEACHER", global = true)]
    pub teacher: Option<String>,

    /// Model used for insights and report narratives
    #[arg(short, long, env = "SMARTASSESS_MODEL", global = true)]
    pub model: Option<String>,

    /// Base URL of the chat-completion API
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// API key for the text-generation service
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Request timeout in seconds (0 disables it)
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Students processed at once in a batch
    #[arg(long, value_name = "NUM", global = true)]
    pub concurrency: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a default .smartassess.toml configuration file
    InitConfig,

    /// Manage classrooms
    #[command(subcommand)]
    Classroom(ClassroomCommand),

    /// Manage students
    #[command(subcommand)]
    Student(StudentCommand),

    /// Record and edit assessments
    #[command(subcommand)]
    Assess(AssessCommand),

    /// Log interventions
    #[command(subcommand)]
    Intervention(InterventionCommand),

    /// Overwrite a student's AI summary fields by hand
    Summary(SummaryArgs),

    /// Build a cohort report with a narrative
    Report(ReportArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum ClassroomCommand {
    /// Create a classroom
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        grade: String,
        #[arg(long, default_value = "")]
        subject: String,
    },
    /// Show a classroom and its roster
    Show { id: Uuid },
    /// List the teacher's classrooms
    List,
    /// Delete a classroom; its students are kept
    Delete { id: Uuid },
}

#[derive(Subcommand, Debug, Clone)]
pub enum StudentCommand {
    /// Create a student
    Add {
        #[arg(long)]
        name: String,
        /// English-Language-Learner
        #[arg(long)]
        ell: bool,
        #[arg(long)]
        gender: Option<String>,
        /// Date of birth (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        dob: Option<DateTime<Utc>>,
        /// Enrol in this classroom
        #[arg(long, value_name = "ID")]
        classroom: Option<Uuid>,
    },
    /// Show one student with history and insights
    Show { id: Uuid },
    /// List the teacher's students
    List,
    /// Change a student's details or move it to another classroom
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        /// English-Language-Learner (true or false)
        #[arg(long, value_name = "BOOL")]
        ell: Option<bool>,
        #[arg(long)]
        gender: Option<String>,
        /// Date of birth (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date, conflicts_with = "clear_dob")]
        dob: Option<DateTime<Utc>>,
        /// Remove the date of birth
        #[arg(long)]
        clear_dob: bool,
        /// Replace every enrolment with this classroom
        #[arg(long, value_name = "ID")]
        classroom: Option<Uuid>,
    },
    /// Delete a student and remove it from rosters
    Delete { id: Uuid },
}

/// Fields shared by single and batch submissions.
#[derive(clap::Args, Debug, Clone)]
pub struct AssessmentFields {
    /// Assessment type (quiz, test, exit-ticket, ...)
    #[arg(long = "type", value_name = "TYPE")]
    pub assessment_type: String,

    #[arg(long)]
    pub max_score: f64,

    /// Assessment date (YYYY-MM-DD or RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_date)]
    pub date: Option<DateTime<Utc>>,

    #[arg(long, default_value = "")]
    pub notes: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AssessCommand {
    /// Record one assessment and request an insight
    Add {
        #[arg(long, value_name = "ID")]
        student: Uuid,
        #[arg(long)]
        score: f64,
        #[arg(long, value_name = "ID")]
        classroom: Option<Uuid>,
        #[command(flatten)]
        fields: AssessmentFields,
        /// Append without calling the text-generation service
        #[arg(long)]
        no_insight: bool,
    },
    /// Record one assessment for several students of a classroom
    Batch {
        #[arg(long, value_name = "ID")]
        classroom: Uuid,
        #[command(flatten)]
        fields: AssessmentFields,
        /// One entry per student, as STUDENT_ID=SCORE
        #[arg(long = "score", value_name = "ID=SCORE", value_parser = parse_score_entry, required = true)]
        scores: Vec<BatchEntry>,
    },
    /// Edit an existing assessment
    Update {
        #[arg(long, value_name = "ID")]
        student: Uuid,
        #[arg(long, value_name = "ID")]
        assessment: Uuid,
        #[arg(long = "type", value_name = "TYPE")]
        assessment_type: Option<String>,
        #[arg(long)]
        score: Option<f64>,
        #[arg(long)]
        max_score: Option<f64>,
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove an assessment
    Delete {
        #[arg(long, value_name = "ID")]
        student: Uuid,
        #[arg(long, value_name = "ID")]
        assessment: Uuid,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum InterventionCommand {
    /// Log an intervention; always raises the student's flag
    Add {
        #[arg(long, value_name = "ID")]
        student: Uuid,
        #[arg(long = "type", value_name = "TYPE")]
        intervention_type: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct SummaryArgs {
    #[arg(long, value_name = "ID")]
    pub student: Uuid,
    #[arg(long, default_value = "")]
    pub summary: String,
    /// Comma-separated
    #[arg(long, value_delimiter = ',')]
    pub strengths: Vec<String>,
    /// Comma-separated
    #[arg(long, value_delimiter = ',')]
    pub weaknesses: Vec<String>,
    #[arg(long, default_value = "")]
    pub learning_plan: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReportArgs {
    /// Students to include (comma-separated ids)
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub students: Vec<Uuid>,

    /// Include the whole roster of this classroom
    #[arg(long, value_name = "ID")]
    pub classroom: Option<Uuid>,

    /// Window start (inclusive)
    #[arg(long, value_parser = parse_date)]
    pub start: Option<DateTime<Utc>>,

    /// Window end (inclusive; a bare date covers the whole day)
    #[arg(long, value_parser = parse_end_date)]
    pub end: Option<DateTime<Utc>>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    #[arg(short, long, default_value = "smartassess_report.md", value_name = "FILE")]
    pub output: PathBuf,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    parse_date_at(value, NaiveTime::MIN)
}

/// Like [`parse_date`], but a bare date means the last second of that day.
pub fn parse_end_date(value: &str) -> Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    parse_date_at(value, end_of_day)
}

fn parse_date_at(value: &str, time: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(time).and_utc())
        .map_err(|_| format!("invalid date '{}': expected YYYY-MM-DD or RFC 3339", value))
}

/// Parse a batch entry written as `STUDENT_ID=SCORE`.
pub fn parse_score_entry(value: &str) -> Result<BatchEntry, String> {
    let (id, score) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid entry '{}': expected STUDENT_ID=SCORE", value))?;

    let student_id = Uuid::parse_str(id.trim())
        .map_err(|e| format!("invalid student id '{}': {}", id, e))?;
    let score = score
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid score '{}': {}", score, e))?;

    Ok(BatchEntry { student_id, score })
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(0) = self.concurrency {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        match &self.command {
            Command::Report(report) => {
                if report.students.is_empty() && report.classroom.is_none() {
                    return Err("Report needs --students or --classroom".to_string());
                }
                if let (Some(start), Some(end)) = (report.start, report.end) {
                    if start > end {
                        return Err("--start must not be after --end".to_string());
                    }
                }
            }
            Command::Assess(AssessCommand::Add { fields, .. })
            | Command::Assess(AssessCommand::Batch { fields, .. }) => {
                if fields.max_score <= 0.0 {
                    return Err("--max-score must be greater than 0".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

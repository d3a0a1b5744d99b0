//! SmartAssess - assessment analytics and AI insight pipeline
//!
//! A CLI that records student assessments, keeps per-student averages and
//! growth trails, raises intervention flags, and asks a chat-completion
//! service for insights and cohort report narratives.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Validation, lookup, service or storage failure

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod insight;
mod models;
mod report;
mod roster;
mod store;

use anyhow::{Context, Result};
use cli::{
    Args, AssessCommand, ClassroomCommand, Command, InterventionCommand, OutputFormat, ReportArgs,
    StudentCommand, SummaryArgs,
};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use ingest::AssessmentIngestor;
use insight::{ChatCompletionProvider, InsightClient, InsightProvider};
use models::{AssessmentInput, AssessmentPatch, BatchSubmission, InsightResult, Student};
use report::{ReportAggregator, ReportRequest};
use roster::{NewStudent, Roster, StudentPatch};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::{Datastore, FileStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // No logging needed to write the config template
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    init_logging(&args);

    info!("SmartAssess v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args.command);

    if let Err(e) = run(args).await {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle `init-config`: generate a default .smartassess.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the data file, teacher id, model and report framework.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Shared state for one CLI invocation.
struct App {
    config: Config,
    store: Arc<dyn Datastore>,
    roster: Roster,
}

impl App {
    async fn open(config: Config) -> Result<Self> {
        let file_store = FileStore::open(&config.general.data_file)
            .await
            .context("Failed to open datastore")?;
        info!("Datastore: {}", file_store.path().display());
        let store: Arc<dyn Datastore> = Arc::new(file_store);
        let roster = Roster::new(store.clone(), config.general.teacher_id.clone());
        Ok(Self {
            config,
            store,
            roster,
        })
    }

    fn ingestor(&self) -> Result<AssessmentIngestor> {
        let provider = ChatCompletionProvider::new(self.config.insight_provider())?;
        let provider: Arc<dyn InsightProvider> = Arc::new(provider);

        Ok(
            AssessmentIngestor::new(self.store.clone(), InsightClient::new(provider))
                .with_concurrency(self.config.general.concurrency)
                .with_system_prompt(self.config.model.insight_system_prompt.clone()),
        )
    }

    fn aggregator(&self) -> Result<ReportAggregator> {
        let provider = ChatCompletionProvider::new(self.config.narrative_provider())?;
        Ok(ReportAggregator::new(self.store.clone(), Arc::new(provider))
            .with_framework(self.config.framework())
            .with_default_start(self.config.report.start_date))
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    debug!("Using data file {}", config.general.data_file);

    let quiet = args.quiet;
    let app = App::open(config).await?;

    match args.command {
        Command::InitConfig => handle_init_config(),
        Command::Classroom(cmd) => handle_classroom(&app, cmd).await,
        Command::Student(cmd) => handle_student(&app, cmd).await,
        Command::Assess(cmd) => handle_assess(&app, cmd, quiet).await,
        Command::Intervention(cmd) => handle_intervention(&app, cmd).await,
        Command::Summary(summary) => handle_summary(&app, summary).await,
        Command::Report(report) => handle_report(&app, report, quiet).await,
    }
}

async fn handle_classroom(app: &App, cmd: ClassroomCommand) -> Result<()> {
    match cmd {
        ClassroomCommand::Add {
            name,
            grade,
            subject,
        } => {
            let classroom = app.roster.create_classroom(&name, &grade, &subject).await?;
            println!("✅ Created classroom {} ({})", classroom.name, classroom.id);
        }
        ClassroomCommand::Show { id } => {
            let classroom = app.roster.find_classroom(id).await?;
            println!("🏫 {} ({})", classroom.name, classroom.id);
            if !classroom.grade_level.is_empty() || !classroom.subject.is_empty() {
                println!("   Grade: {} | Subject: {}", classroom.grade_level, classroom.subject);
            }
            println!("   Batch assessments: {}", classroom.assessment_count);
            let students = app.store.find_students(&classroom.students).await?;
            println!("   Students: {}", students.len());
            for student in &students {
                print_student_line(student);
            }
        }
        ClassroomCommand::List => {
            let classrooms = app.roster.list_classrooms().await?;
            if classrooms.is_empty() {
                println!("   No classrooms yet.");
            }
            for classroom in &classrooms {
                println!(
                    "   🏫 {} ({}) | {} students",
                    classroom.name,
                    classroom.id,
                    classroom.students.len()
                );
            }
        }
        ClassroomCommand::Delete { id } => {
            let removed = app.roster.delete_classroom(id).await?;
            println!("🗑️  Deleted classroom {} ({})", removed.name, removed.id);
        }
    }
    Ok(())
}

async fn handle_student(app: &App, cmd: StudentCommand) -> Result<()> {
    match cmd {
        StudentCommand::Add {
            name,
            ell,
            gender,
            dob,
            classroom,
        } => {
            let student = app
                .roster
                .create_student(NewStudent {
                    name,
                    ell,
                    gender,
                    dob,
                    classroom_id: classroom,
                })
                .await?;
            println!("✅ Created student {} ({})", student.name, student.id);
        }
        StudentCommand::Show { id } => {
            let student = app.roster.find_student(id).await?;
            print_student_detail(&student);
        }
        StudentCommand::List => {
            let students = app.roster.list_students().await?;
            if students.is_empty() {
                println!("   No students yet.");
            }
            for student in &students {
                print_student_line(student);
            }
        }
        StudentCommand::Update {
            id,
            name,
            ell,
            gender,
            dob,
            clear_dob,
            classroom,
        } => {
            let patch = StudentPatch {
                name,
                ell,
                gender,
                dob: if clear_dob { Some(None) } else { dob.map(Some) },
                classroom_id: classroom,
            };
            let student = app.roster.update_student(id, patch).await?;
            println!("✅ Updated student {} ({})", student.name, student.id);
        }
        StudentCommand::Delete { id } => {
            let removed = app.roster.delete_student(id).await?;
            println!("🗑️  Deleted student {} ({})", removed.name, removed.id);
        }
    }
    Ok(())
}

async fn handle_assess(app: &App, cmd: AssessCommand, quiet: bool) -> Result<()> {
    let ingestor = app.ingestor()?;

    match cmd {
        AssessCommand::Add {
            student,
            score,
            classroom,
            fields,
            no_insight,
        } => {
            app.roster.find_student(student).await?;
            let input = AssessmentInput {
                classroom_id: classroom,
                assessment_type: fields.assessment_type,
                score,
                max_score: fields.max_score,
                date: fields.date,
                notes: fields.notes,
            };

            if !no_insight {
                warn_if_no_key(&app.config);
            }
            let updated = if no_insight {
                ingestor.append_assessment(student, input).await?
            } else {
                let spinner = spinner("Requesting insight...", quiet);
                let result = ingestor.ingest_assessment(student, input).await;
                spinner.finish_and_clear();
                result?
            };
            print_student_detail(&updated);
        }
        AssessCommand::Batch {
            classroom,
            fields,
            scores,
        } => {
            app.roster.find_classroom(classroom).await?;
            warn_if_no_key(&app.config);
            let submission = BatchSubmission {
                classroom_id: classroom,
                assessment_type: fields.assessment_type,
                max_score: fields.max_score,
                date: fields.date,
                notes: fields.notes,
                entries: scores,
            };

            let start = Instant::now();
            let spinner = spinner(
                &format!("Processing {} entries...", submission.entries.len()),
                quiet,
            );
            let result = ingestor.ingest_batch(submission).await;
            spinner.finish_and_clear();
            let result = result?;

            println!("\n📊 Batch Summary:");
            for outcome in &result.outcomes {
                match outcome {
                    models::EntryOutcome::Processed {
                        student_id,
                        average_score,
                        intervention_flag,
                        insight_degraded,
                        ..
                    } => println!(
                        "   ✅ {} average {:.2}%{}{}",
                        student_id,
                        average_score,
                        if *intervention_flag { " ⚠️ intervention" } else { "" },
                        if *insight_degraded { " (no insight)" } else { "" }
                    ),
                    models::EntryOutcome::Skipped { student_id, reason } => {
                        println!("   ⏭️  {} skipped: {}", student_id, reason)
                    }
                }
            }
            println!("   {}", result);
            println!("   Duration: {:.1}s", start.elapsed().as_secs_f64());
        }
        AssessCommand::Update {
            student,
            assessment,
            assessment_type,
            score,
            max_score,
            date,
            notes,
        } => {
            app.roster.find_student(student).await?;
            let patch = AssessmentPatch {
                assessment_type,
                score,
                max_score,
                date,
                notes,
            };
            let updated = ingestor
                .update_assessment(student, assessment, patch)
                .await?;
            print_student_detail(&updated);
        }
        AssessCommand::Delete {
            student,
            assessment,
        } => {
            app.roster.find_student(student).await?;
            let updated = ingestor.delete_assessment(student, assessment).await?;
            print_student_detail(&updated);
        }
    }
    Ok(())
}

async fn handle_intervention(app: &App, cmd: InterventionCommand) -> Result<()> {
    match cmd {
        InterventionCommand::Add {
            student,
            intervention_type,
            notes,
        } => {
            app.roster.find_student(student).await?;
            let updated = app
                .ingestor()?
                .add_intervention(student, &intervention_type, &notes)
                .await?;
            println!(
                "✅ Logged {} for {} ({} interventions)",
                intervention_type,
                updated.name,
                updated.interventions.len()
            );
        }
    }
    Ok(())
}

async fn handle_summary(app: &App, args: SummaryArgs) -> Result<()> {
    app.roster.find_student(args.student).await?;
    let insight = InsightResult {
        summary: args.summary,
        strengths: args.strengths,
        weaknesses: args.weaknesses,
        learning_plan: args.learning_plan,
        assessment_feedback: String::new(),
    };
    let updated = app
        .ingestor()?
        .update_ai_summary(args.student, &insight)
        .await?;
    print_student_detail(&updated);
    Ok(())
}

async fn handle_report(app: &App, args: ReportArgs, quiet: bool) -> Result<()> {
    let start_time = Instant::now();

    let mut student_ids = args.students.clone();
    if let Some(classroom_id) = args.classroom {
        let classroom = app.roster.find_classroom(classroom_id).await?;
        for id in classroom.students {
            if !student_ids.contains(&id) {
                student_ids.push(id);
            }
        }
    }

    let request = ReportRequest {
        classroom_id: args.classroom,
        student_ids,
        start_date: args.start,
        end_date: args.end,
    };

    println!("📝 Generating report for {} students...", request.student_ids.len());
    let spinner = spinner("Waiting for narrative...", quiet);
    let result = app.aggregator()?.build_report(&request).await;
    spinner.finish_and_clear();
    let report = result?;

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    println!("\n📊 Report Summary:");
    println!("   Students: {}", report.students.len());
    match report.group.group_average {
        Some(avg) => println!("   Group average: {:.1}%", avg),
        None => println!("   Group average: n/a"),
    }
    println!("   Assessments in window: {}", report.group.total_assessments);
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!("\n✅ Report saved to: {}", args.output.display());
    Ok(())
}

fn warn_if_no_key(config: &Config) {
    if config.model.api_key.as_deref().map_or(true, str::is_empty) {
        warn!("No API key configured; insights will be left empty");
    }
}

/// Spinner on stderr; hidden in quiet mode.
fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_student_line(student: &Student) {
    println!(
        "     👤 {} ({}) avg {:.2}% | {} assessments{}",
        student.name,
        student.id,
        student.average_score,
        student.assessments.len(),
        if student.intervention_flag { " | ⚠️ intervention" } else { "" }
    );
}

fn print_student_detail(student: &Student) {
    println!("\n👤 {} ({})", student.name, student.id);
    println!(
        "   ELL: {} | Average: {:.2}% | Intervention: {}",
        if student.ell { "yes" } else { "no" },
        student.average_score,
        if student.intervention_flag { "yes" } else { "no" }
    );

    if !student.assessments.is_empty() {
        println!("   Assessments:");
        for a in &student.assessments {
            println!(
                "     {} {} {}/{} ({:.1}%) [{}]",
                a.date.format("%Y-%m-%d"),
                a.assessment_type,
                a.score,
                a.max_score,
                a.percentage,
                a.id
            );
            if let Some(ref feedback) = a.ai_feedback {
                println!("       💬 {}", feedback);
            }
        }
    }

    if !student.ai_summary.is_empty() {
        println!("   Summary: {}", student.ai_summary);
    }
    if !student.ai_strengths.is_empty() {
        println!("   Strengths: {}", student.ai_strengths.join("; "));
    }
    if !student.ai_weaknesses.is_empty() {
        println!("   Weaknesses: {}", student.ai_weaknesses.join("; "));
    }
    if !student.ai_learning_plan.is_empty() {
        println!("   Learning plan: {}", student.ai_learning_plan);
    }
    for intervention in &student.interventions {
        println!(
            "   🛟 {} on {}: {}",
            intervention.intervention_type,
            intervention.date.format("%Y-%m-%d"),
            intervention.notes
        );
    }
}

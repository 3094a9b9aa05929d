use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use services::{AppServices, IngestReport, SkipReason, TopicStatus};
use study_core::model::{ChoiceId, ParseIdError, SubjectId, TopicGroupId, TopicId};
use study_core::{ParseOutcome, StudyPlanRequest, parse_outcomes};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://study.sqlite3";

/// Study-plan generator and progress tracker.
#[derive(Debug, Parser)]
#[command(name = "study", version)]
struct Cli {
    /// `SQLite` database URL or file path.
    #[arg(long = "db", env = "STUDY_DB_URL", default_value = DEFAULT_DB_URL, global = true)]
    db_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List subject names.
    Subjects,
    /// List every subject with its topic-groups and progress.
    Overview,
    /// Create a subject.
    AddSubject { name: String },
    /// Delete a subject and everything under it.
    DeleteSubject { id: SubjectId },
    /// Generate a roadmap for a topic-group and ingest its topics.
    Plan {
        #[arg(long)]
        subject: String,
        #[arg(long = "group")]
        topic_group: String,
        #[arg(long = "level", default_value = "beginner")]
        current_level: String,
        #[arg(long = "depth", default_value = "intermediate")]
        target_depth: String,
    },
    /// Generate questions for the given topics and store them.
    Ingest {
        #[arg(long)]
        subject: String,
        #[arg(long = "group")]
        topic_group: String,
        #[arg(long = "topic", required = true)]
        topics: Vec<String>,
    },
    /// Show a topic-group with its topics and questions.
    Show { id: TopicGroupId },
    /// Mark a topic completed.
    Complete { id: TopicId },
    /// Answer a topic's questions, in order; completes the topic when all are right.
    Attempt {
        id: TopicId,
        /// Chosen choice id per question; `-` leaves a question unanswered.
        #[arg(long = "answer")]
        answers: Vec<Answer>,
    },
    /// Parse a completion file (`-` for stdin) without touching storage.
    Parse { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Answer(Option<ChoiceId>);

impl FromStr for Answer {
    type Err = ParseIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim() == "-" {
            return Ok(Self(None));
        }
        raw.parse().map(|id| Self(Some(id)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "starting");
    let output = run(cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<Value> {
    match cli.command {
        Command::Parse { file } => parse_file(&file),
        command => run_with_storage(&cli.db_url, command).await,
    }
}

async fn run_with_storage(db_url: &str, command: Command) -> Result<Value> {
    let db_url = normalize_sqlite_url(db_url)?;
    prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url)
        .await
        .with_context(|| format!("failed to open database {db_url}"))?;
    let study = services.study();

    let output = match command {
        Command::Subjects => json!(study.list_subject_names().await?),
        Command::Overview => json!(study.list_subjects_with_topic_groups().await?),
        Command::AddSubject { name } => json!({ "id": study.create_subject(&name).await? }),
        Command::DeleteSubject { id } => {
            study.delete_subject(id).await?;
            json!({ "deleted": id })
        }
        Command::Plan {
            subject,
            topic_group,
            current_level,
            target_depth,
        } => {
            let request = StudyPlanRequest {
                subject,
                topic_group,
                current_level,
                target_depth,
            };
            report_json(&services.plan().generate_plan(&request).await?)
        }
        Command::Ingest {
            subject,
            topic_group,
            topics,
        } => report_json(
            &services
                .ingestor()
                .ingest(&subject, &topic_group, &topics)
                .await?,
        ),
        Command::Show { id } => match study.topic_group_detail(id).await? {
            Some(detail) => json!(detail),
            None => bail!("topic-group {id} not found"),
        },
        Command::Complete { id } => json!(study.complete_topic(id).await?),
        Command::Attempt { id, answers } => {
            let answers: Vec<Option<ChoiceId>> = answers.into_iter().map(|a| a.0).collect();
            json!(study.submit_attempt(id, &answers).await?)
        }
        Command::Parse { file } => parse_file(&file)?,
    };
    Ok(output)
}

fn parse_file(file: &Path) -> Result<Value> {
    let mut raw = String::new();
    if file == Path::new("-") {
        std::io::stdin().read_to_string(&mut raw)?;
    } else {
        raw = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
    }

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for outcome in parse_outcomes(&raw) {
        match outcome {
            ParseOutcome::Accepted(question) => accepted.push(json!(question)),
            ParseOutcome::Rejected { block, reason } => {
                rejected.push(json!({ "block": block, "reason": reason.to_string() }));
            }
        }
    }
    Ok(json!({ "questions": accepted, "rejected": rejected }))
}

fn report_json(report: &IngestReport) -> Value {
    let topics: Vec<Value> = report
        .topics
        .iter()
        .map(|outcome| {
            let status = match &outcome.status {
                TopicStatus::Committed {
                    topic_id,
                    questions,
                    rejected_blocks,
                } => json!({
                    "status": "committed",
                    "topic_id": topic_id,
                    "questions": questions,
                    "rejected_blocks": rejected_blocks,
                }),
                TopicStatus::Skipped(reason) => {
                    let reason = match reason {
                        SkipReason::BlankName => "blank_name",
                        SkipReason::AlreadyIngested => "already_ingested",
                    };
                    json!({ "status": "skipped", "reason": reason })
                }
                TopicStatus::Failed(err) => json!({
                    "status": "failed",
                    "error": err.to_string(),
                }),
            };
            json!({ "name": outcome.name, "outcome": status })
        })
        .collect();

    json!({
        "subject_id": report.subject_id,
        "topic_group_id": report.topic_group_id,
        "committed": report.committed(),
        "skipped": report.skipped(),
        "failed": report.failed(),
        "topics": topics,
    })
}

/// Accept bare file paths as well as `sqlite:` URLs; file URLs open in
/// read-write-create mode unless they name a mode already.
fn normalize_sqlite_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("invalid --db value: {raw:?}");
    }
    if trimmed.starts_with("sqlite::memory:") {
        return Ok(trimmed.to_string());
    }
    if trimmed.starts_with("sqlite://") {
        return Ok(with_create_mode(trimmed));
    }

    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    Ok(format!("sqlite://{}?mode=rwc", absolute.display()))
}

fn with_create_mode(url: &str) -> String {
    match url.split_once('?') {
        Some((_, query)) if query.split('&').any(|pair| pair.starts_with("mode=")) => {
            url.to_string()
        }
        Some((_, "")) => format!("{url}mode=rwc"),
        Some(_) => format!("{url}&mode=rwc"),
        None => format!("{url}?mode=rwc"),
    }
}

/// Make sure the database file and its directory exist before connecting.
fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        bail!("invalid --db value: {db_url:?}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok(())
}

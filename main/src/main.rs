use std::path::{Path, PathBuf};

use api_router::api_state::ApiState;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use common::{storage::store::StorageManager, utils::config::get_config};
use ingestion_pipeline::{ImageUpload, PdfUpload};
use retrieval_pipeline::{AnswerRequest, AssistanceLevel, InteractionMode};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ingest course materials and ask questions about them from the command line.
#[derive(Debug, Parser)]
#[command(name = "tutor", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a course, or return the existing one with the same name
    Course {
        #[arg(long, env = "TUTOR_OWNER_ID")]
        owner: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        term: Option<String>,
    },
    /// Index a PDF page by page
    IngestPdf {
        #[arg(long, env = "TUTOR_OWNER_ID")]
        owner: String,
        #[arg(long)]
        course: String,
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
    /// Caption and index an image
    IngestImage {
        #[arg(long, env = "TUTOR_OWNER_ID")]
        owner: String,
        #[arg(long)]
        course: String,
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
    /// Answer a question from a course's materials
    Ask {
        #[arg(long)]
        course: String,
        question: String,
        #[arg(long, value_enum, default_value_t = AssistanceLevel::ExamPrep)]
        level: AssistanceLevel,
        #[arg(long, value_enum, default_value_t = InteractionMode::Worked)]
        mode: InteractionMode,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Show the top vector hits for a query
    Preview {
        #[arg(long)]
        course: String,
        query: String,
        #[arg(long)]
        k: Option<usize>,
    },
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(String::from)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config()?;
    let storage = StorageManager::new(&config).await?;
    let state = ApiState::new(&config, storage).await?;

    let output = match cli.command {
        Command::Course { owner, name, term } => {
            let course = state.store.get_or_create_course(&owner, &name, term).await?;
            serde_json::json!({ "id": course.id, "name": course.name, "term": course.term })
        }
        Command::IngestPdf {
            owner,
            course,
            path,
            title,
        } => {
            let bytes = tokio::fs::read(&path).await?;
            let title = title
                .or_else(|| file_name(&path))
                .unwrap_or_else(|| "Untitled.pdf".to_string());
            info!(path = %path.display(), "Ingesting PDF");
            let report = state
                .ingestion
                .ingest_pdf(PdfUpload {
                    owner_id: owner,
                    course_id: course,
                    title,
                    bytes: Bytes::from(bytes),
                })
                .await?;
            serde_json::to_value(report)?
        }
        Command::IngestImage {
            owner,
            course,
            path,
            title,
        } => {
            let bytes = tokio::fs::read(&path).await?;
            info!(path = %path.display(), "Ingesting image");
            let report = state
                .ingestion
                .ingest_image(ImageUpload {
                    owner_id: owner,
                    course_id: course,
                    title,
                    file_name: file_name(&path),
                    content_type: None,
                    bytes: Bytes::from(bytes),
                })
                .await?;
            serde_json::to_value(report)?
        }
        Command::Ask {
            course,
            question,
            level,
            mode,
            k,
        } => {
            let response = state
                .answers
                .answer_question(AnswerRequest {
                    course_id: course,
                    question,
                    assistance_level: level,
                    mode,
                    k,
                })
                .await?;
            serde_json::to_value(response)?
        }
        Command::Preview { course, query, k } => {
            let hits = state.answers.preview(&course, &query, k).await?;
            serde_json::json!({ "ok": true, "hits": hits })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_snake_case_level() {
        let cli = Cli::try_parse_from([
            "tutor",
            "ask",
            "--course",
            "c1",
            "--level",
            "exam_prep",
            "--mode",
            "socratic",
            "What is entropy?",
        ])
        .expect("parse");

        match cli.command {
            Command::Ask {
                level, mode, k, ..
            } => {
                assert_eq!(level, AssistanceLevel::ExamPrep);
                assert_eq!(mode, InteractionMode::Socratic);
                assert_eq!(k, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn ingest_pdf_requires_course() {
        let parsed = Cli::try_parse_from(["tutor", "ingest-pdf", "--owner", "u1", "notes.pdf"]);
        assert!(parsed.is_err());
    }
}

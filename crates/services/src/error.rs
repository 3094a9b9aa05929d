//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::RoadmapError;
use study_core::model::SubjectError;

/// Errors emitted by a `CompletionGenerator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("text generation is not configured")]
    Disabled,
    #[error("text generation returned an empty response")]
    EmptyResponse,
    #[error("text generation request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Why a single topic could not be ingested.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopicIngestError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("completion contained no valid questions")]
    NoValidQuestions,
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Errors that abort a whole ingestion run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StudyPlanService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanError {
    #[error("roadmap generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Roadmap(#[from] RoadmapError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Errors emitted by `StudyService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyServiceError {
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

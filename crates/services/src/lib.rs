#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod plan;
pub mod study_service;

pub use app_services::AppServices;
pub use error::{
    AppServicesError, GenerationError, IngestError, PlanError, StudyServiceError,
    TopicIngestError,
};
pub use generation::{ChatCompletionClient, CompletionGenerator, GenerationConfig};
pub use ingest::{IngestReport, RoadmapIngestor, SkipReason, TopicOutcome, TopicStatus};
pub use plan::StudyPlanService;
pub use study_service::{AttemptResult, StudyService};

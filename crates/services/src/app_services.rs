use std::sync::Arc;

use storage::repository::Storage;

use crate::error::AppServicesError;
use crate::generation::{ChatCompletionClient, CompletionGenerator};
use crate::ingest::RoadmapIngestor;
use crate::plan::StudyPlanService;
use crate::study_service::StudyService;

/// Assembles app-facing services over one storage backend and generator.
#[derive(Clone)]
pub struct AppServices {
    study: Arc<StudyService>,
    ingestor: Arc<RoadmapIngestor>,
    plan: Arc<StudyPlanService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the environment-configured
    /// chat completion client.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let client = ChatCompletionClient::from_env();
        if !client.enabled() {
            tracing::warn!("STUDY_AI_API_KEY is not set; question generation is disabled");
        }
        Ok(Self::from_storage(&storage, Arc::new(client)))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, generator: Arc<dyn CompletionGenerator>) -> Self {
        let study = Arc::new(StudyService::new(
            Arc::clone(&storage.subjects),
            Arc::clone(&storage.topics),
        ));
        let ingestor = RoadmapIngestor::new(
            Arc::clone(&storage.subjects),
            Arc::clone(&storage.topics),
            Arc::clone(&generator),
        );
        let plan = Arc::new(StudyPlanService::new(generator, ingestor.clone()));

        Self {
            study,
            ingestor: Arc::new(ingestor),
            plan,
        }
    }

    #[must_use]
    pub fn study(&self) -> Arc<StudyService> {
        Arc::clone(&self.study)
    }

    #[must_use]
    pub fn ingestor(&self) -> Arc<RoadmapIngestor> {
        Arc::clone(&self.ingestor)
    }

    #[must_use]
    pub fn plan(&self) -> Arc<StudyPlanService> {
        Arc::clone(&self.plan)
    }
}

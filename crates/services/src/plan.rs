use std::sync::Arc;

use study_core::StudyPlanRequest;
use study_core::parse_topic_list;
use study_core::prompt::roadmap_prompt;

use crate::error::PlanError;
use crate::generation::CompletionGenerator;
use crate::ingest::{IngestReport, RoadmapIngestor};

/// Asks the model for a roadmap and ingests its topics.
#[derive(Clone)]
pub struct StudyPlanService {
    generator: Arc<dyn CompletionGenerator>,
    ingestor: RoadmapIngestor,
}

impl StudyPlanService {
    #[must_use]
    pub fn new(generator: Arc<dyn CompletionGenerator>, ingestor: RoadmapIngestor) -> Self {
        Self {
            generator,
            ingestor,
        }
    }

    /// Generate a roadmap for `request` and ingest every proposed topic.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Generation` or `PlanError::Roadmap` when no topic
    /// list could be obtained, and `PlanError::Ingest` when the subject or
    /// topic-group cannot be stored. Individual topic failures are reported in
    /// the returned `IngestReport` instead.
    pub async fn generate_plan(&self, request: &StudyPlanRequest) -> Result<IngestReport, PlanError> {
        let completion = self
            .generator
            .generate_completion(&roadmap_prompt(request))
            .await?;
        let topics = parse_topic_list(&completion)?;
        tracing::info!(
            topic_group = %request.topic_group,
            topics = topics.len(),
            "roadmap generated"
        );

        let report = self
            .ingestor
            .ingest(&request.subject, &request.topic_group, &topics)
            .await?;
        Ok(report)
    }
}

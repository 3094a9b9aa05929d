use std::sync::Arc;

use serde::Serialize;
use storage::repository::{StorageError, SubjectRepository, TopicRepository};
use study_core::model::{
    AttemptScore, ChoiceId, ProgressSnapshot, SubjectId, SubjectOverview, TopicGroupDetail,
    TopicGroupId, TopicId, grade_attempt, validate_name,
};

use crate::error::StudyServiceError;

/// Outcome of submitting answers for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttemptResult {
    pub score: AttemptScore,
    /// Present when this attempt completed the topic.
    pub progress: Option<ProgressSnapshot>,
}

/// User-facing operations over stored subjects and topics.
#[derive(Clone)]
pub struct StudyService {
    subjects: Arc<dyn SubjectRepository>,
    topics: Arc<dyn TopicRepository>,
}

impl StudyService {
    #[must_use]
    pub fn new(subjects: Arc<dyn SubjectRepository>, topics: Arc<dyn TopicRepository>) -> Self {
        Self { subjects, topics }
    }

    /// Add a new subject.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Subject` for a blank name and
    /// `StudyServiceError::Storage(StorageError::AlreadyExists)` for a taken one.
    pub async fn create_subject(&self, name: &str) -> Result<SubjectId, StudyServiceError> {
        let id = self.subjects.create_subject(validate_name(name)?).await?;
        tracing::info!(%id, subject = name, "subject created");
        Ok(id)
    }

    /// Delete a subject with all of its topic-groups, topics and questions.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage` if the subject is unknown or storage fails.
    pub async fn delete_subject(&self, id: SubjectId) -> Result<(), StudyServiceError> {
        self.subjects.delete_subject(id).await?;
        tracing::info!(%id, "subject deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage` if repository access fails.
    pub async fn list_subject_names(&self) -> Result<Vec<String>, StudyServiceError> {
        Ok(self.subjects.list_subject_names().await?)
    }

    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage` if repository access fails.
    pub async fn list_subjects_with_topic_groups(
        &self,
    ) -> Result<Vec<SubjectOverview>, StudyServiceError> {
        Ok(self.subjects.list_subjects_with_topic_groups().await?)
    }

    /// Fetch a topic-group with all topics, questions and choices.
    ///
    /// Returns `Ok(None)` when the topic-group does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage` if repository access fails.
    pub async fn topic_group_detail(
        &self,
        id: TopicGroupId,
    ) -> Result<Option<TopicGroupDetail>, StudyServiceError> {
        Ok(self.topics.fetch_topic_group_detail(id).await?)
    }

    /// Mark a topic completed and return the refreshed group progress.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage(StorageError::NotFound)` for an unknown topic.
    pub async fn complete_topic(&self, id: TopicId) -> Result<ProgressSnapshot, StudyServiceError> {
        let snapshot = self.topics.mark_topic_completed(id).await?;
        tracing::info!(topic_id = %id, progress = snapshot.progress, "topic completed");
        Ok(snapshot)
    }

    /// Grade one pass over a topic's questions; completes the topic when
    /// every answer is correct.
    ///
    /// `answers[i]` is the choice picked for the topic's `i`-th question.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage(StorageError::NotFound)` for an unknown topic.
    pub async fn submit_attempt(
        &self,
        id: TopicId,
        answers: &[Option<ChoiceId>],
    ) -> Result<AttemptResult, StudyServiceError> {
        let topic = self
            .topics
            .fetch_topic(id)
            .await?
            .ok_or(StorageError::NotFound)?;

        let score = grade_attempt(&topic, answers);
        let progress = if score.all_correct {
            Some(self.complete_topic(id).await?)
        } else {
            None
        };

        tracing::debug!(topic_id = %id, correct = score.correct, total = score.total, "attempt graded");
        Ok(AttemptResult { score, progress })
    }
}

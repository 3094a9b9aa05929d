use std::sync::Arc;

use storage::repository::{StorageError, SubjectRepository, TopicRepository};
use study_core::model::{SubjectId, TopicGroupId, TopicId, validate_name};
use study_core::prompt::topic_questions_prompt;
use study_core::{ParseOutcome, parse_outcomes};

use crate::error::{IngestError, TopicIngestError};
use crate::generation::CompletionGenerator;

/// Why a topic was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BlankName,
    AlreadyIngested,
}

#[derive(Debug)]
pub enum TopicStatus {
    Committed {
        topic_id: TopicId,
        questions: usize,
        rejected_blocks: usize,
    },
    Skipped(SkipReason),
    Failed(TopicIngestError),
}

#[derive(Debug)]
pub struct TopicOutcome {
    pub name: String,
    pub status: TopicStatus,
}

/// Per-topic results of one ingestion run, in input order.
#[derive(Debug)]
pub struct IngestReport {
    pub subject_id: SubjectId,
    pub topic_group_id: TopicGroupId,
    pub topics: Vec<TopicOutcome>,
}

impl IngestReport {
    #[must_use]
    pub fn committed(&self) -> usize {
        self.count(|s| matches!(s, TopicStatus::Committed { .. }))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, TopicStatus::Skipped(_)))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TopicStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&TopicStatus) -> bool) -> usize {
        self.topics.iter().filter(|t| pred(&t.status)).count()
    }
}

/// Turns a roadmap (subject, topic-group, topic names) into stored questions.
///
/// Topics are processed one at a time. A failing topic is recorded in the
/// report and the run moves on to the next one.
#[derive(Clone)]
pub struct RoadmapIngestor {
    subjects: Arc<dyn SubjectRepository>,
    topics: Arc<dyn TopicRepository>,
    generator: Arc<dyn CompletionGenerator>,
}

impl RoadmapIngestor {
    #[must_use]
    pub fn new(
        subjects: Arc<dyn SubjectRepository>,
        topics: Arc<dyn TopicRepository>,
        generator: Arc<dyn CompletionGenerator>,
    ) -> Self {
        Self {
            subjects,
            topics,
            generator,
        }
    }

    /// Ingest every topic of a roadmap.
    ///
    /// # Errors
    ///
    /// Returns `IngestError` only when the subject or topic-group cannot be
    /// resolved; per-topic failures are reported in the `IngestReport`.
    pub async fn ingest(
        &self,
        subject_name: &str,
        topic_group_name: &str,
        topic_names: &[String],
    ) -> Result<IngestReport, IngestError> {
        let subject_id = self
            .subjects
            .ensure_subject(validate_name(subject_name)?)
            .await?;
        let topic_group_id = self
            .subjects
            .ensure_topic_group(subject_id, validate_name(topic_group_name)?)
            .await?;

        let mut report = IngestReport {
            subject_id,
            topic_group_id,
            topics: Vec::with_capacity(topic_names.len()),
        };

        for name in topic_names {
            let status = if name.trim().is_empty() {
                TopicStatus::Skipped(SkipReason::BlankName)
            } else {
                match self.ingest_topic(topic_group_id, topic_group_name, name).await {
                    Ok(status) => status,
                    Err(err) => {
                        tracing::warn!(topic = %name, error = %err, "topic ingestion failed");
                        TopicStatus::Failed(err)
                    }
                }
            };
            report.topics.push(TopicOutcome {
                name: name.clone(),
                status,
            });
        }

        tracing::info!(
            subject = subject_name,
            topic_group = topic_group_name,
            committed = report.committed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "roadmap ingested"
        );
        Ok(report)
    }

    async fn ingest_topic(
        &self,
        group_id: TopicGroupId,
        group_name: &str,
        name: &str,
    ) -> Result<TopicStatus, TopicIngestError> {
        if self.topics.topic_exists(group_id, name).await? {
            tracing::debug!(topic = name, "topic already ingested");
            return Ok(TopicStatus::Skipped(SkipReason::AlreadyIngested));
        }

        let prompt = topic_questions_prompt(group_name, name);
        let completion = self.generator.generate_completion(&prompt).await?;

        let mut questions = Vec::new();
        let mut rejected_blocks = 0;
        for outcome in parse_outcomes(&completion) {
            match outcome {
                ParseOutcome::Accepted(question) => questions.push(question),
                ParseOutcome::Rejected { block, reason } => {
                    tracing::debug!(topic = name, block, %reason, "dropped question block");
                    rejected_blocks += 1;
                }
            }
        }
        if questions.is_empty() {
            return Err(TopicIngestError::NoValidQuestions);
        }

        match self.topics.commit_topic(group_id, name, &questions).await {
            Ok(topic_id) => {
                tracing::info!(topic = name, %topic_id, questions = questions.len(), "topic committed");
                Ok(TopicStatus::Committed {
                    topic_id,
                    questions: questions.len(),
                    rejected_blocks,
                })
            }
            // Another run committed the same topic since the existence check.
            Err(StorageError::AlreadyExists) => Ok(TopicStatus::Skipped(SkipReason::AlreadyIngested)),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use storage::repository::InMemoryRepository;

    const TWO_QUESTIONS: &str = "1. Q1?\nA) x\nB) y\nC) z\nD) w\nResposta correta: B\n\n2. Q2?\nA) a\nB) b\nC) c\nD) d\nResposta correta: D";

    /// Replies per topic name found in the prompt; unknown topics get the default.
    struct ScriptedGenerator {
        replies: HashMap<&'static str, Result<&'static str, ()>>,
        default: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(default: &'static str) -> Self {
            Self {
                replies: HashMap::new(),
                default,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn reply(mut self, topic: &'static str, reply: Result<&'static str, ()>) -> Self {
            self.replies.insert(topic, reply);
            self
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl CompletionGenerator for ScriptedGenerator {
        async fn generate_completion(&self, prompt: &str) -> Result<String, crate::GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self
                .replies
                .iter()
                .find(|(topic, _)| prompt.contains(&format!("\"{topic}\"")))
                .map_or(Ok(self.default), |(_, reply)| *reply);
            reply
                .map(str::to_string)
                .map_err(|()| crate::GenerationError::EmptyResponse)
        }
    }

    fn ingestor(repo: &InMemoryRepository, generator: Arc<ScriptedGenerator>) -> RoadmapIngestor {
        RoadmapIngestor::new(Arc::new(repo.clone()), Arc::new(repo.clone()), generator)
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[tokio::test]
    async fn ingest_commits_every_topic() {
        let repo = InMemoryRepository::new();
        let generator = Arc::new(ScriptedGenerator::new(TWO_QUESTIONS));
        let report = ingestor(&repo, Arc::clone(&generator))
            .ingest("Math", "Calculus", &names(&["Limits", "Derivatives"]))
            .await
            .unwrap();

        assert_eq!(report.committed(), 2);
        assert_eq!(generator.calls(), 2);
        let counts = repo.row_counts().unwrap();
        assert_eq!(counts.topics, 2);
        assert_eq!(counts.questions, 4);
        assert_eq!(counts.choices, 16);
    }

    #[tokio::test]
    async fn rerun_skips_existing_topics_without_writes() {
        let repo = InMemoryRepository::new();
        let generator = Arc::new(ScriptedGenerator::new(TWO_QUESTIONS));
        let ingestor = ingestor(&repo, Arc::clone(&generator));
        let topics = names(&["Limits", "Derivatives"]);

        ingestor.ingest("Math", "Calculus", &topics).await.unwrap();
        let before = repo.row_counts().unwrap();

        let report = ingestor.ingest("Math", "Calculus", &topics).await.unwrap();
        assert_eq!(report.skipped(), 2);
        assert!(report.topics.iter().all(|t| matches!(
            t.status,
            TopicStatus::Skipped(SkipReason::AlreadyIngested)
        )));
        assert_eq!(repo.row_counts().unwrap(), before);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn failing_topics_do_not_abort_the_batch() {
        let repo = InMemoryRepository::new();
        let generator = Arc::new(
            ScriptedGenerator::new(TWO_QUESTIONS)
                .reply("Derivatives", Err(()))
                .reply("Series", Ok("I cannot help with that.")),
        );
        let report = ingestor(&repo, generator)
            .ingest(
                "Math",
                "Calculus",
                &names(&["Limits", "Derivatives", "  ", "Series", "Integrals"]),
            )
            .await
            .unwrap();

        assert_eq!(report.topics.len(), 5);
        assert!(matches!(
            report.topics[1].status,
            TopicStatus::Failed(TopicIngestError::Generation(_))
        ));
        assert!(matches!(
            report.topics[2].status,
            TopicStatus::Skipped(SkipReason::BlankName)
        ));
        assert!(matches!(
            report.topics[3].status,
            TopicStatus::Failed(TopicIngestError::NoValidQuestions)
        ));
        assert!(matches!(
            report.topics[4].status,
            TopicStatus::Committed { questions: 2, .. }
        ));
        assert_eq!(report.committed(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(repo.row_counts().unwrap().topics, 2);
    }

    #[tokio::test]
    async fn storage_failure_on_one_topic_is_reported() {
        let repo = InMemoryRepository::new();
        repo.fail_commits_after_rows(Some(3)).unwrap();
        let generator = Arc::new(ScriptedGenerator::new(TWO_QUESTIONS));
        let report = ingestor(&repo, generator)
            .ingest("Math", "Calculus", &names(&["Limits"]))
            .await
            .unwrap();

        assert!(matches!(
            report.topics[0].status,
            TopicStatus::Failed(TopicIngestError::Storage(_))
        ));
        assert_eq!(repo.row_counts().unwrap().topics, 0);
    }

    #[tokio::test]
    async fn rejected_blocks_are_counted() {
        let repo = InMemoryRepository::new();
        let reply = "Sure!\n1. Q1?\nA) x\nB) y\nResposta correta: B\n2. Broken?\nA) x";
        let generator = Arc::new(ScriptedGenerator::new(reply));
        let report = ingestor(&repo, generator)
            .ingest("Math", "Calculus", &names(&["Limits"]))
            .await
            .unwrap();

        assert!(matches!(
            report.topics[0].status,
            TopicStatus::Committed {
                questions: 1,
                rejected_blocks: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn blank_subject_is_rejected() {
        let repo = InMemoryRepository::new();
        let generator = Arc::new(ScriptedGenerator::new(TWO_QUESTIONS));
        let err = ingestor(&repo, generator)
            .ingest(" ", "Calculus", &names(&["Limits"]))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Subject(_)));
        assert_eq!(repo.row_counts().unwrap().subjects, 0);
    }
}

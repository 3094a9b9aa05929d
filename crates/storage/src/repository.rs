use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use study_core::model::{
    AnswerChoice, ChoiceId, ProgressSnapshot, Question, QuestionId, Subject, SubjectId,
    SubjectOverview, Topic, TopicGroup, TopicGroupDetail, TopicGroupId, TopicId,
    TopicWithQuestions, ValidatedQuestion,
};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Number of rows per entity, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub subjects: usize,
    pub topic_groups: usize,
    pub topics: usize,
    pub questions: usize,
    pub choices: usize,
}

/// Repository contract for subjects and their topic-groups.
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Return the id of the subject with exactly this name, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the subject cannot be read or stored.
    async fn ensure_subject(&self, name: &str) -> Result<SubjectId, StorageError>;

    /// Insert a new subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the name is taken, or other storage errors.
    async fn create_subject(&self, name: &str) -> Result<SubjectId, StorageError>;

    /// Delete a subject and everything beneath it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the subject does not exist, or other storage errors.
    async fn delete_subject(&self, id: SubjectId) -> Result<(), StorageError>;

    /// Return the id of the topic-group `(subject_id, name)`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the subject does not exist, or other storage errors.
    async fn ensure_topic_group(
        &self,
        subject_id: SubjectId,
        name: &str,
    ) -> Result<TopicGroupId, StorageError>;

    /// List subject names ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage access fails.
    async fn list_subject_names(&self) -> Result<Vec<String>, StorageError>;

    /// List subjects ordered by id, each with its topic-groups.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage access fails.
    async fn list_subjects_with_topic_groups(&self) -> Result<Vec<SubjectOverview>, StorageError>;
}

/// Repository contract for topics, questions and completion progress.
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Whether a topic named `name` already exists in the topic-group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage access fails.
    async fn topic_exists(&self, group_id: TopicGroupId, name: &str)
    -> Result<bool, StorageError>;

    /// Persist a topic with all of its questions and choices as one unit.
    ///
    /// Nothing is written when any part fails.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` for a duplicate topic name,
    /// `StorageError::NotFound` for an unknown topic-group, or other storage errors.
    async fn commit_topic(
        &self,
        group_id: TopicGroupId,
        name: &str,
        questions: &[ValidatedQuestion],
    ) -> Result<TopicId, StorageError>;

    /// Mark a topic completed and recompute its topic-group's progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist, or other storage errors.
    async fn mark_topic_completed(&self, topic_id: TopicId)
    -> Result<ProgressSnapshot, StorageError>;

    /// Fetch a topic-group with every topic, question and choice.
    ///
    /// Returns `Ok(None)` when the topic-group does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage access fails.
    async fn fetch_topic_group_detail(
        &self,
        group_id: TopicGroupId,
    ) -> Result<Option<TopicGroupDetail>, StorageError>;

    /// Fetch one topic with its questions and choices.
    ///
    /// Returns `Ok(None)` when the topic does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage access fails.
    async fn fetch_topic(&self, topic_id: TopicId)
    -> Result<Option<TopicWithQuestions>, StorageError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    subjects: Vec<Subject>,
    groups: Vec<TopicGroup>,
    topics: Vec<Topic>,
    questions: Vec<Question>,
    commit_row_budget: Option<usize>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn topic_with_questions(&self, topic: &Topic) -> TopicWithQuestions {
        TopicWithQuestions {
            topic: topic.clone(),
            questions: self
                .questions
                .iter()
                .filter(|q| q.topic_id == topic.id)
                .cloned()
                .collect(),
        }
    }

    fn insert_topic_rows(
        &mut self,
        group_id: TopicGroupId,
        name: &str,
        questions: &[ValidatedQuestion],
    ) -> Result<TopicId, StorageError> {
        let mut budget = self.commit_row_budget;
        let mut take_row = move || match budget.as_mut() {
            Some(0) => Err(StorageError::Connection("simulated write failure".into())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        };

        take_row()?;
        let topic_id = TopicId::new(self.next_id());
        self.topics.push(Topic {
            id: topic_id,
            topic_group_id: group_id,
            name: name.to_owned(),
            completed: false,
        });

        for parsed in questions {
            take_row()?;
            let question_id = QuestionId::new(self.next_id());
            let mut question = Question {
                id: question_id,
                topic_id,
                statement: parsed.statement().to_owned(),
                choices: Vec::with_capacity(parsed.choices().len()),
            };
            for (label, text) in parsed.choices() {
                take_row()?;
                question.choices.push(AnswerChoice {
                    id: ChoiceId::new(self.next_id()),
                    question_id,
                    label: *label,
                    text: text.clone(),
                    is_correct: parsed.is_correct(*label),
                });
            }
            self.questions.push(question);
        }

        Ok(topic_id)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Every operation runs under one lock, so each call is atomic with respect
/// to every other call.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `commit_topic` fail after writing `rows` rows (topic, question or
    /// choice rows), or never when `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    #[cfg(any(test, feature = "testing"))]
    pub fn fail_commits_after_rows(&self, rows: Option<usize>) -> Result<(), StorageError> {
        self.lock()?.commit_row_budget = rows;
        Ok(())
    }

    /// Current number of rows per entity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn row_counts(&self) -> Result<RowCounts, StorageError> {
        let guard = self.lock()?;
        Ok(RowCounts {
            subjects: guard.subjects.len(),
            topic_groups: guard.groups.len(),
            topics: guard.topics.len(),
            questions: guard.questions.len(),
            choices: guard.questions.iter().map(|q| q.choices.len()).sum(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SubjectRepository for InMemoryRepository {
    async fn ensure_subject(&self, name: &str) -> Result<SubjectId, StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard.subjects.iter().find(|s| s.name == name) {
            return Ok(existing.id);
        }
        let id = SubjectId::new(guard.next_id());
        guard.subjects.push(Subject {
            id,
            name: name.to_owned(),
        });
        Ok(id)
    }

    async fn create_subject(&self, name: &str) -> Result<SubjectId, StorageError> {
        let mut guard = self.lock()?;
        if guard.subjects.iter().any(|s| s.name == name) {
            return Err(StorageError::AlreadyExists);
        }
        let id = SubjectId::new(guard.next_id());
        guard.subjects.push(Subject {
            id,
            name: name.to_owned(),
        });
        Ok(id)
    }

    async fn delete_subject(&self, id: SubjectId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let before = guard.subjects.len();
        guard.subjects.retain(|s| s.id != id);
        if guard.subjects.len() == before {
            return Err(StorageError::NotFound);
        }

        let groups: Vec<TopicGroupId> = guard
            .groups
            .iter()
            .filter(|g| g.subject_id == id)
            .map(|g| g.id)
            .collect();
        guard.groups.retain(|g| g.subject_id != id);

        let topics: Vec<TopicId> = guard
            .topics
            .iter()
            .filter(|t| groups.contains(&t.topic_group_id))
            .map(|t| t.id)
            .collect();
        guard.topics.retain(|t| !groups.contains(&t.topic_group_id));
        guard.questions.retain(|q| !topics.contains(&q.topic_id));
        Ok(())
    }

    async fn ensure_topic_group(
        &self,
        subject_id: SubjectId,
        name: &str,
    ) -> Result<TopicGroupId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.subjects.iter().any(|s| s.id == subject_id) {
            return Err(StorageError::NotFound);
        }
        if let Some(existing) = guard
            .groups
            .iter()
            .find(|g| g.subject_id == subject_id && g.name == name)
        {
            return Ok(existing.id);
        }
        let id = TopicGroupId::new(guard.next_id());
        guard.groups.push(TopicGroup {
            id,
            subject_id,
            name: name.to_owned(),
            progress: 0.0,
        });
        Ok(id)
    }

    async fn list_subject_names(&self) -> Result<Vec<String>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.subjects.iter().map(|s| s.name.clone()).collect())
    }

    async fn list_subjects_with_topic_groups(&self) -> Result<Vec<SubjectOverview>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .subjects
            .iter()
            .map(|subject| SubjectOverview {
                subject: subject.clone(),
                topic_groups: guard
                    .groups
                    .iter()
                    .filter(|g| g.subject_id == subject.id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl TopicRepository for InMemoryRepository {
    async fn topic_exists(
        &self,
        group_id: TopicGroupId,
        name: &str,
    ) -> Result<bool, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .topics
            .iter()
            .any(|t| t.topic_group_id == group_id && t.name == name))
    }

    async fn commit_topic(
        &self,
        group_id: TopicGroupId,
        name: &str,
        questions: &[ValidatedQuestion],
    ) -> Result<TopicId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.groups.iter().any(|g| g.id == group_id) {
            return Err(StorageError::NotFound);
        }
        if guard
            .topics
            .iter()
            .any(|t| t.topic_group_id == group_id && t.name == name)
        {
            return Err(StorageError::AlreadyExists);
        }

        let (next_id, topics, stored) = (guard.next_id, guard.topics.len(), guard.questions.len());
        let result = guard.insert_topic_rows(group_id, name, questions);
        if result.is_err() {
            guard.next_id = next_id;
            guard.topics.truncate(topics);
            guard.questions.truncate(stored);
        }
        result
    }

    async fn mark_topic_completed(
        &self,
        topic_id: TopicId,
    ) -> Result<ProgressSnapshot, StorageError> {
        let mut guard = self.lock()?;
        let topic = guard
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or(StorageError::NotFound)?;
        topic.completed = true;
        let group_id = topic.topic_group_id;

        let in_group = guard.topics.iter().filter(|t| t.topic_group_id == group_id);
        let (total, completed) = in_group.fold((0_u32, 0_u32), |(total, done), t| {
            (total + 1, done + u32::from(t.completed))
        });
        let snapshot = ProgressSnapshot::new(total, completed);

        if let Some(group) = guard.groups.iter_mut().find(|g| g.id == group_id) {
            group.progress = snapshot.progress;
        }
        Ok(snapshot)
    }

    async fn fetch_topic_group_detail(
        &self,
        group_id: TopicGroupId,
    ) -> Result<Option<TopicGroupDetail>, StorageError> {
        let guard = self.lock()?;
        let Some(group) = guard.groups.iter().find(|g| g.id == group_id) else {
            return Ok(None);
        };
        let topics = guard
            .topics
            .iter()
            .filter(|t| t.topic_group_id == group_id)
            .map(|t| guard.topic_with_questions(t))
            .collect();
        Ok(Some(TopicGroupDetail {
            topic_group: group.clone(),
            topics,
        }))
    }

    async fn fetch_topic(
        &self,
        topic_id: TopicId,
    ) -> Result<Option<TopicWithQuestions>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .map(|t| guard.topic_with_questions(t)))
    }
}

/// Aggregates subject and topic repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub subjects: Arc<dyn SubjectRepository>,
    pub topics: Arc<dyn TopicRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_memory(repo: InMemoryRepository) -> Self {
        let subjects: Arc<dyn SubjectRepository> = Arc::new(repo.clone());
        let topics: Arc<dyn TopicRepository> = Arc::new(repo);
        Self { subjects, topics }
    }
}

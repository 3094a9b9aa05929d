use serde::{Deserialize, Serialize};

use crate::model::ids::{ChoiceId, QuestionId, TopicGroupId, TopicId};
use crate::model::question::ChoiceLabel;
use crate::model::subject::TopicGroup;

/// One learning unit inside a topic-group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub topic_group_id: TopicGroupId,
    pub name: String,
    pub completed: bool,
}

/// A stored answer choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerChoice {
    pub id: ChoiceId,
    pub question_id: QuestionId,
    pub label: ChoiceLabel,
    pub text: String,
    pub is_correct: bool,
}

/// A stored question with its choices in label order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub topic_id: TopicId,
    pub statement: String,
    pub choices: Vec<AnswerChoice>,
}

impl Question {
    #[must_use]
    pub fn correct_choice(&self) -> Option<&AnswerChoice> {
        self.choices.iter().find(|c| c.is_correct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicWithQuestions {
    pub topic: Topic,
    pub questions: Vec<Question>,
}

/// A topic-group with every topic, question and choice beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicGroupDetail {
    pub topic_group: TopicGroup,
    pub topics: Vec<TopicWithQuestions>,
}

/// Completion counts of a topic-group after a topic was completed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_topics: u32,
    pub completed_topics: u32,
    pub progress: f64,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new(total_topics: u32, completed_topics: u32) -> Self {
        Self {
            total_topics,
            completed_topics,
            progress: crate::progress::compute(total_topics, completed_topics),
        }
    }
}

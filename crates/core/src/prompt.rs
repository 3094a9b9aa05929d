//! Prompt templates sent to the text-generation service.
//!
//! The answer shapes requested here are what [`crate::roadmap`] and
//! [`crate::parser`] accept; wording may change, the shapes may not.

use serde::{Deserialize, Serialize};

/// Number of topics requested for a roadmap.
pub const ROADMAP_TOPICS: usize = 3;

/// Number of questions requested per topic.
pub const QUESTIONS_PER_TOPIC: usize = 2;

/// What the learner asked to study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPlanRequest {
    pub subject: String,
    pub topic_group: String,
    pub current_level: String,
    pub target_depth: String,
}

/// Prompt asking for an ordered roadmap, answered as a JSON array of strings.
#[must_use]
pub fn roadmap_prompt(request: &StudyPlanRequest) -> String {
    format!(
        "Build a study plan for learning {group} (part of {subject}), split into {ROADMAP_TOPICS} clear, \
progressive topics that together cover the material completely.\n\
\n\
The learner's current knowledge: {level}.\n\
The depth they want to reach: {depth}.\n\
\n\
Do not repeat the name of the subject in every topic. Be direct.\n\
\n\
Reply with nothing but a JSON array of quoted topic names, without numbering, for example:\n\
[\"first topic\", \"second topic\", \"third topic\"]\n",
        group = request.topic_group,
        subject = request.subject,
        level = request.current_level,
        depth = request.target_depth,
    )
}

/// Prompt asking for numbered multiple-choice questions on one topic.
#[must_use]
pub fn topic_questions_prompt(topic_group: &str, topic: &str) -> String {
    format!(
        "Write {QUESTIONS_PER_TOPIC} multiple-choice questions about the topic \"{topic}\" \
within \"{topic_group}\".\n\
\n\
Each question must test the topic on its own and have:\n\
- a clear statement\n\
- 4 choices labelled A), B), C), D)\n\
- exactly one correct choice\n\
- a final line naming the correct letter, e.g. \"Resposta correta: B\"\n\
\n\
Use exactly this format:\n\
1. Statement...\n\
   A) ...\n\
   B) ...\n\
   C) ...\n\
   D) ...\n\
   Resposta correta: X\n\
\n\
2. Statement...\n\
   ...\n"
    )
}

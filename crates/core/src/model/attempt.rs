use serde::Serialize;

use crate::model::ids::ChoiceId;
use crate::model::topic::TopicWithQuestions;
use crate::progress;

/// Result of answering every question of a topic once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttemptScore {
    pub correct: u32,
    pub total: u32,
    pub percent: f64,
    /// The topic had questions and every one was answered correctly.
    pub all_correct: bool,
}

/// Scores an attempt where `answers[i]` is the choice picked for question `i`.
///
/// Missing or unanswered entries count as wrong; extra entries are ignored.
#[must_use]
pub fn grade_attempt(topic: &TopicWithQuestions, answers: &[Option<ChoiceId>]) -> AttemptScore {
    let total = u32::try_from(topic.questions.len()).unwrap_or(u32::MAX);
    let correct = topic
        .questions
        .iter()
        .enumerate()
        .filter(|(index, question)| {
            let picked = answers.get(*index).copied().flatten();
            picked.is_some() && picked == question.correct_choice().map(|c| c.id)
        })
        .count();
    let correct = u32::try_from(correct).unwrap_or(u32::MAX);

    AttemptScore {
        correct,
        total,
        percent: progress::compute(total, correct),
        all_correct: total > 0 && correct == total,
    }
}

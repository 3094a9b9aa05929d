use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Why a parsed question block was not accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionRejection {
    #[error("block has no numbered statement")]
    MissingStatement,

    #[error("block declares no correct answer")]
    MissingAnswer,

    #[error("block has no answer choices")]
    NoChoices,

    #[error("declared answer {0:?} does not match any choice")]
    UnknownAnswerLabel(String),
}

//
// ─── CHOICE LABEL ──────────────────────────────────────────────────────────────
//

/// Letter identifying one of the four answer choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChoiceLabel {
    A,
    B,
    C,
    D,
}

impl ChoiceLabel {
    pub const ALL: [ChoiceLabel; 4] = [Self::A, Self::B, Self::C, Self::D];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChoiceLabel::A => "A",
            ChoiceLabel::B => "B",
            ChoiceLabel::C => "C",
            ChoiceLabel::D => "D",
        }
    }

    /// Line prefix that introduces this choice in a completion, e.g. `A)`.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            ChoiceLabel::A => "A)",
            ChoiceLabel::B => "B)",
            ChoiceLabel::C => "C)",
            ChoiceLabel::D => "D)",
        }
    }

    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            _ => None,
        }
    }

    /// Resolves a declared answer to a label.
    ///
    /// Accepts a bare letter (`B`) or a letter followed by `)`, `.` or `*`
    /// and anything after it (`B) 4`, `B.`). Leading `(` and `*` are skipped,
    /// so `(B)` and `**B**` resolve too. Input is expected upper-cased.
    #[must_use]
    pub fn from_declared(declared: &str) -> Option<Self> {
        let mut chars = declared
            .trim()
            .trim_start_matches(['(', '*'])
            .trim_start()
            .chars();
        let label = Self::from_char(chars.next()?)?;
        match chars.next() {
            None | Some(')' | '.' | '*') => Some(label),
            Some(_) => None,
        }
    }
}

impl fmt::Display for ChoiceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── DRAFT / VALIDATED ─────────────────────────────────────────────────────────
//

/// A question as scraped from a completion, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionDraft {
    pub statement: String,
    pub choices: BTreeMap<ChoiceLabel, String>,
    pub declared_answer: String,
}

impl QuestionDraft {
    /// Checks the draft and resolves its declared answer.
    ///
    /// # Errors
    ///
    /// Returns `QuestionRejection` when the statement or declared answer is
    /// empty, when no choices were collected, or when the declared answer
    /// names a label the block never offered.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionRejection> {
        let statement = self.statement.trim().to_owned();
        if statement.is_empty() {
            return Err(QuestionRejection::MissingStatement);
        }
        let declared = self.declared_answer.trim();
        if declared.is_empty() {
            return Err(QuestionRejection::MissingAnswer);
        }
        if self.choices.is_empty() {
            return Err(QuestionRejection::NoChoices);
        }
        let correct = ChoiceLabel::from_declared(declared)
            .filter(|label| self.choices.contains_key(label))
            .ok_or_else(|| QuestionRejection::UnknownAnswerLabel(declared.to_owned()))?;

        Ok(ValidatedQuestion {
            statement,
            choices: self.choices,
            correct,
        })
    }
}

/// A question with at least one choice and exactly one correct label.
///
/// Only obtainable through [`QuestionDraft::validate`], so storage can rely on
/// the invariant without re-checking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedQuestion {
    statement: String,
    choices: BTreeMap<ChoiceLabel, String>,
    correct: ChoiceLabel,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    #[must_use]
    pub fn choices(&self) -> &BTreeMap<ChoiceLabel, String> {
        &self.choices
    }

    #[must_use]
    pub fn correct(&self) -> ChoiceLabel {
        self.correct
    }

    #[must_use]
    pub fn is_correct(&self, label: ChoiceLabel) -> bool {
        self.correct == label
    }
}

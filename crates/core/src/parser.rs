//! Turns a free-text multiple-choice completion into validated questions.
//!
//! The expected shape is a numbered list where every item carries lettered
//! choices and a trailing answer line:
//!
//! ```text
//! 1. What is 2+2?
//!    A) 3
//!    B) 4
//!    C) 5
//!    D) 6
//!    Resposta correta: B
//! ```
//!
//! Parsing never fails as a whole. Blocks that do not form a valid question
//! are reported as [`ParseOutcome::Rejected`] and dropped by [`parse`].

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ChoiceLabel, QuestionDraft, QuestionRejection, ValidatedQuestion};

pub use crate::model::QuestionRejection as ParseRejection;

const ANSWER_PREFIX: &str = "resposta correta:";

static ITEM_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\d+\.").expect("item start pattern is valid"));

static NUMBERED_STATEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*(.*)$").expect("statement pattern is valid"));

/// Per-block result of parsing a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Accepted(ValidatedQuestion),
    /// `block` is the zero-based position of the block in the input.
    Rejected {
        block: usize,
        reason: QuestionRejection,
    },
}

impl ParseOutcome {
    #[must_use]
    pub fn accepted(self) -> Option<ValidatedQuestion> {
        match self {
            ParseOutcome::Accepted(question) => Some(question),
            ParseOutcome::Rejected { .. } => None,
        }
    }
}

/// Parses a completion and keeps only the valid questions, in input order.
#[must_use]
pub fn parse(raw: &str) -> Vec<ValidatedQuestion> {
    parse_outcomes(raw)
        .into_iter()
        .filter_map(ParseOutcome::accepted)
        .collect()
}

/// Parses a completion and reports the outcome of every block.
#[must_use]
pub fn parse_outcomes(raw: &str) -> Vec<ParseOutcome> {
    blocks(raw)
        .enumerate()
        .map(|(block, text)| match draft_from_block(text).validate() {
            Ok(question) => ParseOutcome::Accepted(question),
            Err(reason) => ParseOutcome::Rejected { block, reason },
        })
        .collect()
}

/// Splits the trimmed input before every line that starts with `<n>.`.
///
/// Text ahead of the first numbered line, if any, forms its own block.
pub fn blocks(raw: &str) -> impl Iterator<Item = &str> {
    let text = raw.trim();
    let mut starts: Vec<usize> = ITEM_START
        .find_iter(text)
        .map(|m| m.start())
        .filter(|&start| start > 0)
        .collect();
    starts.insert(0, 0);
    starts.push(text.len());

    let mut bounds = starts.into_iter().peekable();
    std::iter::from_fn(move || {
        let start = bounds.next()?;
        let end = *bounds.peek()?;
        Some(&text[start..end])
    })
    .filter(|block| !block.trim().is_empty())
}

fn draft_from_block(block: &str) -> QuestionDraft {
    let mut lines = block.trim().lines();
    let statement = lines
        .next()
        .and_then(|first| NUMBERED_STATEMENT.captures(first.trim_end()))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .unwrap_or_default();

    let mut draft = QuestionDraft {
        statement,
        ..QuestionDraft::default()
    };

    for line in lines.map(str::trim) {
        if let Some((label, text)) = choice_line(line) {
            draft.choices.insert(label, text.trim().to_owned());
        } else if let Some(declared) = answer_line(line) {
            draft.declared_answer = declared;
        }
    }

    draft
}

fn choice_line(line: &str) -> Option<(ChoiceLabel, &str)> {
    ChoiceLabel::ALL
        .into_iter()
        .find_map(|label| line.strip_prefix(label.marker()).map(|rest| (label, rest)))
}

fn answer_line(line: &str) -> Option<String> {
    let prefix = line.get(..ANSWER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(ANSWER_PREFIX) {
        return None;
    }
    let rest = &line[ANSWER_PREFIX.len()..];
    let value = rest.split(':').next().unwrap_or_default();
    Some(value.trim().to_uppercase())
}

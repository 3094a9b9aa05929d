use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{SubjectId, TopicGroupId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubjectError {
    #[error("name cannot be empty")]
    EmptyName,
}

/// Rejects blank names.
///
/// Names are identity keys and are compared exactly, so the value is not
/// trimmed or case-folded; only whitespace-only input is refused.
///
/// # Errors
///
/// Returns `SubjectError::EmptyName` if the name is empty or whitespace.
pub fn validate_name(name: &str) -> Result<&str, SubjectError> {
    if name.trim().is_empty() {
        return Err(SubjectError::EmptyName);
    }
    Ok(name)
}

/// Top-level study area, e.g. "Mathematics".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

/// A named roadmap inside a subject with its cached completion percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicGroup {
    pub id: TopicGroupId,
    pub subject_id: SubjectId,
    pub name: String,
    pub progress: f64,
}

/// A subject together with all of its topic-groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectOverview {
    pub subject: Subject,
    pub topic_groups: Vec<TopicGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_name_rejects_blank() {
        assert_eq!(validate_name(""), Err(SubjectError::EmptyName));
        assert_eq!(validate_name(" \t"), Err(SubjectError::EmptyName));
    }

    #[test]
    fn validate_name_keeps_value_untouched() {
        assert_eq!(validate_name(" Math "), Ok(" Math "));
    }
}

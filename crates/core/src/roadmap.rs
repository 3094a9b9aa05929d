//! Parses the roadmap completion: a bracketed list of quoted topic names.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoadmapError {
    #[error("completion does not contain a list of topics")]
    NotAList,

    #[error("roadmap contains no usable topic names")]
    Empty,
}

/// Extracts topic names from a completion such as `["Limits", "Derivatives"]`.
///
/// Prose around the outermost brackets is ignored. Non-string elements and
/// blank names are skipped, names are trimmed and repeated names keep their
/// first position.
///
/// # Errors
///
/// Returns `RoadmapError::NotAList` when no JSON array can be found and
/// `RoadmapError::Empty` when the array holds no usable names.
pub fn parse_topic_list(raw: &str) -> Result<Vec<String>, RoadmapError> {
    let items = match serde_json::from_str::<Vec<Value>>(raw.trim()) {
        Ok(items) => items,
        Err(_) => {
            let start = raw.find('[').ok_or(RoadmapError::NotAList)?;
            let end = raw.rfind(']').ok_or(RoadmapError::NotAList)?;
            if end < start {
                return Err(RoadmapError::NotAList);
            }
            serde_json::from_str::<Vec<Value>>(&raw[start..=end])
                .map_err(|_| RoadmapError::NotAList)?
        }
    };

    let mut topics: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(name) = item else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || topics.iter().any(|t| t == name) {
            continue;
        }
        topics.push(name.to_owned());
    }

    if topics.is_empty() {
        return Err(RoadmapError::Empty);
    }
    Ok(topics)
}

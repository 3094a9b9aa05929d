use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use study_core::model::{
    ChoiceId, ChoiceLabel, QuestionId, Subject, SubjectId, Topic, TopicGroup, TopicGroupId,
    TopicId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps constraint violations onto the storage error taxonomy.
///
/// Unique violations mean the name is taken; foreign key violations mean the
/// referenced parent row does not exist.
pub(crate) fn storage_error(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::AlreadyExists,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn subject_id_from_i64(v: i64) -> Result<SubjectId, StorageError> {
    Ok(SubjectId::new(i64_to_u64("subject_id", v)?))
}

pub(crate) fn topic_group_id_from_i64(v: i64) -> Result<TopicGroupId, StorageError> {
    Ok(TopicGroupId::new(i64_to_u64("topic_group_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn choice_id_from_i64(v: i64) -> Result<ChoiceId, StorageError> {
    Ok(ChoiceId::new(i64_to_u64("choice_id", v)?))
}

pub(crate) fn parse_choice_label(s: &str) -> Result<ChoiceLabel, StorageError> {
    let mut chars = s.chars();
    match (chars.next().and_then(ChoiceLabel::from_char), chars.next()) {
        (Some(label), None) => Ok(label),
        _ => Err(StorageError::Serialization(format!("invalid choice label: {s}"))),
    }
}

pub(crate) fn bool_from_i64(field: &'static str, v: i64) -> Result<bool, StorageError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field}: {other}"
        ))),
    }
}

pub(crate) fn map_subject_row(row: &SqliteRow) -> Result<Subject, StorageError> {
    Ok(Subject {
        id: subject_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
    })
}

pub(crate) fn map_topic_group_row(row: &SqliteRow) -> Result<TopicGroup, StorageError> {
    Ok(TopicGroup {
        id: topic_group_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        subject_id: subject_id_from_i64(row.try_get::<i64, _>("subject_id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        progress: row.try_get("progress").map_err(ser)?,
    })
}

pub(crate) fn map_topic_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    Ok(Topic {
        id: topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        topic_group_id: topic_group_id_from_i64(
            row.try_get::<i64, _>("topic_group_id").map_err(ser)?,
        )?,
        name: row.try_get("topic_name").map_err(ser)?,
        completed: bool_from_i64("completed", row.try_get::<i64, _>("completed").map_err(ser)?)?,
    })
}

mod attempt;
mod ids;
mod question;
mod subject;
mod topic;

pub use attempt::{AttemptScore, grade_attempt};
pub use ids::{ChoiceId, ParseIdError, QuestionId, SubjectId, TopicGroupId, TopicId};
pub use question::{ChoiceLabel, QuestionDraft, QuestionRejection, ValidatedQuestion};
pub use subject::{Subject, SubjectError, SubjectOverview, TopicGroup, validate_name};
pub use topic::{AnswerChoice, ProgressSnapshot, Question, Topic, TopicGroupDetail, TopicWithQuestions};

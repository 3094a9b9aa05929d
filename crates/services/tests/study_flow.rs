use std::sync::Arc;

use async_trait::async_trait;
use services::{AppServices, CompletionGenerator, GenerationError, TopicStatus};
use storage::repository::Storage;
use study_core::StudyPlanRequest;
use study_core::model::{ChoiceId, TopicId};

const QUESTIONS: &str = "Here are your questions:\n\
1. What is 2+2?\nA) 3\nB) 4\nC) 5\nD) 6\nResposta correta: B\n\n\
2. What is 3*3?\nA) 6\nB) 8\nC) 9\nD) 12\nResposta correta: C) 9\n";

/// Answers roadmap prompts with a fixed topic list and everything else with `QUESTIONS`.
struct FixedGenerator;

#[async_trait]
impl CompletionGenerator for FixedGenerator {
    async fn generate_completion(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.contains("JSON") {
            Ok(r#"Sure: ["Arithmetic", "Multiplication", "Division", "Fractions"]"#.to_string())
        } else {
            Ok(QUESTIONS.to_string())
        }
    }
}

async fn open_services(name: &str) -> AppServices {
    let storage = Storage::sqlite(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect sqlite");
    AppServices::from_storage(&storage, Arc::new(FixedGenerator))
}

fn committed_ids(statuses: &[services::TopicOutcome]) -> Vec<TopicId> {
    statuses
        .iter()
        .filter_map(|t| match t.status {
            TopicStatus::Committed { topic_id, .. } => Some(topic_id),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn plan_then_study_tracks_progress() {
    let services = open_services("memdb_study_flow").await;
    let request = StudyPlanRequest {
        subject: "Math".into(),
        topic_group: "Basics".into(),
        current_level: "beginner".into(),
        target_depth: "intermediate".into(),
    };

    let report = services.plan().generate_plan(&request).await.expect("plan");
    assert_eq!(report.committed(), 4);
    let topic_ids = committed_ids(&report.topics);

    let study = services.study();
    let detail = study
        .topic_group_detail(report.topic_group_id)
        .await
        .expect("detail")
        .expect("topic-group exists");
    assert_eq!(detail.topics.len(), 4);
    assert!(detail.topics.iter().all(|t| t.questions.len() == 2));

    let first = &detail.topics[0];
    assert_eq!(first.topic.id, topic_ids[0]);
    let answers: Vec<Option<ChoiceId>> = first
        .questions
        .iter()
        .map(|q| q.correct_choice().map(|c| c.id))
        .collect();
    let result = study
        .submit_attempt(topic_ids[0], &answers)
        .await
        .expect("attempt");
    let progress = result.progress.expect("topic completed");
    assert_eq!(progress.total_topics, 4);
    assert!((progress.progress - 25.0).abs() < f64::EPSILON);

    for id in &topic_ids[1..] {
        study.complete_topic(*id).await.expect("complete");
    }
    let overview = study
        .list_subjects_with_topic_groups()
        .await
        .expect("overview");
    assert_eq!(overview.len(), 1);
    assert!((overview[0].topic_groups[0].progress - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn replanning_skips_ingested_topics() {
    let services = open_services("memdb_replan").await;
    let request = StudyPlanRequest {
        subject: "Math".into(),
        topic_group: "Basics".into(),
        current_level: "beginner".into(),
        target_depth: "advanced".into(),
    };

    services.plan().generate_plan(&request).await.expect("first plan");
    let report = services.plan().generate_plan(&request).await.expect("second plan");
    assert_eq!(report.committed(), 0);
    assert_eq!(report.skipped(), 4);

    let names = services.study().list_subject_names().await.expect("names");
    assert_eq!(names, vec!["Math".to_string()]);
}

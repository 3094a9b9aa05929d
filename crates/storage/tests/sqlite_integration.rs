use storage::repository::{RowCounts, StorageError, SubjectRepository, TopicRepository};
use storage::sqlite::SqliteRepository;
use study_core::model::{ChoiceLabel, TopicId};

const TWO_QUESTIONS: &str = "1. Q1?\nA) x\nB) y\nC) z\nD) w\nResposta correta: B\n\n2. Q2?\nA) a\nB) b\nC) c\nD) d\nResposta correta: D";

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_ensure_operations_are_idempotent() {
    let repo = connect("memdb_ensure").await;

    let first = repo.ensure_subject("Math").await.unwrap();
    let second = repo.ensure_subject("Math").await.unwrap();
    assert_eq!(first, second);

    let group = repo.ensure_topic_group(first, "Calculus").await.unwrap();
    assert_eq!(repo.ensure_topic_group(first, "Calculus").await.unwrap(), group);

    let counts = repo.row_counts().await.unwrap();
    assert_eq!(counts.subjects, 1);
    assert_eq!(counts.topic_groups, 1);

    // migrations are re-runnable
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn sqlite_subject_names_are_case_sensitive_and_unique() {
    let repo = connect("memdb_subjects").await;

    repo.create_subject("History").await.unwrap();
    repo.ensure_subject("history").await.unwrap();
    let err = repo.create_subject("History").await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists));

    assert_eq!(
        repo.list_subject_names().await.unwrap(),
        vec!["History".to_string(), "history".to_string()]
    );
}

#[tokio::test]
async fn sqlite_topic_group_requires_existing_subject() {
    let repo = connect("memdb_orphan_group").await;
    let err = repo
        .ensure_topic_group(study_core::model::SubjectId::new(77), "Calculus")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_commit_topic_round_trips_questions() {
    let repo = connect("memdb_commit").await;
    let subject = repo.ensure_subject("Math").await.unwrap();
    let group = repo.ensure_topic_group(subject, "Calculus").await.unwrap();

    let topic_id = repo
        .commit_topic(group, "Limits", &study_core::parse(TWO_QUESTIONS))
        .await
        .unwrap();
    assert!(repo.topic_exists(group, "Limits").await.unwrap());
    assert!(!repo.topic_exists(group, "Series").await.unwrap());

    let err = repo
        .commit_topic(group, "Limits", &study_core::parse(TWO_QUESTIONS))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists));

    let topic = repo.fetch_topic(topic_id).await.unwrap().expect("topic");
    assert_eq!(topic.topic.name, "Limits");
    assert!(!topic.topic.completed);
    assert_eq!(
        topic
            .questions
            .iter()
            .map(|q| q.statement.as_str())
            .collect::<Vec<_>>(),
        vec!["Q1?", "Q2?"]
    );
    for question in &topic.questions {
        assert_eq!(question.choices.len(), 4);
        assert_eq!(question.choices.iter().filter(|c| c.is_correct).count(), 1);
    }
    assert_eq!(topic.questions[0].correct_choice().unwrap().text, "y");
    assert_eq!(
        topic.questions[1].correct_choice().unwrap().label,
        ChoiceLabel::D
    );

    assert_eq!(
        repo.row_counts().await.unwrap(),
        RowCounts {
            subjects: 1,
            topic_groups: 1,
            topics: 1,
            questions: 2,
            choices: 8,
        }
    );
}

#[tokio::test]
async fn sqlite_failed_commit_rolls_back_whole_topic() {
    let repo = connect("memdb_rollback").await;
    let subject = repo.ensure_subject("Math").await.unwrap();
    let group = repo.ensure_topic_group(subject, "Calculus").await.unwrap();

    // Fail on choice B of the second question, after the topic, both
    // questions and five choices were already written.
    sqlx::query(
        r"
        CREATE TRIGGER fail_choice_insert BEFORE INSERT ON answer_choices
        WHEN NEW.text = 'b'
        BEGIN
            SELECT RAISE(ABORT, 'simulated storage failure');
        END;
        ",
    )
    .execute(repo.pool())
    .await
    .unwrap();

    let before = repo.row_counts().await.unwrap();
    let err = repo
        .commit_topic(group, "Limits", &study_core::parse(TWO_QUESTIONS))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Connection(_)));
    assert_eq!(repo.row_counts().await.unwrap(), before);
    assert!(!repo.topic_exists(group, "Limits").await.unwrap());
}

#[tokio::test]
async fn sqlite_completion_recomputes_progress() {
    let repo = connect("memdb_progress").await;
    let subject = repo.ensure_subject("Math").await.unwrap();
    let group = repo.ensure_topic_group(subject, "Calculus").await.unwrap();
    let questions = study_core::parse(TWO_QUESTIONS);

    let mut ids = Vec::new();
    for name in ["Limits", "Derivatives", "Integrals", "Series"] {
        ids.push(repo.commit_topic(group, name, &questions).await.unwrap());
    }

    let err = repo.mark_topic_completed(TopicId::new(9_999)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
    let detail = repo.fetch_topic_group_detail(group).await.unwrap().unwrap();
    assert!(detail.topic_group.progress.abs() < f64::EPSILON);

    let snapshot = repo.mark_topic_completed(ids[0]).await.unwrap();
    assert_eq!(snapshot.total_topics, 4);
    assert_eq!(snapshot.completed_topics, 1);
    assert!((snapshot.progress - 25.0).abs() < f64::EPSILON);

    let detail = repo.fetch_topic_group_detail(group).await.unwrap().unwrap();
    assert!((detail.topic_group.progress - 25.0).abs() < f64::EPSILON);
    assert_eq!(detail.topics.len(), 4);
    assert!(detail.topics[0].topic.completed);
    assert!(!detail.topics[1].topic.completed);

    // completing twice does not count twice
    let again = repo.mark_topic_completed(ids[0]).await.unwrap();
    assert_eq!(again.completed_topics, 1);

    for id in &ids[1..] {
        repo.mark_topic_completed(*id).await.unwrap();
    }
    let overview = repo.list_subjects_with_topic_groups().await.unwrap();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].topic_groups.len(), 1);
    assert!((overview[0].topic_groups[0].progress - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn sqlite_unknown_topic_group_detail_is_none() {
    let repo = connect("memdb_detail_none").await;
    let detail = repo
        .fetch_topic_group_detail(study_core::model::TopicGroupId::new(1))
        .await
        .unwrap();
    assert!(detail.is_none());
    assert!(repo.fetch_topic(TopicId::new(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_delete_subject_cascades_to_all_descendants() {
    let repo = connect("memdb_cascade").await;
    let math = repo.ensure_subject("Math").await.unwrap();
    let group = repo.ensure_topic_group(math, "Calculus").await.unwrap();
    repo.commit_topic(group, "Limits", &study_core::parse(TWO_QUESTIONS))
        .await
        .unwrap();
    let physics = repo.ensure_subject("Physics").await.unwrap();
    repo.ensure_topic_group(physics, "Optics").await.unwrap();

    repo.delete_subject(math).await.unwrap();

    assert_eq!(
        repo.row_counts().await.unwrap(),
        RowCounts {
            subjects: 1,
            topic_groups: 1,
            topics: 0,
            questions: 0,
            choices: 0,
        }
    );
    assert!(matches!(
        repo.delete_subject(math).await.unwrap_err(),
        StorageError::NotFound
    ));
}

async fn connect_file(dir: &tempfile::TempDir) -> SqliteRepository {
    let path = dir.path().join("study.sqlite3");
    let repo = SqliteRepository::connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_concurrent_ensure_creates_one_row() {
    let dir = tempfile::TempDir::new().unwrap();
    let repo = connect_file(&dir).await;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let repo = repo.clone();
        tasks.spawn(async move {
            let subject = repo.ensure_subject("Math").await?;
            let group = repo.ensure_topic_group(subject, "Calculus").await?;
            Ok::<_, StorageError>((subject, group))
        });
    }

    let mut ids = Vec::new();
    while let Some(done) = tasks.join_next().await {
        ids.push(done.unwrap().unwrap());
    }
    assert_eq!(ids.len(), 8);
    assert!(ids.iter().all(|pair| *pair == ids[0]));

    let counts = repo.row_counts().await.unwrap();
    assert_eq!(counts.subjects, 1);
    assert_eq!(counts.topic_groups, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_concurrent_completions_lose_no_update() {
    let dir = tempfile::TempDir::new().unwrap();
    let repo = connect_file(&dir).await;
    let subject = repo.ensure_subject("Math").await.unwrap();
    let group = repo.ensure_topic_group(subject, "Calculus").await.unwrap();
    let questions = study_core::parse(TWO_QUESTIONS);
    let mut topic_ids = Vec::new();
    for name in ["Limits", "Derivatives", "Integrals", "Series"] {
        topic_ids.push(repo.commit_topic(group, name, &questions).await.unwrap());
    }

    let mut tasks = tokio::task::JoinSet::new();
    for id in topic_ids {
        let repo = repo.clone();
        tasks.spawn(async move { repo.mark_topic_completed(id).await });
    }
    let mut snapshots = Vec::new();
    while let Some(done) = tasks.join_next().await {
        snapshots.push(done.unwrap().unwrap());
    }

    // Completions serialize, so exactly one of them saw all four done.
    assert!(snapshots.iter().all(|s| s.total_topics == 4));
    assert_eq!(
        snapshots.iter().filter(|s| s.completed_topics == 4).count(),
        1
    );

    let detail = repo.fetch_topic_group_detail(group).await.unwrap().unwrap();
    assert!((detail.topic_group.progress - 100.0).abs() < f64::EPSILON);
    assert!(detail.topics.iter().all(|t| t.topic.completed));
}

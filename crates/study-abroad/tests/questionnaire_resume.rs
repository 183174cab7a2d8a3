use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use study_abroad::workflows::questionnaire::{
    AnswerValue, CheckpointStore, FileCheckpointStore, FlowCatalog, QuestionnaireSession,
};

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 2, 14, minute, 0)
        .single()
        .expect("valid timestamp")
}

fn store(name: &str) -> Arc<FileCheckpointStore> {
    let root = std::env::temp_dir().join(format!(
        "study-abroad-checkpoints-{}-{name}",
        std::process::id()
    ));
    Arc::new(FileCheckpointStore::new(root).expect("checkpoint dir"))
}

#[test]
fn questionnaire_resumes_from_file_checkpoint() {
    let catalog = Arc::new(FlowCatalog::advisory());
    let checkpoints = store("resume");

    {
        let mut chat =
            QuestionnaireSession::begin(catalog.clone(), "visitor-42", checkpoints.clone())
                .expect("session begins");
        chat.answer_current(AnswerValue::text("master"), at(0))
            .expect("study level");
        chat.answer_current(AnswerValue::choices(["france"]), at(1))
            .expect("destinations");
        chat.answer_current(AnswerValue::text("engineering"), at(2))
            .expect("field");
        assert_eq!(chat.current().expect("cursor").id, "french_proficiency");
    }

    let saved = checkpoints
        .get("visitor-42")
        .expect("read checkpoint")
        .expect("checkpoint present");
    assert_eq!(saved.saved_at, at(2));
    assert_eq!(saved.cursor_node.as_deref(), Some("french_proficiency"));

    let mut chat = QuestionnaireSession::resume(catalog, "visitor-42", checkpoints.clone())
        .expect("session resumes");
    assert_eq!(chat.current().expect("cursor").id, "french_proficiency");
    assert_eq!(
        chat.state().history(),
        ["study_level", "destinations", "field_of_interest"]
    );

    chat.answer_current(AnswerValue::Number(4.0), at(3))
        .expect("proficiency");
    chat.revise("destinations", AnswerValue::choices(["china"]), at(4))
        .expect("destinations revised");

    let flow = chat.flow();
    assert!(!flow.contains("french_proficiency"));
    assert!(flow.contains("china_teaching_language"));
    assert!(chat.answers().contains_key("french_proficiency"));
    assert!(chat
        .transcript()
        .iter()
        .all(|entry| entry.node.id != "french_proficiency"));
    assert!(chat
        .diagnostic_request()
        .answers
        .iter()
        .all(|answer| answer.question_id != "french_proficiency"));

    let answers = chat.finish().expect("session finishes");
    assert!(!answers.contains_key("french_proficiency"));
    assert_eq!(
        answers.get("destinations"),
        Some(&AnswerValue::choices(["china"]))
    );
    assert!(checkpoints.get("visitor-42").expect("read").is_none());
}

#[test]
fn resume_without_checkpoint_starts_fresh() {
    let chat = QuestionnaireSession::resume(
        Arc::new(FlowCatalog::advisory()),
        "first-visit",
        store("fresh"),
    )
    .expect("session starts");
    assert_eq!(chat.current().expect("cursor").id, "study_level");
    assert!(chat.answers().is_empty());
    assert!(!chat.is_complete());
}

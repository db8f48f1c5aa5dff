use std::fs;
use std::path::Path;

use qbank_core::models::list::ListId;
use qbank_core::models::question::QuestionId;
use qbank_core::source::{QuestionSource, SourceError};
use qbank_store::JsonStore;
use qbank_store::error::StorageError;

fn write(root: &Path, key: &str, body: &str) {
    let path = root.join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn question_json(id: &str) -> String {
    format!(
        r#"{{ "id": "{id}", "statement": "Statement {id}",
             "answer": {{ "type": "free_response" }} }}"#
    )
}

fn seeded_store() -> (tempfile::TempDir, JsonStore) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "lists/L1.json",
        r#"{ "id": "L1", "title": "Week 1", "question_ids": ["Q1", "Q2", "Q3"] }"#,
    );
    write(root, "questions/Q1.json", &question_json("Q1"));
    write(root, "questions/Q3.json", &question_json("Q3"));
    write(root, "questions/Q4.json", &question_json("Q4"));
    write(root, "versions/Q1.json", r#"["Q4", "Q5"]"#);
    let store = JsonStore::new(root);
    (dir, store)
}

#[test]
fn fetch_list_reads_ordering() {
    let (_dir, store) = seeded_store();
    let list = store.fetch_list(&ListId::new("L1")).unwrap();
    assert_eq!(list.title, "Week 1");
    assert_eq!(list.question_ids.len(), 3);
    assert!(list.header.is_none());
}

#[test]
fn missing_list_is_not_found() {
    let (_dir, store) = seeded_store();
    let err = store.fetch_list(&ListId::new("L9")).unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)));
}

#[test]
fn dangling_questions_are_left_out() {
    let (_dir, store) = seeded_store();
    let ids: Vec<QuestionId> = ["Q1", "Q2", "Q3"].into_iter().map(QuestionId::new).collect();
    let records = store.fetch_questions(&ids).unwrap();
    let got: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(got, vec!["Q1", "Q3"]);
}

#[test]
fn corrupt_question_is_skipped() {
    let (dir, store) = seeded_store();
    write(dir.path(), "questions/Q2.json", "{ not json");
    let ids = vec![QuestionId::new("Q2"), QuestionId::new("Q3")];
    let records = store.fetch_questions(&ids).unwrap();
    assert_eq!(records.len(), 1);

    let err = store.get_question(&QuestionId::new("Q2")).unwrap_err();
    assert!(matches!(err, StorageError::Serialization { .. }));
}

#[test]
fn alternate_versions_resolve_existing_records_only() {
    let (_dir, store) = seeded_store();
    let alternates = store
        .fetch_alternate_versions(&QuestionId::new("Q1"))
        .unwrap();
    assert_eq!(alternates.len(), 1);
    assert_eq!(alternates[0].id.as_str(), "Q4");

    let none = store
        .fetch_alternate_versions(&QuestionId::new("Q3"))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn traversal_ids_are_rejected() {
    let (_dir, store) = seeded_store();
    let err = store.get_list(&ListId::new("../L1")).unwrap_err();
    assert!(matches!(err, StorageError::InvalidId(_)));

    let err = store.fetch_list(&ListId::new("../L1")).unwrap_err();
    assert!(matches!(err, SourceError::Backend(_)));
}

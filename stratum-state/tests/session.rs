//! Session storage integration tests.

use stratum_state::{
    reduce, AgentState, FileSessionStore, InMemorySessionStore, Session, SessionStore, StateUpdate,
};
use stratum_types::{Message, Phase, StateError};

fn populated_state() -> AgentState {
    let mut state = AgentState::new();
    reduce(
        &mut state,
        StateUpdate::append_messages(vec![
            Message::system("You are a planning agent."),
            Message::user("Plan the migration."),
        ]),
    );
    reduce(&mut state, StateUpdate::write_file("findings.md", "## Findings"));
    state
}

#[tokio::test]
async fn in_memory_roundtrip() {
    let store = InMemorySessionStore::new();
    let session = Session::with_state("s-1", populated_state());

    store.save(&session).await.unwrap();
    let loaded = store.load("s-1").await.unwrap();
    assert_eq!(loaded.state, session.state);
    // The store stamps the save time.
    assert!(loaded.updated_at >= session.updated_at);

    let summaries = store.list().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].message_count, 2);
    assert_eq!(summaries[0].current_phase, Phase::Investigation);
    assert_eq!(summaries[0].compressions, 0);

    store.delete("s-1").await.unwrap();
    assert!(matches!(
        store.load("s-1").await,
        Err(StateError::NotFound(_))
    ));
}

#[tokio::test]
async fn in_memory_listing_is_ordered_by_id() {
    let store = InMemorySessionStore::new();
    for id in ["charlie", "alpha", "bravo"] {
        store.save(&Session::new(id)).await.unwrap();
    }
    let ids: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, ["alpha", "bravo", "charlie"]);
}

#[tokio::test]
async fn file_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().to_path_buf());

    let session = Session::with_state("s-file", populated_state());
    store.save(&session).await.unwrap();

    let loaded = store.load("s-file").await.unwrap();
    assert_eq!(loaded.state, session.state);

    let summaries = store.list().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].current_phase, Phase::Investigation);

    store.delete("s-file").await.unwrap();
    assert!(matches!(
        store.load("s-file").await,
        Err(StateError::NotFound(_))
    ));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn file_store_lists_from_the_index_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileSessionStore::new(dir.path().to_path_buf());
        store
            .save(&Session::with_state("persisted", populated_state()))
            .await
            .unwrap();
    }

    // A fresh store over the same directory serves the index it finds.
    let store = FileSessionStore::new(dir.path().to_path_buf());
    let summaries = store.list().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, "persisted");
    assert_eq!(summaries[0].message_count, 2);
}

#[tokio::test]
async fn file_store_leaves_no_temp_files_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().to_path_buf());
    store.save(&Session::new("tidy")).await.unwrap();

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    assert_eq!(names, ["index.json", "tidy.json"]);
}

#[tokio::test]
async fn file_store_missing_session_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().to_path_buf());
    assert!(matches!(
        store.load("nope").await,
        Err(StateError::NotFound(_))
    ));
    assert!(matches!(
        store.delete("nope").await,
        Err(StateError::NotFound(_))
    ));
    assert!(store.list().await.unwrap().is_empty());
}

#[test]
fn serialize_deserialize_serialize_is_byte_stable() {
    let state = populated_state();
    let first = serde_json::to_string(&state).unwrap();
    let back: AgentState = serde_json::from_str(&first).unwrap();
    let second = serde_json::to_string(&back).unwrap();
    assert_eq!(first, second);
}

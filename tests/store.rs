use chrono::{Duration, Utc};
use tempfile::NamedTempFile;

use coderoom::db::dbsessions::DbSessions;
use coderoom::models::{
    ChatMessage, Creator, SessionError, SessionFile, UpdateFields, DEFAULT_CODE,
};

async fn open_store() -> (DbSessions, NamedTempFile) {
    let file = NamedTempFile::new().expect("temp db file");
    let url = format!("sqlite://{}?mode=rwc", file.path().display());
    let db = DbSessions::new(&url).await.expect("open store");
    (db, file)
}

fn creator(name: &str, user_id: Option<&str>) -> Creator {
    Creator {
        name: name.to_string(),
        user_id: user_id.map(|s| s.to_string()),
    }
}

fn file_entry(name: &str, content: &[u8], mime: &str) -> SessionFile {
    SessionFile {
        name: name.to_string(),
        content: content.to_vec(),
        mime: mime.to_string(),
        size: content.len() as i64,
        uploaded_by: "u-alice".to_string(),
        uploader_name: "Alice".to_string(),
        uploaded_at: Utc::now(),
    }
}

/// Backdate a session's expiry so TTL behavior is observable in a test.
async fn expire_now(db: &DbSessions, room_id: &str) {
    sqlx::query("UPDATE sessions SET expires_at = ? WHERE room_id = ?")
        .bind(Utc::now() - Duration::seconds(5))
        .bind(room_id)
        .execute(db._pool())
        .await
        .expect("backdate expiry");
}

#[tokio::test]
async fn create_then_get_returns_creator_code_and_fixed_window() {
    let (db, _guard) = open_store().await;

    let session = db
        .create_session(
            "abc123",
            creator("Alice", Some("u-alice")),
            Some("// start\n".to_string()),
            Some("python".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(session.expires_at - session.created_at, Duration::days(7));

    let loaded = db.get_session("abc123").await.unwrap();
    assert_eq!(loaded.code, "// start\n");
    assert_eq!(loaded.language, "python");
    assert_eq!(loaded.participants.len(), 1);
    assert_eq!(loaded.participants[0].user_id, "u-alice");
    assert_eq!(loaded.participants[0].name, "Alice");
    assert_eq!(loaded.expires_at - loaded.created_at, Duration::days(7));
}

#[tokio::test]
async fn create_without_code_uses_the_placeholder() {
    let (db, _guard) = open_store().await;

    let session = db
        .create_session("room1", creator("Alice", None), None, None)
        .await
        .unwrap();
    assert_eq!(session.code, DEFAULT_CODE);
    assert_eq!(session.language, "javascript");
    // A minted id ties the creator to their seeded participant entry.
    let minted = session.creator.user_id.expect("minted user id");
    assert_eq!(session.participants[0].user_id, minted);
}

#[tokio::test]
async fn duplicate_create_fails_and_leaves_the_original_untouched() {
    let (db, _guard) = open_store().await;

    db.create_session(
        "abc123",
        creator("Alice", Some("u-alice")),
        Some("original".to_string()),
        None,
    )
    .await
    .unwrap();

    let err = db
        .create_session(
            "abc123",
            creator("Mallory", Some("u-mallory")),
            Some("overwritten".to_string()),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::AlreadyExists(_)));

    let loaded = db.get_session("abc123").await.unwrap();
    assert_eq!(loaded.creator.name, "Alice");
    assert_eq!(loaded.code, "original");
}

#[tokio::test]
async fn expired_get_reports_gone_then_not_found() {
    let (db, _guard) = open_store().await;

    db.create_session("abc123", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();
    expire_now(&db, "abc123").await;

    let err = db.get_session("abc123").await.unwrap_err();
    assert!(matches!(err, SessionError::Expired(_)));

    // The first failing read reaped the row.
    let err = db.get_session("abc123").await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn an_expired_room_id_is_reusable_by_create() {
    let (db, _guard) = open_store().await;

    db.create_session("abc123", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();
    expire_now(&db, "abc123").await;

    let session = db
        .create_session("abc123", creator("Bob", Some("u-bob")), None, None)
        .await
        .unwrap();
    assert_eq!(session.creator.name, "Bob");
}

#[tokio::test]
async fn upsert_file_replaces_without_duplicating() {
    let (db, _guard) = open_store().await;

    db.create_session("abc123", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();

    db.upsert_file("abc123", "f1", file_entry("notes.txt", b"v1", "text/plain"))
        .await
        .unwrap();
    db.upsert_file(
        "abc123",
        "f1",
        file_entry("notes.md", b"version two", "text/markdown"),
    )
    .await
    .unwrap();

    let session = db.get_session("abc123").await.unwrap();
    assert_eq!(session.files.len(), 1);
    let file = &session.files["f1"];
    assert_eq!(file.name, "notes.md");
    assert_eq!(file.content, b"version two");
    assert_eq!(file.mime, "text/markdown");
    assert_eq!(file.size, b"version two".len() as i64);
}

#[tokio::test]
async fn delete_file_distinguishes_missing_file_from_missing_session() {
    let (db, _guard) = open_store().await;

    let err = db.delete_file("nope", "f1").await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));

    db.create_session("abc123", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();

    let err = db.delete_file("abc123", "f1").await.unwrap_err();
    assert!(matches!(err, SessionError::FileNotFound(_, _)));

    db.upsert_file("abc123", "f1", file_entry("a.txt", b"x", "text/plain"))
        .await
        .unwrap();
    let before = db.get_session("abc123").await.unwrap();

    db.delete_file("abc123", "f1").await.unwrap();
    let after = db.get_session("abc123").await.unwrap();
    assert_eq!(after.files.len(), before.files.len() - 1);
    assert!(after.last_activity >= before.last_activity);
}

#[tokio::test]
async fn chat_log_is_append_only_and_ordered() {
    let (db, _guard) = open_store().await;

    db.create_session("abc123", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();

    for i in 0..3 {
        db.append_message(
            "abc123",
            ChatMessage {
                user_id: "u-bob".to_string(),
                user_name: "Bob".to_string(),
                message: format!("msg {i}"),
                timestamp: Utc::now(),
            },
        )
        .await
        .unwrap();
    }

    let session = db.get_session("abc123").await.unwrap();
    assert_eq!(session.messages.len(), 3);
    let texts: Vec<&str> = session.messages.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, vec!["msg 0", "msg 1", "msg 2"]);
}

#[tokio::test]
async fn record_participant_reconciles_instead_of_duplicating() {
    let (db, _guard) = open_store().await;

    db.create_session("abc123", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();

    db.record_participant("abc123", "u-bob", "Bob").await.unwrap();
    let first = db.get_session("abc123").await.unwrap();
    assert_eq!(first.participants.len(), 2);
    let bob_joined = first.participants[1].joined_at;

    db.record_participant("abc123", "u-bob", "Bobby").await.unwrap();
    let second = db.get_session("abc123").await.unwrap();
    assert_eq!(second.participants.len(), 2);
    assert_eq!(second.participants[1].name, "Bobby");
    assert_eq!(second.participants[1].joined_at, bob_joined);
    assert!(second.participants[1].last_seen >= first.participants[1].last_seen);

    db.remove_participant("abc123", "u-bob").await.unwrap();
    let third = db.get_session("abc123").await.unwrap();
    assert_eq!(third.participants.len(), 1);

    // Removing an absent participant is a no-op, not an error.
    db.remove_participant("abc123", "u-bob").await.unwrap();
}

#[tokio::test]
async fn update_fields_merges_only_what_was_given() {
    let (db, _guard) = open_store().await;

    db.create_session(
        "abc123",
        creator("Alice", Some("u-alice")),
        Some("v1".to_string()),
        Some("python".to_string()),
    )
    .await
    .unwrap();

    db.update_fields(
        "abc123",
        UpdateFields {
            code: Some("v2".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let session = db.get_session("abc123").await.unwrap();
    assert_eq!(session.code, "v2");
    assert_eq!(session.language, "python");

    let err = db
        .update_fields("missing", UpdateFields::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn whiteboard_updates_replace_wholesale() {
    let (db, _guard) = open_store().await;

    db.create_session("abc123", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();

    db.update_whiteboard("abc123", vec![serde_json::json!({"shape": "rect"})])
        .await
        .unwrap();
    db.update_whiteboard("abc123", vec![serde_json::json!({"shape": "circle"})])
        .await
        .unwrap();

    let session = db.get_session("abc123").await.unwrap();
    assert_eq!(session.whiteboard_elements.len(), 1);
    assert_eq!(session.whiteboard_elements[0]["shape"], "circle");
}

#[tokio::test]
async fn listing_covers_created_and_joined_sessions_most_recent_first() {
    let (db, _guard) = open_store().await;

    db.create_session("mine", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();
    db.create_session("joined", creator("Bob", Some("u-bob")), None, None)
        .await
        .unwrap();
    db.create_session("unrelated", creator("Carol", Some("u-carol")), None, None)
        .await
        .unwrap();

    db.record_participant("joined", "u-alice", "Alice")
        .await
        .unwrap();
    // Activity ordering beats creation order: touch "mine" last.
    db.update_fields(
        "mine",
        UpdateFields {
            code: Some("touched".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let sessions = db.list_user_sessions("u-alice", 10).await.unwrap();
    let ids: Vec<&str> = sessions.iter().map(|s| s.room_id.as_str()).collect();
    assert_eq!(ids, vec!["mine", "joined"]);

    let limited = db.list_user_sessions("u-alice", 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].room_id, "mine");
}

#[tokio::test]
async fn sweep_reaps_only_expired_sessions() {
    let (db, _guard) = open_store().await;

    db.create_session("old", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();
    db.create_session("fresh", creator("Bob", Some("u-bob")), None, None)
        .await
        .unwrap();
    expire_now(&db, "old").await;

    assert_eq!(db.delete_expired().await.unwrap(), 1);
    assert_eq!(db.count_sessions().await.unwrap(), 1);
    assert!(db.get_session("fresh").await.is_ok());
    assert!(matches!(
        db.get_session("old").await.unwrap_err(),
        SessionError::NotFound(_)
    ));
}

#[tokio::test]
async fn delete_session_is_hard_and_reports_missing() {
    let (db, _guard) = open_store().await;

    db.create_session("abc123", creator("Alice", Some("u-alice")), None, None)
        .await
        .unwrap();
    db.delete_session("abc123").await.unwrap();

    assert!(matches!(
        db.delete_session("abc123").await.unwrap_err(),
        SessionError::NotFound(_)
    ));

    // Hard delete: the id is free for a new session immediately.
    db.create_session("abc123", creator("Bob", Some("u-bob")), None, None)
        .await
        .unwrap();
}

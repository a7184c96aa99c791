use chrono::Utc;
use score_shelf::storage::models::{
    AccountRecord, DeleteOutcome, RecordKey, ScoreQuery, ScoreRecord, SessionRecord,
};
use score_shelf::storage::Database;

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_score(owner: &str, name: &str, tag: &str) -> ScoreRecord {
    ScoreRecord {
        owner_id: owner.to_string(),
        name: name.to_string(),
        tag: tag.to_string(),
        is_public: false,
        url: format!("http://localhost:8080/blobs/scores/{owner}/{name}"),
        mime_type: "application/pdf".to_string(),
        byte_size: 1024,
        uploaded_at: Utc::now(),
    }
}

fn names(scores: &[ScoreRecord]) -> Vec<&str> {
    scores.iter().map(|s| s.name.as_str()).collect()
}

#[test]
fn test_put_and_get_score() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("u1", "song.pdf", "jazz")).unwrap();

    let retrieved = db
        .get_score(&RecordKey::new("u1", "song.pdf"))
        .unwrap()
        .expect("score should exist");
    assert_eq!(retrieved.owner_id, "u1");
    assert_eq!(retrieved.name, "song.pdf");
    assert_eq!(retrieved.tag, "jazz");
    assert!(!retrieved.is_public);
}

#[test]
fn test_get_score_not_found() {
    let (_dir, db) = test_db();
    assert!(db
        .get_score(&RecordKey::new("u1", "nothing.pdf"))
        .unwrap()
        .is_none());
}

#[test]
fn test_put_same_key_replaces() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("u1", "song.pdf", "first")).unwrap();
    let mut second = sample_score("u1", "song.pdf", "second");
    second.is_public = true;
    db.put_score(&second).unwrap();

    let all = db.get_all_scores().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].tag, "second");
    assert!(all[0].is_public);
    assert_eq!(db.get_scores_by_owner("u1").unwrap().len(), 1);
}

#[test]
fn test_same_name_different_owners_are_distinct() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("u1", "song.pdf", "")).unwrap();
    db.put_score(&sample_score("u2", "song.pdf", "")).unwrap();

    assert_eq!(db.get_all_scores().unwrap().len(), 2);
    assert_eq!(db.get_scores_by_owner("u1").unwrap().len(), 1);
    assert_eq!(db.get_scores_by_owner("u2").unwrap().len(), 1);
}

#[test]
fn test_query_by_owner() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("u1", "b.pdf", "")).unwrap();
    db.put_score(&sample_score("u1", "a.pdf", "")).unwrap();
    db.put_score(&sample_score("u2", "c.pdf", "")).unwrap();

    let mine = db
        .query_scores(&ScoreQuery {
            owner_id: Some("u1".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(&mine), vec!["a.pdf", "b.pdf"]);

    let all = db.query_scores(&ScoreQuery::default()).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn test_query_tag_filter() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("u1", "a.pdf", "jazz-ballad")).unwrap();
    db.put_score(&sample_score("u1", "b.pdf", "rock")).unwrap();
    db.put_score(&sample_score("u1", "c.pdf", "")).unwrap();

    let jazz = db
        .query_scores(&ScoreQuery {
            tag_contains: Some("jazz".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(&jazz), vec!["a.pdf"]);
}

#[test]
fn test_query_visibility() {
    let (_dir, db) = test_db();
    let mut open = sample_score("u2", "open.pdf", "");
    open.is_public = true;
    db.put_score(&open).unwrap();
    db.put_score(&sample_score("u2", "hidden.pdf", "")).unwrap();
    db.put_score(&sample_score("u1", "mine.pdf", "")).unwrap();

    let visible = db
        .query_scores(&ScoreQuery {
            visible_to: Some("u1".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(&visible), vec!["mine.pdf", "open.pdf"]);
}

#[test]
fn test_delete_score_by_owner() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("u1", "a.pdf", "")).unwrap();
    db.put_score(&sample_score("u1", "b.pdf", "")).unwrap();

    let outcome = db.delete_score(&RecordKey::new("u1", "a.pdf"), "u1").unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(db.get_score(&RecordKey::new("u1", "a.pdf")).unwrap().is_none());
    assert_eq!(names(&db.get_scores_by_owner("u1").unwrap()), vec!["b.pdf"]);
}

#[test]
fn test_delete_score_refuses_other_requester() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("u1", "a.pdf", "")).unwrap();

    let outcome = db.delete_score(&RecordKey::new("u1", "a.pdf"), "u2").unwrap();
    assert_eq!(outcome, DeleteOutcome::NotOwner);
    assert!(db.get_score(&RecordKey::new("u1", "a.pdf")).unwrap().is_some());
}

#[test]
fn test_delete_score_missing_is_noop() {
    let (_dir, db) = test_db();
    let outcome = db.delete_score(&RecordKey::new("u1", "a.pdf"), "u1").unwrap();
    assert_eq!(outcome, DeleteOutcome::Missing);
}

#[test]
fn test_delete_last_score_removes_owner_entry() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("solo", "only.pdf", "")).unwrap();
    db.delete_score(&RecordKey::new("solo", "only.pdf"), "solo")
        .unwrap();

    assert!(db.get_scores_by_owner("solo").unwrap().is_empty());
}

#[test]
fn test_create_account_once_per_email() {
    let (_dir, db) = test_db();
    let account = AccountRecord {
        user_id: "u1".to_string(),
        email: "user@x.com".to_string(),
        secret_hash: vec![1, 2, 3],
        salt: vec![4, 5, 6],
        iterations: 1_000,
        created_at: Utc::now(),
    };

    assert!(db.create_account(&account).unwrap());
    let mut duplicate = account.clone();
    duplicate.user_id = "u2".to_string();
    assert!(!db.create_account(&duplicate).unwrap());

    let stored = db.get_account("user@x.com").unwrap().unwrap();
    assert_eq!(stored.user_id, "u1");
}

#[test]
fn test_sessions() {
    let (_dir, db) = test_db();
    let session = SessionRecord {
        user_id: "u1".to_string(),
        email: "user@x.com".to_string(),
        created_at: Utc::now(),
    };
    db.put_session("token-1", &session).unwrap();

    assert_eq!(db.get_session("token-1").unwrap().unwrap().user_id, "u1");
    assert!(db.delete_session("token-1").unwrap());
    assert!(!db.delete_session("token-1").unwrap());
    assert!(db.get_session("token-1").unwrap().is_none());
}

#[test]
fn test_purge_all() {
    let (_dir, db) = test_db();
    db.put_score(&sample_score("u1", "a.pdf", "")).unwrap();
    db.put_score(&sample_score("u2", "b.pdf", "")).unwrap();
    db.put_session(
        "t",
        &SessionRecord {
            user_id: "u1".to_string(),
            email: "user@x.com".to_string(),
            created_at: Utc::now(),
        },
    )
    .unwrap();

    let stats = db.purge_all().unwrap();
    assert_eq!(stats.scores, 2);
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.accounts, 0);

    assert!(db.get_all_scores().unwrap().is_empty());
    assert!(db.get_scores_by_owner("u1").unwrap().is_empty());
    assert!(db.get_session("t").unwrap().is_none());
}

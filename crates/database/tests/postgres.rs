//! Integration tests against a real Postgres server with pgvector.
//!
//! These tests require `TEST_DATABASE_URL` pointing at a disposable database
//! on a server where the `vector` extension is installable.
//!
//! Run them with:
//!   TEST_DATABASE_URL=postgres://... cargo test -p database --test postgres -- --ignored

use database::schema::EMBEDDING_DIMENSIONS;
use database::{
    citation, document, message, thread, Database, DatabaseError, NewDocument, NewMessage,
    NewThread,
};
use serde_json::json;
use std::env;
use tokio::sync::OnceCell;

/// Tests run in parallel; concurrent `CREATE EXTENSION` calls can collide.
static SCHEMA: OnceCell<()> = OnceCell::const_new();

async fn test_db() -> Database {
    let url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let db = Database::connect(&url).await.unwrap();
    SCHEMA
        .get_or_init(|| async {
            db.initialize_schema().await.unwrap();
        })
        .await;
    db
}

fn owner() -> String {
    format!("owner-{}", uuid_suffix())
}

fn uuid_suffix() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
        .to_string()
}

fn embedding(hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; EMBEDDING_DIMENSIONS];
    v[hot] = 1.0;
    v
}

#[tokio::test]
#[ignore]
async fn test_schema_initialization_is_idempotent() {
    let db = test_db().await;

    // test_db already brought the schema up to date.
    let applied = db.initialize_schema().await.unwrap();
    assert_eq!(applied, 0);
}

#[tokio::test]
#[ignore]
async fn test_thread_and_message_lifecycle() {
    let db = test_db().await;
    let user = owner();

    let created = thread::create_thread(
        db.pool(),
        &NewThread::new(&user, "Research").with_persona("Analyst", "You are precise."),
    )
    .await
    .unwrap();
    assert_eq!(created.persona_message, "You are precise.");

    for (role, content) in [("user", "first"), ("assistant", "second"), ("user", "third")] {
        message::create_message(
            db.pool(),
            &NewMessage {
                chat_thread_id: created.id.clone(),
                user_id: user.clone(),
                role: role.to_string(),
                content: content.to_string(),
                multi_modal_image: None,
            },
        )
        .await
        .unwrap();
    }

    let history = message::list_messages(db.pool(), &user, &created.id).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);

    thread::touch_thread(db.pool(), &user, &created.id).await.unwrap();

    // Another owner cannot see the thread.
    let other = thread::get_thread(db.pool(), "someone-else", &created.id).await;
    assert!(matches!(other, Err(DatabaseError::NotFound { .. })));

    thread::soft_delete_thread(db.pool(), &user, &created.id).await.unwrap();
    let gone = thread::get_thread(db.pool(), &user, &created.id).await;
    assert!(matches!(gone, Err(DatabaseError::NotFound { .. })));
    assert!(message::list_messages(db.pool(), &user, &created.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[ignore]
async fn test_citation_round_trip_is_owner_scoped() {
    let db = test_db().await;
    let user = owner();
    let content = json!({"score": 0.9, "document": {"pageContent": "text"}});

    let created = citation::create_citation(db.pool(), &user, &content).await.unwrap();
    let found = citation::find_citation(db.pool(), &user, &created.id).await.unwrap();
    assert_eq!(found.content, content);

    let missing = citation::find_citation(db.pool(), "intruder", &created.id).await;
    assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
}

#[tokio::test]
#[ignore]
async fn test_vector_search_filters_by_source() {
    let db = test_db().await;
    let user = owner();
    let thread_id = format!("thread-{}", uuid_suffix());

    for (hot, admin) in [(0, false), (1, false), (0, true)] {
        document::insert_document(
            db.pool(),
            &NewDocument {
                page_content: format!("chunk {} admin={}", hot, admin),
                metadata: json!({"fileName": "notes.md"}),
                embedding: embedding(hot),
                user_id: user.clone(),
                chat_thread_id: if admin { None } else { Some(thread_id.clone()) },
                is_admin_kb: admin,
            },
        )
        .await
        .unwrap();
    }

    let user_hits = document::search_user_documents(db.pool(), &embedding(0), &user, &thread_id, 5)
        .await
        .unwrap();
    assert_eq!(user_hits.len(), 2);
    assert!(user_hits.iter().all(|d| !d.is_admin_kb));
    assert_eq!(user_hits[0].page_content, "chunk 0 admin=false");
    assert!(user_hits[0].score > user_hits[1].score);

    let admin_hits = document::search_admin_documents(db.pool(), &embedding(0), 5)
        .await
        .unwrap();
    assert!(admin_hits.iter().all(|d| d.is_admin_kb));

    assert_eq!(
        document::count_thread_documents(db.pool(), &user, &thread_id).await.unwrap(),
        2
    );
}

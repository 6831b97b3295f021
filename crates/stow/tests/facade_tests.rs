//! End-to-end use of the facade on a native host

use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use stow::{Connection, IndexOptions, Key, MemoryEngine, StoreOptions, StowError, Upgrade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    title: String,
    done: bool,
}

fn schema(upgrade: &Upgrade<'_, MemoryEngine>) -> stow::Result<()> {
    upgrade.create_store("tasks", StoreOptions::new().key_path("id").auto_increment(true))?;
    upgrade.create_index("tasks", "by_done", "done", IndexOptions::new())
}

#[tokio::test]
async fn test_task_list_session() {
    // Another test binary may already have installed a subscriber
    let _ = stow::tracing::try_init_with_filter("stow_core=debug");

    let mut conn = Connection::new(MemoryEngine::new());
    conn.open_with_upgrade("tasks", 1, schema).await.unwrap();

    let first = conn
        .add("tasks", &serde_json::json!({"title": "write docs", "done": false}))
        .await
        .unwrap();
    assert_eq!(first, Key::from(1));

    // The generated key is written back into the record at the key path
    let stored: Option<serde_json::Value> = conn.get("tasks", first.clone()).await.unwrap();
    assert_eq!(
        stored,
        Some(serde_json::json!({"title": "write docs", "done": false, "id": 1}))
    );

    let task: Option<Task> = conn.get("tasks", first).await.unwrap();
    assert_eq!(
        task,
        Some(Task {
            title: "write docs".into(),
            done: false,
        })
    );

    conn.close();
    assert!(matches!(conn.count("tasks").await, Err(StowError::NotOpen)));
}

#[test]
fn test_try_init_twice() {
    let _ = stow::tracing::try_init_with_filter("info");
    assert!(stow::tracing::try_init_with_filter("info").is_err());
}

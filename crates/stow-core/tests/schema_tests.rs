//! Schema upgrade tests: store/index declaration and the upgrade window

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;
use stow_core::{
    Connection, IndexOptions, Key, MemoryEngine, StoreOptions, StowError, Upgrade,
};

/// Upgrade logic written to be re-run safely at every version
fn idempotent_schema(upgrade: &Upgrade<'_, MemoryEngine>) -> stow_core::Result<()> {
    upgrade.create_store("users", StoreOptions::new().key_path("id"))?;
    upgrade.create_index("users", "by_email", "email", IndexOptions::new().unique(true))?;
    upgrade.create_index("users", "by_tag", "tags", IndexOptions::new().multi_entry(true))?;
    Ok(())
}

async fn open_users(conn: &mut Connection<MemoryEngine>) {
    conn.open_with_upgrade("test", 1, idempotent_schema)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_index_outside_upgrade() {
    let mut conn = Connection::new(MemoryEngine::new());
    open_users(&mut conn).await;

    // Store exists
    let result = conn.create_index("users", "by_name", "name", IndexOptions::new());
    assert!(matches!(
        result,
        Err(StowError::IndexCreationOutsideUpgrade { .. })
    ));

    // Store does not exist
    let result = conn.create_index("ghosts", "by_name", "name", IndexOptions::new());
    assert!(matches!(
        result,
        Err(StowError::IndexCreationOutsideUpgrade { .. })
    ));

    // Even re-declaring an existing index is refused outside the window
    let result = conn.create_index("users", "by_email", "email", IndexOptions::new());
    assert!(matches!(
        result,
        Err(StowError::IndexCreationOutsideUpgrade { .. })
    ));
}

#[tokio::test]
async fn test_create_store_outside_upgrade() {
    let mut conn = Connection::new(MemoryEngine::new());
    open_users(&mut conn).await;

    // Existing store: no-op
    conn.create_store("users", StoreOptions::new()).unwrap();

    // New store: the engine refuses structural changes
    match conn.create_store("posts", StoreOptions::new()) {
        Err(StowError::CreateStoreFailed(msg)) => assert!(msg.starts_with("InvalidStateError")),
        other => panic!("expected CreateStoreFailed, got {:?}", other),
    }
    assert_eq!(conn.store_names().unwrap(), vec!["users"]);
}

#[tokio::test]
async fn test_create_index_on_missing_store() {
    let mut conn = Connection::new(MemoryEngine::new());
    let seen = Rc::new(RefCell::new(None));
    let seen_in_upgrade = seen.clone();

    let result = conn
        .open_with_upgrade("test", 1, move |upgrade| {
            let result = upgrade.create_index("ghosts", "by_name", "name", IndexOptions::new());
            let failed = matches!(&result, Err(StowError::StoreNotFound(store)) if store == "ghosts");
            *seen_in_upgrade.borrow_mut() = Some(failed);
            result
        })
        .await;

    assert_eq!(*seen.borrow(), Some(true));
    match result {
        Err(StowError::OpenFailed(msg)) => assert!(msg.contains("'ghosts' not found")),
        other => panic!("expected OpenFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redeclared_store_keeps_first_configuration() {
    let mut conn = Connection::new(MemoryEngine::new());
    conn.open_with_upgrade("test", 1, |upgrade| {
        upgrade.create_store("users", StoreOptions::new().key_path("id"))?;
        upgrade.create_store("users", StoreOptions::new().key_path("email").auto_increment(true))
    })
    .await
    .unwrap();

    let key = conn
        .put("users", &json!({"id": "u1", "email": "a@example.com"}))
        .await
        .unwrap();
    assert_eq!(key, Key::from("u1"));

    // No key generator was configured by the second declaration
    assert!(conn.put("users", &json!({"email": "b@example.com"})).await.is_err());
}

#[tokio::test]
async fn test_redeclared_index_keeps_first_configuration() {
    let mut conn = Connection::new(MemoryEngine::new());
    conn.open_with_upgrade("test", 1, |upgrade| {
        idempotent_schema(upgrade)?;
        upgrade.create_index("users", "by_email", "email", IndexOptions::new())
    })
    .await
    .unwrap();

    conn.add("users", &json!({"id": "1", "email": "a@example.com"}))
        .await
        .unwrap();
    let result = conn
        .add("users", &json!({"id": "2", "email": "a@example.com"}))
        .await;
    match result {
        Err(StowError::AddFailed(msg)) => assert!(msg.starts_with("ConstraintError")),
        other => panic!("expected AddFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upgrade_runs_only_when_version_increases() {
    let engine = MemoryEngine::new();
    let runs = Rc::new(RefCell::new(Vec::new()));

    for version in [1, 1, 2, 2, 5] {
        let runs_in_upgrade = runs.clone();
        let mut conn = Connection::new(engine.clone());
        conn.open_with_upgrade("test", version, move |upgrade| {
            runs_in_upgrade
                .borrow_mut()
                .push((upgrade.old_version(), upgrade.new_version()));
            idempotent_schema(upgrade)
        })
        .await
        .unwrap();
    }

    assert_eq!(*runs.borrow(), vec![(0, 1), (1, 2), (2, 5)]);
}

#[tokio::test]
async fn test_upgrade_adds_to_existing_schema() {
    let engine = MemoryEngine::new();
    let mut conn = Connection::new(engine.clone());
    open_users(&mut conn).await;
    conn.put("users", &json!({"id": "1", "email": "a@example.com"}))
        .await
        .unwrap();
    conn.close();

    let indexes = Rc::new(RefCell::new(Vec::new()));
    let indexes_in_upgrade = indexes.clone();
    conn.open_with_upgrade("test", 2, move |upgrade| {
        idempotent_schema(upgrade)?;
        upgrade.create_store("posts", StoreOptions::new().auto_increment(true))?;
        *indexes_in_upgrade.borrow_mut() = upgrade.index_names("users")?;
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(*indexes.borrow(), vec!["by_email", "by_tag"]);
    assert_eq!(conn.store_names().unwrap(), vec!["posts", "users"]);
    assert_eq!(conn.count("users").await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_store_during_upgrade() {
    let mut conn = Connection::new(MemoryEngine::new());
    open_users(&mut conn).await;
    conn.put("users", &json!({"id": "1"})).await.unwrap();
    conn.close();

    conn.open_with_upgrade("test", 2, |upgrade| {
        upgrade.delete_store("users")?;
        upgrade.delete_store("never-existed")?;
        upgrade.create_store("users", StoreOptions::new().key_path("uid"))
    })
    .await
    .unwrap();

    assert_eq!(conn.count("users").await.unwrap(), 0);
    let key = conn.put("users", &json!({"uid": 9})).await.unwrap();
    assert_eq!(key, Key::from(9));
}

#[tokio::test]
async fn test_upgrade_sees_its_own_declarations() {
    let mut conn = Connection::new(MemoryEngine::new());
    let observed = Rc::new(RefCell::new(Vec::new()));
    let observed_in_upgrade = observed.clone();

    conn.open_with_upgrade("test", 1, move |upgrade| {
        observed_in_upgrade.borrow_mut().push(upgrade.has_store("users"));
        upgrade.create_store("users", StoreOptions::new())?;
        observed_in_upgrade.borrow_mut().push(upgrade.has_store("users"));
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(*observed.borrow(), vec![false, true]);
}

#[tokio::test]
async fn test_index_names_of_missing_store() {
    let mut conn = Connection::new(MemoryEngine::new());
    let result = conn
        .open_with_upgrade("test", 1, |upgrade| upgrade.index_names("ghosts").map(|_| ()))
        .await;
    assert!(matches!(result, Err(StowError::OpenFailed(_))));
}

#[tokio::test]
async fn test_engine_rejects_declaration_during_upgrade() {
    let mut conn = Connection::new(MemoryEngine::new());
    let seen = Rc::new(RefCell::new(None));
    let seen_in_upgrade = seen.clone();

    let result = conn
        .open_with_upgrade("test", 1, move |upgrade| {
            let result =
                upgrade.create_store("broken", StoreOptions::new().key_path("").auto_increment(true));
            *seen_in_upgrade.borrow_mut() = Some(match &result {
                Err(StowError::CreateStoreFailed(msg)) => msg.clone(),
                other => format!("{:?}", other),
            });
            result
        })
        .await;

    let seen = seen.borrow().clone().unwrap_or_default();
    assert!(seen.starts_with("InvalidAccessError"), "got {}", seen);
    assert!(matches!(result, Err(StowError::OpenFailed(_))));
    assert!(!conn.is_open());
}

#[tokio::test]
async fn test_create_store_outside_upgrade_leaves_engine_untouched() {
    let engine = MemoryEngine::new();
    let mut conn = Connection::new(engine.clone());
    open_users(&mut conn).await;

    assert!(matches!(
        conn.create_store("posts", StoreOptions::new()),
        Err(StowError::CreateStoreFailed(_))
    ));

    // A later connection sees the schema unchanged
    let mut other = Connection::new(engine);
    other.open("test", 1).await.unwrap();
    assert_eq!(other.store_names().unwrap(), vec!["users"]);
}

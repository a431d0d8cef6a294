//! Per-database isolation and per-task current-database selection.

use dbscope::db::{Crud, DatabaseManager, DbContext};
use dbscope::error::DbError;
use dbscope::fields;
use dbscope::models::{User, example_schema};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

const DATABASES: [&str; 3] = ["default", "analytics", "logs"];

async fn setup(dir: &TempDir) -> Arc<DatabaseManager> {
    let databases: BTreeMap<String, String> = DATABASES
        .iter()
        .map(|name| {
            let path = dir.path().join(format!("{name}.db"));
            (name.to_string(), format!("sqlite://{}", path.display()))
        })
        .collect();
    let manager = Arc::new(DatabaseManager::new());
    manager
        .initialize(&databases, None, Some(&example_schema()))
        .await
        .unwrap();
    manager
}

async fn names_in(ctx: &DbContext, database: &str) -> Vec<String> {
    let users = ctx
        .session_scope(Some(database), |session| {
            Box::pin(async move { User::get_all_default(session).await })
        })
        .await
        .unwrap();
    users.into_iter().map(|u| u.name).collect()
}

#[tokio::test]
async fn test_same_user_in_every_database_is_isolated() {
    let dir = TempDir::new().unwrap();
    let manager = setup(&dir).await;
    let mut ctx = manager.context();

    for (i, name) in DATABASES.iter().enumerate() {
        let email = format!("test@{name}.example");
        let age = 20 + i as i64;
        ctx.transactional(Some(name), None, move |session| {
            Box::pin(async move {
                User::create(
                    session,
                    fields! { "name" => "TestUser", "email" => email, "age" => age },
                )
                .await
            })
        })
        .await
        .unwrap();
    }

    for (i, name) in DATABASES.iter().enumerate() {
        let users = ctx
            .with_db_session(Some(name), |session| {
                Box::pin(async move {
                    User::filter(session, fields! { "name" => "TestUser" }).await
                })
            })
            .await
            .unwrap();
        assert_eq!(users.len(), 1, "database {name}");
        assert_eq!(users[0].age, Some(20 + i as i64));
        assert_eq!(users[0].email, Some(format!("test@{name}.example")));
    }
}

#[tokio::test]
async fn test_failed_transaction_only_affects_its_database() {
    let dir = TempDir::new().unwrap();
    let manager = setup(&dir).await;
    let mut ctx = manager.context();

    ctx.transactional(Some("logs"), None, |session| {
        Box::pin(async move { User::create(session, fields! { "name" => "Logged" }).await })
    })
    .await
    .unwrap();

    let result: Result<(), DbError> = ctx
        .transactional(Some("analytics"), None, |session| {
            Box::pin(async move {
                User::create(session, fields! { "name" => "Lost" }).await?;
                Err(DbError::invalid_input("abort"))
            })
        })
        .await;
    assert!(result.is_err());

    assert_eq!(names_in(&ctx, "logs").await, vec!["Logged".to_string()]);
    assert!(names_in(&ctx, "analytics").await.is_empty());
    assert!(names_in(&ctx, "default").await.is_empty());
}

#[tokio::test]
async fn test_cloned_contexts_select_independently() {
    let dir = TempDir::new().unwrap();
    let manager = setup(&dir).await;
    let ctx = manager.context();

    let mut handles = Vec::new();
    for name in ["analytics", "logs"] {
        let mut task_ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            task_ctx.set_current(name).await.unwrap();
            tokio::task::yield_now().await;
            let current = task_ctx.current().to_string();
            task_ctx
                .transactional(None, None, move |session| {
                    Box::pin(async move {
                        User::create(session, fields! { "name" => current }).await
                    })
                })
                .await
                .unwrap();
            task_ctx.current().to_string()
        }));
    }

    let mut seen = Vec::new();
    for handle in handles {
        seen.push(handle.await.unwrap());
    }
    assert_eq!(seen, vec!["analytics".to_string(), "logs".to_string()]);
    assert_eq!(ctx.current(), "default");

    assert_eq!(names_in(&ctx, "analytics").await, vec!["analytics".to_string()]);
    assert_eq!(names_in(&ctx, "logs").await, vec!["logs".to_string()]);
    assert!(names_in(&ctx, "default").await.is_empty());
}

#[tokio::test]
async fn test_registry_lists_every_database() {
    let dir = TempDir::new().unwrap();
    let manager = setup(&dir).await;

    assert_eq!(manager.count().await, 3);
    assert_eq!(manager.names().await, vec!["analytics", "default", "logs"]);
    for summary in manager.list().await {
        assert!(summary.url.starts_with("sqlite:"));
    }

    manager.close_all().await;
    assert_eq!(manager.count().await, 0);
}

async fn shared_sqlite(dir: &TempDir) -> Arc<DatabaseManager> {
    let manager = Arc::new(DatabaseManager::new());
    let url = format!(
        "sqlite://{}?acquire_timeout=2",
        dir.path().join("shared.db").display()
    );
    manager.register("default", &url).await.unwrap();
    manager
        .create_tables("default", &example_schema())
        .await
        .unwrap();
    manager
}

#[tokio::test]
async fn test_two_open_sessions_on_one_sqlite_database() {
    let dir = TempDir::new().unwrap();
    let manager = shared_sqlite(&dir).await;

    let mut writer = manager.session("default").await.unwrap();
    let mut reader = manager.session("default").await.unwrap();
    assert_eq!(manager.open_sessions(), 2);

    User::create(&mut writer, fields! { "name" => "Shared" })
        .await
        .unwrap();
    writer.commit().await.unwrap();
    assert_eq!(User::count(&mut reader).await.unwrap(), 1);

    writer.close().await.unwrap();
    reader.close().await.unwrap();
    assert_eq!(manager.open_sessions(), 0);
}

#[tokio::test]
async fn test_concurrent_writers_on_one_sqlite_database() {
    let dir = TempDir::new().unwrap();
    let manager = shared_sqlite(&dir).await;

    let mut handles = Vec::new();
    for name in ["first", "second"] {
        let mut ctx = manager.context();
        handles.push(tokio::spawn(async move {
            ctx.transactional(None, None, move |session| {
                Box::pin(async move { User::create(session, fields! { "name" => name }).await })
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let ctx = manager.context();
    let mut names = names_in(&ctx, "default").await;
    names.sort();
    assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
}

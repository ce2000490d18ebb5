//! Postgres store tests. Require `DATABASE_URL`; run with `--ignored`.

use std::time::Duration;

use chrono::Utc;
use shortreel_core::stage::{ProjectStatus, Stage};
use shortreel_db::{CreateProject, Lease, PgProjectStore, Project, ProjectStore, StoreError};
use sqlx::PgPool;

const TTL: Duration = Duration::from_secs(1800);

fn project() -> Project {
    Project::new(
        CreateProject {
            channel_id: "history".to_string(),
            theme: "Silk road".to_string(),
            reference_source: None,
        },
        Utc::now(),
    )
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn upsert_and_read_back(pool: PgPool) {
    let store = PgProjectStore::new(pool);
    let mut p = project();
    store.put(&p).await.unwrap();

    p.current_stage = Stage::Script;
    p.title = "Caravans".to_string();
    p.stage_data
        .insert_raw(Stage::Reference, serde_json::json!({"source": "x"}));
    store.put(&p).await.unwrap();

    let stored = store.get(p.id).await.unwrap().unwrap();
    assert_eq!(stored.current_stage, Stage::Script);
    assert_eq!(stored.title, "Caravans");
    assert!(stored.stage_data.contains(Stage::Reference));
    assert_eq!(store.list().await.unwrap().len(), 1);
    assert!(store.delete(p.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn lease_is_compare_and_swap(pool: PgPool) {
    let store = PgProjectStore::new(pool);
    let p = project();
    store.put(&p).await.unwrap();

    let lease = Lease::new(Utc::now());
    let leased = store.try_acquire_lease(p.id, lease, TTL).await.unwrap().unwrap();
    assert_eq!(leased.status, ProjectStatus::Processing);
    assert!(store
        .try_acquire_lease(p.id, Lease::new(Utc::now()), TTL)
        .await
        .unwrap()
        .is_none());

    let mut done = leased.clone();
    done.lease = None;
    done.status = ProjectStatus::Ready;
    assert!(matches!(
        store.put_leased(&done, uuid::Uuid::new_v4()).await,
        Err(StoreError::LeaseLost(_))
    ));
    store.put_leased(&done, lease.token).await.unwrap();
    assert_eq!(store.get(p.id).await.unwrap().unwrap().lease, None);
}

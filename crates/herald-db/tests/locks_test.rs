//! Integration tests for named deployment locks.
//!
//! These tests need PostgreSQL (a testcontainers container, or the server
//! at `HERALD_TEST_PG_URL`). Run with `cargo test -- --ignored`.

use std::time::Duration;

use uuid::Uuid;

use herald_db::queries::locks;
use herald_test_utils::{create_test_db, drop_test_db};

const LONG: Duration = Duration::from_secs(3600);

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn second_acquire_is_refused_until_release() {
    let (pool, db_name) = create_test_db().await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    assert!(locks::try_acquire_lock(&pool, "deploy_plan_a", first, LONG).await.unwrap());
    assert!(!locks::try_acquire_lock(&pool, "deploy_plan_a", second, LONG).await.unwrap());
    // Not re-entrant, even for the holder.
    assert!(!locks::try_acquire_lock(&pool, "deploy_plan_a", first, LONG).await.unwrap());

    // Other names are independent.
    assert!(locks::try_acquire_lock(&pool, "deploy_plan_b", second, LONG).await.unwrap());

    assert!(locks::release_lock(&pool, "deploy_plan_a", first).await.unwrap());
    assert!(locks::get_lock(&pool, "deploy_plan_a").await.unwrap().is_none());
    assert!(locks::try_acquire_lock(&pool, "deploy_plan_a", second, LONG).await.unwrap());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn release_by_non_owner_is_a_no_op() {
    let (pool, db_name) = create_test_db().await;
    let owner = Uuid::new_v4();

    assert!(locks::try_acquire_lock(&pool, "deploy_plan_a", owner, LONG).await.unwrap());
    assert!(!locks::release_lock(&pool, "deploy_plan_a", Uuid::new_v4()).await.unwrap());

    let held = locks::get_lock(&pool, "deploy_plan_a").await.unwrap().unwrap();
    assert_eq!(held.owner, owner);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn expired_lock_can_be_taken_over() {
    let (pool, db_name) = create_test_db().await;
    let stale = Uuid::new_v4();
    let fresh = Uuid::new_v4();

    assert!(
        locks::try_acquire_lock(&pool, "deploy_plan_a", stale, Duration::from_millis(10))
            .await
            .unwrap()
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(locks::try_acquire_lock(&pool, "deploy_plan_a", fresh, LONG).await.unwrap());
    let held = locks::get_lock(&pool, "deploy_plan_a").await.unwrap().unwrap();
    assert_eq!(held.owner, fresh);

    pool.close().await;
    drop_test_db(&db_name).await;
}

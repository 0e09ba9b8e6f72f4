//! Integration tests for the order mutation service: atomic updates,
//! status transitions with timestamp side effects, version monotonicity,
//! and batch partial success.

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use sqlx::PgPool;

use lastmile_core::error::CoreError;
use lastmile_core::locking::LOCK_TIMEOUT_SECS;
use lastmile_core::roles::Role;
use lastmile_core::status::{OrderKind, OrderStatus};
use lastmile_core::types::{DbId, Timestamp};
use lastmile_db::error::MutationError;
use lastmile_db::models::order::{CreateOrder, UpdateOrder};
use lastmile_db::repositories::{LockRepo, LockTable, OrderRepo};

const ALICE: DbId = 1;
const BOB: DbId = 2;

fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_756_000_000 + secs, 0).unwrap()
}

fn sample_order(order_no: &str) -> CreateOrder {
    CreateOrder {
        order_no: order_no.to_string(),
        kind: OrderKind::Delivery,
        department: "CS".to_string(),
        warehouse: "SEOUL".to_string(),
        sla: "D+1".to_string(),
        eta: ts(86_400),
        postal_code: "04524".to_string(),
        address: "100 Sejong-daero".to_string(),
        customer: "Acme Logistics".to_string(),
        contact: None,
        remark: None,
    }
}

async fn seed_order(pool: &PgPool, order_no: &str) -> DbId {
    OrderRepo::create(pool, &sample_order(order_no), ALICE, ts(0))
        .await
        .unwrap()
        .id
}

fn status_change(status: OrderStatus) -> UpdateOrder {
    UpdateOrder {
        status: Some(status),
        ..UpdateOrder::default()
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_forces_waiting_and_version_one(pool: PgPool) {
    let order = OrderRepo::create(&pool, &sample_order("ORD-1"), ALICE, ts(0))
        .await
        .unwrap();
    assert_eq!(order.status, "WAITING");
    assert_eq!(order.version, 1);
    assert!(!order.is_locked);
    assert_eq!(order.locked_by, None);
    assert_eq!(order.depart_time, None);
    assert_eq!(order.complete_time, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_applies_fields_and_bumps_version(pool: PgPool) {
    let id = seed_order(&pool, "ORD-2").await;

    let changes = UpdateOrder {
        customer: Some("New Customer".to_string()),
        remark: Some("call before delivery".to_string()),
        ..UpdateOrder::default()
    };
    let updated = OrderRepo::update_record(
        &pool,
        id,
        &changes,
        BOB,
        Role::User,
        ts(100),
        LOCK_TIMEOUT_SECS,
    )
    .await
    .unwrap();

    assert_eq!(updated.order.customer, "New Customer");
    assert_eq!(updated.order.remark.as_deref(), Some("call before delivery"));
    assert_eq!(updated.order.version, 2);
    assert_eq!(updated.order.update_by, Some(BOB));
    assert_eq!(updated.order.update_at, Some(ts(100)));
    assert!(updated.version_warning.is_none());
    // Lock released after the update.
    assert!(!updated.order.is_locked);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_version_monotonic_over_sequence(pool: PgPool) {
    let id = seed_order(&pool, "ORD-3").await;

    for i in 0..5 {
        let changes = UpdateOrder {
            remark: Some(format!("edit {i}")),
            ..UpdateOrder::default()
        };
        OrderRepo::update_record(
            &pool,
            id,
            &changes,
            ALICE,
            Role::User,
            ts(10 + i),
            LOCK_TIMEOUT_SECS,
        )
        .await
        .unwrap();
    }

    let order = OrderRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(order.version, 6);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_scenario_locked_update_departs_and_unlocks(pool: PgPool) {
    let id = seed_order(&pool, "ORD-42").await;

    // Actor holds the edit lock, then submits the update.
    LockRepo::acquire(&pool, LockTable::Orders, id, ALICE, ts(5), LOCK_TIMEOUT_SECS)
        .await
        .unwrap();
    let updated = OrderRepo::update_record(
        &pool,
        id,
        &status_change(OrderStatus::InProgress),
        ALICE,
        Role::User,
        ts(30),
        LOCK_TIMEOUT_SECS,
    )
    .await
    .unwrap();

    assert_eq!(updated.order.status, "IN_PROGRESS");
    assert_eq!(updated.order.depart_time, Some(ts(30)));
    assert_eq!(updated.order.version, 2);
    assert!(!updated.order.is_locked);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_invalid_transition_rejects_whole_update(pool: PgPool) {
    let id = seed_order(&pool, "ORD-4").await;

    // Disallowed status jump bundled with an otherwise valid field change.
    let changes = UpdateOrder {
        status: Some(OrderStatus::Complete),
        customer: Some("Should Not Apply".to_string()),
        ..UpdateOrder::default()
    };
    let err = OrderRepo::update_record(
        &pool,
        id,
        &changes,
        ALICE,
        Role::User,
        ts(10),
        LOCK_TIMEOUT_SECS,
    )
    .await
    .unwrap_err();
    assert_matches!(err, MutationError::Domain(CoreError::InvalidTransition { .. }));

    let order = OrderRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(order.customer, "Acme Logistics");
    assert_eq!(order.status, "WAITING");
    assert_eq!(order.version, 1);
    assert!(!order.is_locked);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_version_mismatch_warns_but_applies(pool: PgPool) {
    let id = seed_order(&pool, "ORD-5").await;

    // Two committed edits bring the version to 3.
    for i in 0..2 {
        let changes = UpdateOrder {
            remark: Some(format!("edit {i}")),
            ..UpdateOrder::default()
        };
        OrderRepo::update_record(&pool, id, &changes, BOB, Role::User, ts(i), LOCK_TIMEOUT_SECS)
            .await
            .unwrap();
    }

    // A client that last read version 2 submits anyway.
    let changes = UpdateOrder {
        remark: Some("late edit".to_string()),
        expected_version: Some(2),
        ..UpdateOrder::default()
    };
    let updated = OrderRepo::update_record(
        &pool,
        id,
        &changes,
        ALICE,
        Role::User,
        ts(50),
        LOCK_TIMEOUT_SECS,
    )
    .await
    .unwrap();

    assert_eq!(updated.order.version, 4);
    assert_eq!(updated.order.remark.as_deref(), Some("late edit"));
    let warning = updated.version_warning.expect("mismatch should be surfaced");
    assert_eq!(warning.expected, 2);
    assert_eq!(warning.actual, 3);
    assert_eq!(warning.updated_by, Some(BOB));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_change_status_batch_partial_success(pool: PgPool) {
    let a = seed_order(&pool, "ORD-6").await;
    let b = seed_order(&pool, "ORD-7").await;
    // Move b forward so COMPLETE is reachable for it but not for a.
    OrderRepo::change_status(
        &pool,
        &[b],
        OrderStatus::InProgress,
        ALICE,
        Role::User,
        ts(1),
        LOCK_TIMEOUT_SECS,
    )
    .await;

    let results = OrderRepo::change_status(
        &pool,
        &[a, b, 9999],
        OrderStatus::Complete,
        ALICE,
        Role::User,
        ts(10),
        LOCK_TIMEOUT_SECS,
    )
    .await;

    assert_eq!(results.len(), 3);
    assert!(!results[0].ok, "WAITING -> COMPLETE must fail");
    assert!(results[1].ok);
    assert_eq!(results[1].old_status.as_deref(), Some("IN_PROGRESS"));
    assert_eq!(results[1].new_status.as_deref(), Some("COMPLETE"));
    assert!(!results[2].ok, "missing row must fail");

    let a_row = OrderRepo::find_by_id(&pool, a).await.unwrap().unwrap();
    assert_eq!(a_row.status, "WAITING");
    let b_row = OrderRepo::find_by_id(&pool, b).await.unwrap().unwrap();
    assert_eq!(b_row.status, "COMPLETE");
    assert_eq!(b_row.complete_time, Some(ts(10)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_change_status_same_status_noop(pool: PgPool) {
    let id = seed_order(&pool, "ORD-8").await;

    let results = OrderRepo::change_status(
        &pool,
        &[id],
        OrderStatus::Waiting,
        ALICE,
        Role::User,
        ts(10),
        LOCK_TIMEOUT_SECS,
    )
    .await;
    assert!(results[0].ok);

    let order = OrderRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(order.version, 1, "no-op must not bump the version");
    assert!(!order.is_locked, "no-op must not leave a lock behind");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_admin_rollback_clears_complete_time(pool: PgPool) {
    let id = seed_order(&pool, "ORD-9").await;
    OrderRepo::change_status(
        &pool,
        &[id],
        OrderStatus::InProgress,
        ALICE,
        Role::User,
        ts(10),
        LOCK_TIMEOUT_SECS,
    )
    .await;
    OrderRepo::change_status(
        &pool,
        &[id],
        OrderStatus::Complete,
        ALICE,
        Role::User,
        ts(20),
        LOCK_TIMEOUT_SECS,
    )
    .await;

    // Non-admin may not reopen.
    let results = OrderRepo::change_status(
        &pool,
        &[id],
        OrderStatus::InProgress,
        BOB,
        Role::User,
        ts(30),
        LOCK_TIMEOUT_SECS,
    )
    .await;
    assert!(!results[0].ok);

    let results = OrderRepo::change_status(
        &pool,
        &[id],
        OrderStatus::InProgress,
        BOB,
        Role::Admin,
        ts(30),
        LOCK_TIMEOUT_SECS,
    )
    .await;
    assert!(results[0].ok);

    let order = OrderRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(order.status, "IN_PROGRESS");
    assert_eq!(order.depart_time, Some(ts(10)), "depart_time survives reopen");
    assert_eq!(order.complete_time, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_assign_driver_bumps_version_and_unlocks(pool: PgPool) {
    let id = seed_order(&pool, "ORD-10").await;

    let results = OrderRepo::assign_driver(
        &pool,
        &[id],
        "Kim Driver",
        Some("010-1234-5678"),
        ALICE,
        ts(10),
        LOCK_TIMEOUT_SECS,
    )
    .await;
    assert!(results[0].ok);

    let order = OrderRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(order.driver_name.as_deref(), Some("Kim Driver"));
    assert_eq!(order.driver_contact.as_deref(), Some("010-1234-5678"));
    assert_eq!(order.version, 2);
    assert!(!order.is_locked);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_is_admin_only_and_lock_checked(pool: PgPool) {
    let id = seed_order(&pool, "ORD-11").await;

    let err = OrderRepo::delete(&pool, &[id], ALICE, Role::User, ts(5), LOCK_TIMEOUT_SECS)
        .await
        .unwrap_err();
    assert_matches!(err, MutationError::Domain(CoreError::Forbidden(_)));

    // Someone is editing: the delete fails for that row.
    LockRepo::acquire(&pool, LockTable::Orders, id, BOB, ts(5), LOCK_TIMEOUT_SECS)
        .await
        .unwrap();
    let results = OrderRepo::delete(&pool, &[id], ALICE, Role::Admin, ts(10), LOCK_TIMEOUT_SECS)
        .await
        .unwrap();
    assert!(!results[0].ok);
    assert!(OrderRepo::find_by_id(&pool, id).await.unwrap().is_some());

    // After release the admin delete goes through.
    LockRepo::release(&pool, LockTable::Orders, id, BOB, ts(20), LOCK_TIMEOUT_SECS)
        .await
        .unwrap();
    let results = OrderRepo::delete(&pool, &[id], ALICE, Role::Admin, ts(30), LOCK_TIMEOUT_SECS)
        .await
        .unwrap();
    assert!(results[0].ok);
    assert!(OrderRepo::find_by_id(&pool, id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_filters_by_eta_range(pool: PgPool) {
    use lastmile_db::models::order::OrderListQuery;

    let mut input = sample_order("ORD-12");
    input.eta = ts(1_000);
    OrderRepo::create(&pool, &input, ALICE, ts(0)).await.unwrap();
    let mut input = sample_order("ORD-13");
    input.eta = ts(500_000);
    OrderRepo::create(&pool, &input, ALICE, ts(0)).await.unwrap();

    let filter = OrderListQuery {
        eta_from: Some(ts(0)),
        eta_to: Some(ts(10_000)),
        ..OrderListQuery::default()
    };
    let (orders, total) = OrderRepo::list(&pool, &filter).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].order_no, "ORD-12");

    let filter = OrderListQuery {
        order_no: Some("ORD-13".to_string()),
        ..OrderListQuery::default()
    };
    let (orders, total) = OrderRepo::list(&pool, &filter).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].order_no, "ORD-13");
}

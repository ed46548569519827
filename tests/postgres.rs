//! Runs against the database named by `DATABASE_URL`; skipped when unset.

mod common;

use std::sync::Arc;

use sqlx::PgPool;

use rollcall::db::{LedgerStore, PgStore};
use rollcall::engine::Engine;
use rollcall::models::event::attendance::AttendanceStatus::{Absent, Present};
use rollcall::models::user::User;
use rollcall::util::generate_token;

async fn connect() -> Option<(PgPool, Arc<PgStore>)> {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;
    let store = PgStore::connect(&url).await.unwrap();
    let pool = PgPool::connect(&url).await.unwrap();

    Some((pool, Arc::new(store)))
}

async fn add_user(pool: &PgPool, store: &PgStore, role: &str) -> User {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (name, email, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(format!("Test {}", role))
    .bind(format!("{}@example.com", generate_token()))
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap();

    store.user_with_id(id).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn marks_move_balances_by_their_delta() {
    let Some((pool, store)) = connect().await else {
        return;
    };
    let admin = add_user(&pool, &store, "admin").await;
    let student = add_user(&pool, &store, "student").await;
    let engine = Engine::new(store.clone() as Arc<dyn LedgerStore>);

    let mut events = Vec::new();
    for _ in 0..8 {
        events.push(
            engine
                .create_event(&admin, common::new_event(10))
                .await
                .unwrap(),
        );
    }

    let marks: Vec<_> = events
        .iter()
        .map(|event| {
            let (engine, admin) = (engine.clone(), admin.clone());
            let (event_id, student_id) = (event.id, student.id);
            tokio::spawn(async move {
                engine
                    .mark_attendance(&admin, event_id, student_id, Present)
                    .await
            })
        })
        .collect();
    for mark in marks {
        mark.await.unwrap().unwrap();
    }

    let reloaded = store.user_with_id(student.id).await.unwrap();
    assert_eq!(reloaded.points, 80);
    assert_eq!(reloaded.attendance_records.len(), 8);

    engine
        .mark_attendance(&admin, events[0].id, student.id, Absent)
        .await
        .unwrap();
    let reloaded = store.user_with_id(student.id).await.unwrap();
    assert_eq!(reloaded.points, 70);
    assert!(reloaded.log_entry_for(events[0].id).is_none());

    let event = store.event_with_id(events[0].id).await.unwrap();
    assert_eq!(event.attendance.len(), 1);
    assert_eq!(event.record_for(student.id).unwrap().points_awarded, 0);
}

#[tokio::test]
async fn registrations_keep_earlier_attendees() {
    let Some((pool, store)) = connect().await else {
        return;
    };
    let admin = add_user(&pool, &store, "admin").await;
    let first = add_user(&pool, &store, "student").await;
    let second = add_user(&pool, &store, "student").await;
    let engine = Engine::new(store.clone() as Arc<dyn LedgerStore>);
    let event = engine
        .create_event(&admin, common::new_event(10))
        .await
        .unwrap();

    engine
        .register_for_event(&first, event.id, first.id)
        .await
        .unwrap();
    engine
        .register_via_token(&second, &event.registration_token, second.id)
        .await
        .unwrap();

    let event = store.event_with_id(event.id).await.unwrap();
    let mut expected = vec![first.id, second.id];
    expected.sort_unstable();
    assert_eq!(event.attendee_ids(), expected);
}

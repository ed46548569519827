#![allow(dead_code)]

use std::sync::Arc;

use rollcall::db::{LedgerStore, MemoryStore};
use rollcall::engine::Engine;
use rollcall::models::event::{Event, NewEvent};
use rollcall::models::user::{Role, User};
use rollcall::models::DateScalar;
use time::macros::date;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const STUDENT_TOKEN: &str = "student-token";

pub struct Campus {
    pub store: Arc<MemoryStore>,
    pub engine: Engine,
    pub admin: User,
    pub coordinator: User,
    pub students: Vec<User>,
}

impl Campus {
    pub async fn new(student_count: usize) -> Self {
        let store = Arc::new(MemoryStore::new());
        let admin = store
            .add_user("Grace Admin", "admin@example.com", Role::Admin)
            .await
            .unwrap();
        let coordinator = store
            .add_user("Cora Coordinator", "coordinator@example.com", Role::Coordinator)
            .await
            .unwrap();

        let mut students = Vec::with_capacity(student_count);
        for n in 0..student_count {
            let student = store
                .add_user(
                    &format!("Student {}", n),
                    &format!("student{}@example.com", n),
                    Role::Student,
                )
                .await
                .unwrap();
            students.push(student);
        }

        store.add_session(ADMIN_TOKEN, admin.id).await.unwrap();
        if let Some(student) = students.first() {
            store.add_session(STUDENT_TOKEN, student.id).await.unwrap();
        }

        let engine = Engine::new(store.clone() as Arc<dyn LedgerStore>);

        Self {
            store,
            engine,
            admin,
            coordinator,
            students,
        }
    }

    pub async fn event(&self, points_per_event: i64) -> Event {
        self.engine
            .create_event(&self.admin, new_event(points_per_event))
            .await
            .unwrap()
    }

    pub async fn points_of(&self, student: &User) -> i64 {
        self.store.user_with_id(student.id).await.unwrap().points
    }

    pub async fn reload(&self, student: &User) -> User {
        self.store.user_with_id(student.id).await.unwrap()
    }
}

pub fn new_event(points_per_event: i64) -> NewEvent {
    NewEvent {
        activity_id: 1,
        title: "Park Cleanup".to_owned(),
        description: Some("Bring gloves".to_owned()),
        category: Some("volunteering".to_owned()),
        date: DateScalar(date!(2024 - 04 - 20)),
        time: Some("9:00 AM".to_owned()),
        location: Some("Riverside Park".to_owned()),
        capacity: None,
        points_per_event: Some(points_per_event),
    }
}

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

use crate::db::LedgerStore;
use crate::error::{RollcallError, RollcallResult};
use crate::models::event::attendance::{AttendanceRecord, Marking};
use crate::models::event::{Event, EventDraft};
use crate::models::user::{AttendanceLogEntry, User};
use crate::models::{ActivityId, EventId, UserId};

const EVENT_COLUMNS: &str = "id, activity_id, title, description, category, date, \
     start_time, location, capacity, points_per_event, status, registration_token";

#[derive(FromRow)]
struct EventRow {
    id: i64,
    activity_id: i64,
    title: String,
    description: String,
    category: Option<String>,
    date: Date,
    start_time: Option<String>,
    location: String,
    capacity: Option<i32>,
    points_per_event: i64,
    status: String,
    registration_token: String,
}

#[derive(FromRow)]
struct AttendanceRow {
    student_id: i64,
    status: String,
    marked_at: OffsetDateTime,
    points_awarded: i64,
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    role: String,
    points: i64,
}

#[derive(FromRow)]
struct LogRow {
    event_id: i64,
    activity_id: i64,
    date: OffsetDateTime,
    points_earned: i64,
}

fn parse_column<T: FromStr<Err = String>>(value: &str) -> RollcallResult<T> {
    value.parse().map_err(RollcallError::Internal)
}

/// Keeps the ledger in PostgreSQL, applying `migrations/` on connect.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> RollcallResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|err| RollcallError::Internal(format!("failed to migrate: {}", err)))?;

        Ok(Self { pool })
    }

    async fn load_event(&self, row: EventRow) -> RollcallResult<Event> {
        let attendees: HashSet<UserId> = sqlx::query_scalar::<_, i64>(
            "SELECT student_id FROM event_attendees WHERE event_id = $1",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        let attendance_rows: Vec<AttendanceRow> = sqlx::query_as(
            "SELECT student_id, status, marked_at, points_awarded
             FROM attendance WHERE event_id = $1",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        let mut attendance = HashMap::with_capacity(attendance_rows.len());
        for record in attendance_rows {
            attendance.insert(
                record.student_id,
                AttendanceRecord {
                    student_id: record.student_id,
                    status: parse_column(&record.status)?,
                    points_awarded: record.points_awarded,
                    marked_at: record.marked_at,
                },
            );
        }

        Ok(Event {
            id: row.id,
            activity_id: row.activity_id,
            title: row.title,
            description: row.description,
            category: row.category,
            time: row.start_time,
            location: row.location,
            capacity: row.capacity,
            points_per_event: row.points_per_event,
            status: parse_column(&row.status)?,
            registration_token: row.registration_token,
            date: row.date,
            attendees,
            attendance,
        })
    }

    async fn load_user(&self, row: UserRow) -> RollcallResult<User> {
        let log: Vec<LogRow> = sqlx::query_as(
            "SELECT event_id, activity_id, date, points_earned
             FROM attendance_records WHERE user_id = $1 ORDER BY seq",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            role: parse_column(&row.role)?,
            points: row.points,
            attendance_records: log
                .into_iter()
                .map(|entry| AttendanceLogEntry {
                    event_id: entry.event_id,
                    activity_id: entry.activity_id,
                    points_earned: entry.points_earned,
                    date: entry.date,
                })
                .collect(),
        })
    }
}

async fn write_event(conn: &mut PgConnection, event: &Event) -> RollcallResult<()> {
    let updated = sqlx::query(
        "UPDATE events SET activity_id = $1, title = $2, description = $3, category = $4,
             date = $5, start_time = $6, location = $7, capacity = $8, points_per_event = $9,
             status = $10
         WHERE id = $11",
    )
    .bind(event.activity_id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.category)
    .bind(event.date)
    .bind(&event.time)
    .bind(&event.location)
    .bind(event.capacity)
    .bind(event.points_per_event)
    .bind(event.status.as_str())
    .bind(event.id)
    .execute(&mut *conn)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(RollcallError::NotFound("Event not found".to_owned()));
    }

    // attendees and attendance are never removed, so upserting every row
    // in one statement per table brings the stored event level
    sqlx::query(
        "INSERT INTO event_attendees (event_id, student_id)
         SELECT $1, student_id FROM UNNEST($2::BIGINT[]) AS attendee (student_id)
         ON CONFLICT (event_id, student_id) DO NOTHING",
    )
    .bind(event.id)
    .bind(event.attendee_ids())
    .execute(&mut *conn)
    .await?;

    let records = event.attendance_records();
    sqlx::query(
        "INSERT INTO attendance (event_id, student_id, status, marked_at, points_awarded)
         SELECT $1, record.student_id, record.status, record.marked_at, record.points_awarded
         FROM UNNEST($2::BIGINT[], $3::TEXT[], $4::TIMESTAMPTZ[], $5::BIGINT[])
             AS record (student_id, status, marked_at, points_awarded)
         ON CONFLICT (event_id, student_id) DO UPDATE
         SET status = EXCLUDED.status, marked_at = EXCLUDED.marked_at,
             points_awarded = EXCLUDED.points_awarded",
    )
    .bind(event.id)
    .bind(records.iter().map(|r| r.student_id).collect::<Vec<_>>())
    .bind(
        records
            .iter()
            .map(|r| r.status.as_str().to_owned())
            .collect::<Vec<String>>(),
    )
    .bind(records.iter().map(|r| r.marked_at).collect::<Vec<_>>())
    .bind(records.iter().map(|r| r.points_awarded).collect::<Vec<_>>())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn update_event_status(conn: &mut PgConnection, event: &Event) -> RollcallResult<()> {
    let updated = sqlx::query("UPDATE events SET status = $1 WHERE id = $2")
        .bind(event.status.as_str())
        .bind(event.id)
        .execute(&mut *conn)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(RollcallError::NotFound("Event not found".to_owned()));
    }

    Ok(())
}

async fn upsert_attendance(
    conn: &mut PgConnection,
    event_id: EventId,
    record: &AttendanceRecord,
) -> RollcallResult<()> {
    sqlx::query(
        "INSERT INTO attendance (event_id, student_id, status, marked_at, points_awarded)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (event_id, student_id) DO UPDATE
         SET status = EXCLUDED.status, marked_at = EXCLUDED.marked_at,
             points_awarded = EXCLUDED.points_awarded",
    )
    .bind(event_id)
    .bind(record.student_id)
    .bind(record.status.as_str())
    .bind(record.marked_at)
    .bind(record.points_awarded)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Applies a mark's point delta to the stored balance rather than
/// overwriting it, so marks committed by other processes are kept.
async fn adjust_balance(
    conn: &mut PgConnection,
    student: &User,
    event: &Event,
    marking: &Marking,
) -> RollcallResult<()> {
    let balance: Option<i64> = sqlx::query_scalar(
        "UPDATE users SET points = GREATEST(points + $1, 0) WHERE id = $2 RETURNING points",
    )
    .bind(marking.points_delta)
    .bind(student.id)
    .fetch_optional(&mut *conn)
    .await?;
    if balance.is_none() {
        return Err(RollcallError::NotFound("User not found".to_owned()));
    }

    if marking.points_delta > 0 {
        if let Some(entry) = student.log_entry_for(event.id) {
            sqlx::query(
                "INSERT INTO attendance_records
                     (user_id, seq, event_id, activity_id, date, points_earned)
                 SELECT $1, COALESCE(MAX(seq) + 1, 0), $2, $3, $4, $5
                 FROM attendance_records WHERE user_id = $1
                 ON CONFLICT (user_id, event_id) DO NOTHING",
            )
            .bind(student.id)
            .bind(entry.event_id)
            .bind(entry.activity_id)
            .bind(entry.date)
            .bind(entry.points_earned)
            .execute(&mut *conn)
            .await?;
        }
    } else if marking.points_delta < 0 {
        sqlx::query("DELETE FROM attendance_records WHERE user_id = $1 AND event_id = $2")
            .bind(student.id)
            .bind(event.id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn write_user(conn: &mut PgConnection, user: &User) -> RollcallResult<()> {
    let updated = sqlx::query("UPDATE users SET points = $1 WHERE id = $2")
        .bind(user.points)
        .bind(user.id)
        .execute(&mut *conn)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(RollcallError::NotFound("User not found".to_owned()));
    }

    sqlx::query("DELETE FROM attendance_records WHERE user_id = $1")
        .bind(user.id)
        .execute(&mut *conn)
        .await?;
    for (position, entry) in user.attendance_records.iter().enumerate() {
        sqlx::query(
            "INSERT INTO attendance_records
                 (user_id, seq, event_id, activity_id, date, points_earned)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(position as i32)
        .bind(entry.event_id)
        .bind(entry.activity_id)
        .bind(entry.date)
        .bind(entry.points_earned)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn event_with_id_opt(&self, id: EventId) -> RollcallResult<Option<Event>> {
        let row: Option<EventRow> =
            sqlx::query_as(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => self.load_event(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn event_with_token_opt(&self, token: &str) -> RollcallResult<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(&format!(
            "SELECT {} FROM events WHERE registration_token = $1",
            EVENT_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.load_event(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn events(&self, activity_id: Option<ActivityId>) -> RollcallResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {} FROM events WHERE $1::BIGINT IS NULL OR activity_id = $1
             ORDER BY date, id",
            EVENT_COLUMNS
        ))
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(self.load_event(row).await?);
        }

        Ok(events)
    }

    async fn create_event(&self, draft: EventDraft) -> RollcallResult<Event> {
        let id: EventId = sqlx::query_scalar(
            "INSERT INTO events
                 (activity_id, title, description, category, date, start_time, location,
                  capacity, points_per_event, registration_token)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING id",
        )
        .bind(draft.activity_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.category)
        .bind(draft.date)
        .bind(&draft.time)
        .bind(&draft.location)
        .bind(draft.capacity)
        .bind(draft.points_per_event)
        .bind(&draft.registration_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(draft.into_event(id))
    }

    async fn save_event(&self, event: &Event) -> RollcallResult<()> {
        let mut tx = self.pool.begin().await?;
        write_event(&mut *tx, event).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn user_with_id_opt(&self, id: UserId) -> RollcallResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, email, role, points FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => self.load_user(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn user_for_session_opt(&self, token: &str) -> RollcallResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, role, points FROM users
             WHERE id = (SELECT user_id FROM sessions WHERE token = $1)",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.load_user(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn save_user(&self, user: &User) -> RollcallResult<()> {
        let mut tx = self.pool.begin().await?;
        write_user(&mut *tx, user).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Writes one mark in a single transaction: the student's balance moves
    /// by the mark's delta and only the marked attendance row is touched.
    async fn commit_marking(
        &self,
        student: &User,
        event: &Event,
        marking: &Marking,
    ) -> RollcallResult<()> {
        let record = event.record_for(student.id).ok_or_else(|| {
            RollcallError::Internal("marked student has no attendance record".to_owned())
        })?;

        let mut tx = self.pool.begin().await?;
        // lock the user row so concurrent marks apply one after another
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(student.id)
            .execute(&mut *tx)
            .await?;
        adjust_balance(&mut *tx, student, event, marking).await?;
        upsert_attendance(&mut *tx, event.id, record).await?;
        update_event_status(&mut *tx, event).await?;
        tx.commit().await?;

        Ok(())
    }
}

mod common;

use rollcall::error::RollcallError;
use rollcall::models::event::attendance::AttendanceStatus;
use rollcall::models::event::EventUpdate;

use common::Campus;

#[tokio::test]
async fn students_register_once() {
    let campus = Campus::new(1).await;
    let event = campus.event(10).await;
    let student = &campus.students[0];

    let outcome = campus
        .engine
        .register_for_event(student, event.id, student.id)
        .await
        .unwrap();
    assert_eq!(outcome.message, "Registered for event");
    assert_eq!(outcome.event.attendee_ids(), vec![student.id]);

    let again = campus
        .engine
        .register_for_event(student, event.id, student.id)
        .await;
    assert!(matches!(
        again,
        Err(RollcallError::Rejected(message)) if message == "Already registered"
    ));
    assert_eq!(campus.engine.event(event.id).await.unwrap().attendees.len(), 1);
}

#[tokio::test]
async fn completed_events_turn_registrations_away() {
    let campus = Campus::new(2).await;
    let event = campus.event(10).await;
    let (first, second) = (&campus.students[0], &campus.students[1]);

    campus
        .engine
        .mark_attendance(&campus.admin, event.id, first.id, AttendanceStatus::Absent)
        .await
        .unwrap();

    let result = campus
        .engine
        .register_for_event(second, event.id, second.id)
        .await;
    match result {
        Err(err @ RollcallError::Rejected(_)) => {
            assert_eq!(err.status().as_u16(), 400);
            assert!(err.to_string().contains("completed event"));
        }
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn full_events_turn_registrations_away() {
    let campus = Campus::new(2).await;
    let event = campus.event(10).await;
    campus
        .engine
        .update_event(
            &campus.admin,
            event.id,
            EventUpdate {
                capacity: Some(1),
                ..EventUpdate::default()
            },
        )
        .await
        .unwrap();
    let (first, second) = (&campus.students[0], &campus.students[1]);

    campus
        .engine
        .register_for_event(first, event.id, first.id)
        .await
        .unwrap();
    let result = campus
        .engine
        .register_for_event(second, event.id, second.id)
        .await;

    assert!(matches!(
        result,
        Err(RollcallError::Rejected(message)) if message == "Event is at capacity"
    ));
}

#[tokio::test]
async fn tokens_register_like_ids() {
    let campus = Campus::new(1).await;
    let event = campus.event(10).await;
    let student = &campus.students[0];

    let outcome = campus
        .engine
        .register_via_token(student, &event.registration_token, student.id)
        .await
        .unwrap();
    assert_eq!(
        outcome.message,
        "Successfully registered via registration token"
    );
    assert_eq!(outcome.event.id, event.id);
    assert!(outcome.event.attendees.contains(&student.id));

    let again = campus
        .engine
        .register_via_token(student, &event.registration_token, student.id)
        .await;
    assert!(matches!(again, Err(RollcallError::Rejected(_))));
}

#[tokio::test]
async fn unknown_tokens_are_not_found() {
    let campus = Campus::new(1).await;
    campus.event(10).await;
    let student = &campus.students[0];

    let result = campus
        .engine
        .register_via_token(student, "not-a-token", student.id)
        .await;

    assert!(matches!(
        result,
        Err(RollcallError::NotFound(message)) if message == "Invalid registration token"
    ));
}

#[tokio::test]
async fn students_only_register_themselves() {
    let campus = Campus::new(2).await;
    let event = campus.event(10).await;
    let (first, second) = (&campus.students[0], &campus.students[1]);

    let result = campus
        .engine
        .register_for_event(first, event.id, second.id)
        .await;
    assert!(matches!(result, Err(RollcallError::Forbidden(_))));

    campus
        .engine
        .register_for_event(&campus.coordinator, event.id, second.id)
        .await
        .unwrap();
    assert_eq!(
        campus.engine.event(event.id).await.unwrap().attendee_ids(),
        vec![second.id]
    );
}

#[tokio::test]
async fn registering_is_separate_from_attendance() {
    let campus = Campus::new(1).await;
    let event = campus.event(10).await;
    let student = &campus.students[0];

    campus
        .engine
        .mark_attendance(&campus.admin, event.id, student.id, AttendanceStatus::Present)
        .await
        .unwrap();

    let event = campus.engine.event(event.id).await.unwrap();
    assert!(event.attendees.is_empty());
    assert_eq!(event.attendance.len(), 1);
    assert_eq!(campus.points_of(student).await, 10);
}

#[tokio::test]
async fn points_lock_once_attendance_is_taken() {
    let campus = Campus::new(1).await;
    let event = campus.event(10).await;
    let student = &campus.students[0];
    let raise_points = || EventUpdate {
        points_per_event: Some(20),
        ..EventUpdate::default()
    };

    let updated = campus
        .engine
        .update_event(&campus.admin, event.id, raise_points())
        .await
        .unwrap();
    assert_eq!(updated.points_per_event, 20);

    campus
        .engine
        .mark_attendance(&campus.admin, event.id, student.id, AttendanceStatus::Present)
        .await
        .unwrap();
    let result = campus
        .engine
        .update_event(
            &campus.admin,
            event.id,
            EventUpdate {
                points_per_event: Some(30),
                ..EventUpdate::default()
            },
        )
        .await;

    assert!(matches!(result, Err(RollcallError::Rejected(_))));
    assert_eq!(campus.points_of(student).await, 20);
    assert!(matches!(
        campus
            .engine
            .update_event(student, event.id, raise_points())
            .await,
        Err(RollcallError::Forbidden(_))
    ));
}

//! HTTP surface: the GraphQL endpoint plus plain JSON routes for the
//! attendance and registration calls.
//!
//! Callers authenticate with a session token in the `ROLLCALL_TOKEN` header.

use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::engine::{AttendanceOutcome, Engine, RegistrationOutcome};
use crate::error::{RollcallError, RollcallResult};
use crate::graphql::{build_schema, RollcallSchema};
use crate::models::event::attendance::AttendanceStatus;
use crate::models::user::User;
use crate::models::{EventId, UserId};

pub const ROLLCALL_TOKEN: &str = "ROLLCALL_TOKEN";
const GRAPHQL_PATH: &str = "/graphql";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceForm {
    pub student_id: UserId,
    pub status: AttendanceStatus,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    /// Defaults to the caller
    pub student_id: Option<UserId>,
}

pub fn router(engine: Engine) -> Router {
    let schema = build_schema(engine.clone());

    Router::new()
        .route(GRAPHQL_PATH, get(playground).post(graphql))
        .route("/events/:id/attendance", post(mark_attendance))
        .route("/events/:id/register", post(register_for_event))
        .route("/registrations/:token", post(register_via_token))
        .layer(Extension(engine))
        .layer(Extension(schema))
}

async fn graphql(
    Extension(schema): Extension<RollcallSchema>,
    Extension(engine): Extension<Engine>,
    headers: HeaderMap,
    Json(request): Json<async_graphql::Request>,
) -> RollcallResult<Json<async_graphql::Response>> {
    let request = if let Some(token) = get_token(&headers)? {
        request.data(engine.caller_for_token(token).await?)
    } else {
        request
    };

    Ok(Json(schema.execute(request).await))
}

async fn playground() -> Html<String> {
    Html(playground_source(GraphQLPlaygroundConfig::new(GRAPHQL_PATH)))
}

async fn mark_attendance(
    Extension(engine): Extension<Engine>,
    Path(event_id): Path<EventId>,
    headers: HeaderMap,
    form: Result<Json<AttendanceForm>, JsonRejection>,
) -> RollcallResult<Json<AttendanceOutcome>> {
    let caller = caller(&engine, &headers).await?;
    let Json(form) =
        form.map_err(|rejection| RollcallError::BadRequest(rejection.to_string()))?;

    engine
        .mark_attendance(&caller, event_id, form.student_id, form.status)
        .await
        .map(Json)
}

async fn register_for_event(
    Extension(engine): Extension<Engine>,
    Path(event_id): Path<EventId>,
    headers: HeaderMap,
    body: Bytes,
) -> RollcallResult<Json<RegistrationOutcome>> {
    let caller = caller(&engine, &headers).await?;
    let form = registration_form(&body)?;

    engine
        .register_for_event(&caller, event_id, form.student_id.unwrap_or(caller.id))
        .await
        .map(Json)
}

async fn register_via_token(
    Extension(engine): Extension<Engine>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> RollcallResult<Json<RegistrationOutcome>> {
    let caller = caller(&engine, &headers).await?;
    let form = registration_form(&body)?;

    engine
        .register_via_token(&caller, &token, form.student_id.unwrap_or(caller.id))
        .await
        .map(Json)
}

/// An empty body registers the caller; anything else must be a valid form.
fn registration_form(body: &[u8]) -> RollcallResult<RegistrationForm> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RegistrationForm::default());
    }

    serde_json::from_slice(body)
        .map_err(|err| RollcallError::BadRequest(format!("Invalid registration form: {}", err)))
}

async fn caller(engine: &Engine, headers: &HeaderMap) -> RollcallResult<User> {
    let token = get_token(headers)?.ok_or(RollcallError::Unauthorized)?;
    engine.caller_for_token(token).await
}

fn get_token(headers: &HeaderMap) -> RollcallResult<Option<&str>> {
    headers
        .get(ROLLCALL_TOKEN)
        .map(|value| {
            value.to_str().map_err(|_err| {
                RollcallError::BadRequest(format!("{} header must be ASCII", ROLLCALL_TOKEN))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::registration_form;
    use crate::error::RollcallError;

    #[test]
    fn empty_registration_bodies_mean_the_caller() {
        assert_eq!(registration_form(b"").unwrap().student_id, None);
        assert_eq!(registration_form(b"  \n").unwrap().student_id, None);
        assert_eq!(
            registration_form(br#"{"studentId": 4}"#).unwrap().student_id,
            Some(4)
        );
        assert_eq!(registration_form(b"{}").unwrap().student_id, None);
    }

    #[test]
    fn malformed_registration_bodies_are_bad_requests() {
        assert!(matches!(
            registration_form(br#"{"studentId": "not-a-number"}"#),
            Err(RollcallError::BadRequest(_))
        ));
        assert!(matches!(
            registration_form(b"student=4"),
            Err(RollcallError::BadRequest(_))
        ));
    }
}

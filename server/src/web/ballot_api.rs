use std::collections::HashMap;

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DbError};
use diesel::SqliteConnection;
use serde::Serialize;
use tracing::info;
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::reply::{self, Reply, Response};

use crate::error::{self, CastError, WebError};
use crate::voting::{self, Ballot, Id, Submission, UnvalidatedSubmission, User};
use super::db::{models, schema};
use super::poll_api::get_internal as get_poll;
use super::templates::{self, DetailTemplate};
use super::{blocking, login_redirect, see_other, AppState};

enum Outcome {
    Recorded(Id, Ballot),
    Refused(CastError),
}

#[derive(Serialize)]
struct StoredBallot {
    id: Id,
    #[serde(flatten)]
    ballot: Ballot,
}

/// Form submission from the poll detail page.
pub async fn vote(
    poll_id: i32,
    state: AppState,
    user: Option<User>,
    form: HashMap<String, String>,
) -> Result<Response, Rejection> {
    blocking(move || vote_internal(Id(poll_id), &state, user.as_ref(), &form)).await
}

/// JSON submission with explicit `(choice_id, selected)` pairs.
pub async fn submit(
    poll_id: i32,
    state: AppState,
    user: Option<User>,
    submission: UnvalidatedSubmission,
) -> Result<Response, Rejection> {
    blocking(move || submit_internal(Id(poll_id), &state, user.as_ref(), submission)).await
}

fn vote_internal(
    poll_id: Id,
    state: &AppState,
    user: Option<&User>,
    form: &HashMap<String, String>,
) -> Result<Response, WebError> {
    let mut conn = state.db.connection()?;
    let poll = get_poll(&mut conn, poll_id)?;
    let submission = UnvalidatedSubmission::from_form(form, &poll);

    match cast(&mut conn, &poll, user, submission)? {
        Outcome::Recorded(..) => Ok(see_other(format!("/polls/{}/results", poll.id))),
        Outcome::Refused(CastError::LoginRequired) => {
            Ok(login_redirect(&state.config, &format!("/polls/{}", poll.id)))
        }
        Outcome::Refused(refusal @ CastError::AlreadyVoted) => {
            let message = refusal.to_string();
            // 409 rather than the old 200 re-render, so clients can tell a refused ballot apart
            templates::render(
                &DetailTemplate { user, poll: &poll, error_message: Some(message.as_str()) },
                StatusCode::CONFLICT,
            )
        }
    }
}

fn submit_internal(
    poll_id: Id,
    state: &AppState,
    user: Option<&User>,
    submission: UnvalidatedSubmission,
) -> Result<Response, WebError> {
    let mut conn = state.db.connection()?;
    let poll = get_poll(&mut conn, poll_id)?;

    match cast(&mut conn, &poll, user, submission)? {
        Outcome::Recorded(id, ballot) => {
            let stored = StoredBallot { id, ballot };
            Ok(reply::with_status(reply::json(&stored), StatusCode::CREATED).into_response())
        }
        Outcome::Refused(refusal) => Err(refusal.into()),
    }
}

/// Validates the submission against the poll, applies its voting policy and
/// records the ballot. A second ballot from the same user on a registered-only
/// poll is refused by the unique index on `(poll_id, user_id)`.
fn cast(
    conn: &mut SqliteConnection,
    poll: &voting::Poll,
    user: Option<&User>,
    submission: UnvalidatedSubmission,
) -> Result<Outcome, WebError> {
    let submission = Submission::try_from((submission, poll))?;

    let ballot = match Ballot::cast(poll, user, submission) {
        Ok(ballot) => ballot,
        Err(refusal) => return Ok(Outcome::Refused(refusal)),
    };

    match store(conn, &ballot) {
        Ok(id) => {
            info!(poll = %poll.id, ballot = id, approvals = ballot.approved.len(), "Ballot recorded");
            Ok(Outcome::Recorded(Id(id), ballot))
        }
        Err(DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            info!(poll = %poll.id, voter = ?ballot.voter_id, "Refused repeat ballot");
            Ok(Outcome::Refused(CastError::AlreadyVoted))
        }
        Err(e) => Err(error::db_write(e, "ballot")),
    }
}

fn store(conn: &mut SqliteConnection, ballot: &Ballot) -> Result<i32, DbError> {
    conn.transaction(|conn| {
        let ballot_id: i32 = diesel::insert_into(schema::ballots::table)
            .values(&models::NewBallot::from(ballot))
            .returning(schema::ballots::id)
            .get_result(conn)?;

        let votes: Vec<models::NewVote> = ballot.approved.iter()
            .map(|choice| models::NewVote { ballot_id, choice_id: choice.0 })
            .collect();
        if !votes.is_empty() {
            diesel::insert_into(schema::votes::table)
                .values(&votes)
                .execute(conn)?;
        }

        Ok(ballot_id)
    })
}

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::SqliteConnection;
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::reply::{self, Reply, Response};

use crate::error::{self, WebError};
use crate::voting::{self, Id, PollResult, User};
use super::db::schema;
use super::poll_api::get_published;
use super::{blocking, AppState};
use super::templates::{self, ResultsTemplate};

pub async fn results_page(poll_id: i32, state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    blocking(move || results_internal(Id(poll_id), &state, user.as_ref())).await
}

pub async fn get_result(poll_id: i32, state: AppState) -> Result<Response, Rejection> {
    blocking(move || get_result_internal(Id(poll_id), &state)).await
}

fn results_internal(poll_id: Id, state: &AppState, user: Option<&User>) -> Result<Response, WebError> {
    let mut conn = state.db.connection()?;
    let poll = get_published(&mut conn, poll_id)?;
    let result = load(&mut conn, &poll)?;

    templates::render(&ResultsTemplate { user, poll: &poll, result: &result }, StatusCode::OK)
}

fn get_result_internal(poll_id: Id, state: &AppState) -> Result<Response, WebError> {
    let mut conn = state.db.connection()?;
    let poll = get_published(&mut conn, poll_id)?;
    let result = load(&mut conn, &poll)?;

    Ok(reply::json(&result).into_response())
}

fn load(conn: &mut SqliteConnection, poll: &voting::Poll) -> Result<PollResult, WebError> {
    let ballot_count: i64 = schema::ballots::table
        .filter(schema::ballots::poll_id.eq(poll.id.0))
        .count()
        .get_result(conn)
        .map_err(|e| error::db_get(e, "poll", Some("ballots")))?;

    let counts: Vec<(i32, i64)> = schema::votes::table
        .inner_join(schema::ballots::table)
        .filter(schema::ballots::poll_id.eq(poll.id.0))
        .group_by(schema::votes::choice_id)
        .select((schema::votes::choice_id, count_star()))
        .load(conn)
        .map_err(|e| error::db_get(e, "poll", Some("votes")))?;

    let votes: Vec<(Id, i64)> = counts.into_iter()
        .map(|(choice_id, count)| (Id(choice_id), count))
        .collect();

    Ok(PollResult::evaluate(poll, ballot_count, &votes))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use warp::test::request;

    use super::*;
    use crate::voting::VotingType;
    use crate::web::testing::{body, TestApp};

    async fn vote(app: &TestApp, poll: &voting::Poll, fields: &str) {
        let res = request()
            .method("POST")
            .path(&format!("/polls/{}/vote", poll.id))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(fields.to_string())
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn results_count_approvals_per_choice() {
        let app = TestApp::new();
        let (owner, _) = app.seed_user("owner");
        let poll = app.seed_poll(&owner, "Lunch?", &["Pizza", "Tacos", "Sushi"], VotingType::Unrestricted,
            Utc::now() - Duration::minutes(1));

        vote(&app, &poll, "choice1=on&choice2=on").await;
        vote(&app, &poll, "choice2=on").await;
        vote(&app, &poll, "").await;
        vote(&app, &poll, "choice2=on&choice3=on").await;

        let mut conn = app.state.db.connection().unwrap();
        let result = load(&mut conn, &poll).unwrap();
        assert_eq!(result.ballot_count, 4);
        let votes: Vec<i64> = result.tally.iter().map(|t| t.votes).collect();
        assert_eq!(votes, vec![1, 3, 1]);
        assert_eq!(result.tally[1].percent, 75.0);
        assert_eq!(result.leaders, vec![poll.choices[1].id]);
    }

    #[tokio::test]
    async fn results_ignore_other_polls() {
        let app = TestApp::new();
        let (owner, _) = app.seed_user("owner");
        let earlier = Utc::now() - Duration::minutes(1);
        let poll = app.seed_poll(&owner, "Lunch?", &["Pizza", "Tacos"], VotingType::Unrestricted, earlier);
        let other = app.seed_poll(&owner, "Dinner?", &["Soup", "Salad"], VotingType::Unrestricted, earlier);

        vote(&app, &other, "choice1=on&choice2=on").await;

        let mut conn = app.state.db.connection().unwrap();
        let result = load(&mut conn, &poll).unwrap();
        assert_eq!(result.ballot_count, 0);
        assert!(result.tally.iter().all(|t| t.votes == 0));
        assert!(result.leaders.is_empty());
    }

    #[tokio::test]
    async fn results_page_renders_tally() {
        let app = TestApp::new();
        let (owner, _) = app.seed_user("owner");
        let poll = app.seed_poll(&owner, "Lunch?", &["Pizza", "Tacos"], VotingType::Unrestricted,
            Utc::now() - Duration::minutes(1));
        vote(&app, &poll, "choice2=on").await;

        let res = request().path(&format!("/polls/{}/results", poll.id)).reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        assert!(html.contains("Tacos"));
        assert!(html.contains("100.0%"));
        assert!(html.contains("1 ballot(s) cast."));
        assert!(html.contains(r#"class="leader""#));
    }

    #[tokio::test]
    async fn json_results_hide_future_polls() {
        let app = TestApp::new();
        let (owner, _) = app.seed_user("owner");
        let live = app.seed_poll(&owner, "Now?", &["Yes", "No"], VotingType::RegisteredOnly,
            Utc::now() - Duration::minutes(1));
        let future = app.seed_poll(&owner, "Later?", &["Yes"], VotingType::Unrestricted,
            Utc::now() + Duration::days(1));

        let res = request().path(&format!("/api/polls/{}/results", live.id)).reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(json["poll_id"], serde_json::json!(live.id));
        assert_eq!(json["ballot_count"], 0);
        assert_eq!(json["tally"].as_array().map(Vec::len), Some(2));

        let res = request().path(&format!("/api/polls/{}/results", future.id)).reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = request().path(&format!("/polls/{}/results", future.id)).reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}

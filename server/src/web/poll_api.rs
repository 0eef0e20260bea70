use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DbError;
use diesel::sqlite::Sqlite;
use diesel::SqliteConnection;
use tracing::info;
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::reply::Response;

use crate::error::{self, ValidationError, WebError};
use crate::voting::{self, CreatePoll, Id, UnvalidatedCreatePoll, User};
use super::db::{models, schema};
use super::pagination::{Page, Paginator};
use super::templates::{self, CreateTemplate, DetailTemplate, EmbedTemplate, IndexTemplate};
use super::{blocking, login_redirect, respond, see_other, AppState, ListQuery};

pub async fn index(state: AppState, user: Option<User>, query: ListQuery) -> Result<Response, Rejection> {
    blocking(move || list(&state, user.as_ref(), None, "Latest polls", "/polls", query)).await
}

pub async fn my_polls(state: AppState, user: Option<User>, query: ListQuery) -> Result<Response, Rejection> {
    match user {
        Some(owner) => {
            blocking(move || list(&state, Some(&owner), Some(owner.id), "My polls", "/polls/mine", query)).await
        }
        None => Ok(login_redirect(&state.config, "/polls/mine")),
    }
}

pub async fn detail(id: i32, state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    blocking(move || detail_internal(Id(id), &state, user.as_ref())).await
}

pub fn create_form(state: AppState, user: Option<User>) -> Response {
    match user {
        Some(user) => respond(templates::render(&CreateTemplate {
            user: Some(&user),
            question: "",
            choices: choice_slots(&state, &[]),
            question_error: None,
            choice_error: None,
            poll_type_error: None,
        }, StatusCode::OK)),
        None => login_redirect(&state.config, "/polls/create"),
    }
}

pub async fn create(state: AppState, user: Option<User>, form: HashMap<String, String>) -> Result<Response, Rejection> {
    match user {
        Some(user) => {
            blocking(move || create_internal(&state, &user, UnvalidatedCreatePoll::from_form(&form))).await
        }
        None => Ok(login_redirect(&state.config, "/polls/create")),
    }
}

pub fn embed_instructions(id: i32, state: AppState, user: Option<User>, host: Option<String>) -> Response {
    let base = match (&state.config.public_url, host) {
        (Some(public_url), _) => public_url.clone(),
        (None, Some(host)) => format!("http://{host}"),
        (None, None) => format!("http://localhost:{}", state.config.port),
    };
    let link = format!("{base}/polls/{id}");

    respond(templates::render(&EmbedTemplate { user: user.as_ref(), link: &link }, StatusCode::OK))
}

/// Loads a poll and its choices, whether or not it is published yet.
pub fn get_internal(conn: &mut SqliteConnection, id: Id) -> Result<voting::Poll, WebError> {
    let db_poll: models::Poll = schema::polls::table
        .find(id.0)
        .select(models::Poll::as_select())
        .first(conn)
        .map_err(|e| match e {
            DbError::NotFound => WebError::not_found("poll", id),
            e => error::db_get(e, "poll", None),
        })?;

    let db_choices = models::Choice::belonging_to(&db_poll)
        .order(schema::choices::id.asc())
        .select(models::Choice::as_select())
        .load(conn)
        .map_err(|e| error::db_get(e, "choices", Some("poll")))?;

    voting::Poll::try_from((db_poll, db_choices))
        .map_err(|e| WebError::internal(format!("Poll {id} is misconfigured: {e}")))
}

/// Like [`get_internal`], but polls scheduled for the future do not exist yet.
pub fn get_published(conn: &mut SqliteConnection, id: Id) -> Result<voting::Poll, WebError> {
    let poll = get_internal(conn, id)?;
    if !poll.is_published(Utc::now()) {
        return Err(WebError::not_found("poll", id));
    }
    Ok(poll)
}

fn published(owner: Option<Id>, now: NaiveDateTime) -> schema::polls::BoxedQuery<'static, Sqlite> {
    let mut query = schema::polls::table
        .filter(schema::polls::pub_date.le(now))
        .into_boxed();
    if let Some(owner) = owner {
        query = query.filter(schema::polls::owner_id.eq(owner.0));
    }
    query
}

fn list_page(
    conn: &mut SqliteConnection,
    owner: Option<Id>,
    page_size: i64,
    requested: Option<&str>,
) -> Result<Page<models::PollSummary>, WebError> {
    let now = Utc::now().naive_utc();

    let count: i64 = published(owner, now)
        .count()
        .get_result(conn)
        .map_err(|e| error::db_get(e, "polls", None))?;

    let paginator = Paginator::new(page_size, count);
    let number = paginator.clamp(requested);

    let items = published(owner, now)
        .order((schema::polls::pub_date.desc(), schema::polls::id.desc()))
        .limit(paginator.per_page())
        .offset(paginator.offset(number))
        .select(models::PollSummary::as_select())
        .load(conn)
        .map_err(|e| error::db_get(e, "polls", None))?;

    Ok(Page { items, number, num_pages: paginator.num_pages() })
}

fn list(
    state: &AppState,
    user: Option<&User>,
    owner: Option<Id>,
    heading: &str,
    base_path: &str,
    query: ListQuery,
) -> Result<Response, WebError> {
    let mut conn = state.db.connection()?;
    let page = list_page(&mut conn, owner, state.config.page_size, query.page.as_deref())?;

    templates::render(&IndexTemplate {
        heading,
        base_path,
        user,
        latest_poll_list: page,
    }, StatusCode::OK)
}

fn detail_internal(id: Id, state: &AppState, user: Option<&User>) -> Result<Response, WebError> {
    let mut conn = state.db.connection()?;
    let poll = get_published(&mut conn, id)?;

    templates::render(&DetailTemplate { user, poll: &poll, error_message: None }, StatusCode::OK)
}

/// Values for the choice inputs of the creation form: what was entered,
/// padded with blanks to the configured number of slots.
fn choice_slots<'a>(state: &AppState, entered: &'a [String]) -> Vec<&'a str> {
    let mut choices: Vec<&str> = entered.iter().map(|c| c.trim()).collect();
    if choices.len() < state.config.choice_slots {
        choices.resize(state.config.choice_slots, "");
    }
    choices
}

fn create_internal(state: &AppState, user: &User, input: UnvalidatedCreatePoll) -> Result<Response, WebError> {
    let question = input.trimmed_question().to_string();
    let entered = input.choices.clone();
    let poll = match CreatePoll::try_from(input) {
        Ok(poll) => poll,
        Err(err) => return rejected_form(user, &question, choice_slots(state, &entered), err),
    };

    let mut conn = state.db.connection()?;
    let poll_id = insert_poll(&mut conn, user, &poll).map_err(|e| error::db_write(e, "poll"))?;

    info!(poll = poll_id, owner = %user.id, choices = poll.choices.len(), "Poll created");
    Ok(see_other(format!("/polls/{poll_id}/embed")))
}

/// Stores the poll with its choices, or nothing at all.
fn insert_poll(conn: &mut SqliteConnection, owner: &User, poll: &CreatePoll) -> Result<i32, DbError> {
    conn.transaction(|conn| {
        let poll_id: i32 = diesel::insert_into(schema::polls::table)
            .values(&models::NewPoll::from(owner, poll))
            .returning(schema::polls::id)
            .get_result(conn)?;

        let choices: Vec<models::NewChoice> = poll.choices.iter()
            .map(|text| models::NewChoice { poll_id, choice_text: text })
            .collect();
        diesel::insert_into(schema::choices::table)
            .values(&choices)
            .execute(conn)?;

        Ok(poll_id)
    })
}

fn rejected_form(user: &User, question: &str, choices: Vec<&str>, err: ValidationError) -> Result<Response, WebError> {
    let message = err.to_string();
    let mut template = CreateTemplate {
        user: Some(user),
        question,
        choices,
        question_error: None,
        choice_error: None,
        poll_type_error: None,
    };
    match err {
        ValidationError::QuestionMissing => template.question_error = Some(message.as_str()),
        ValidationError::ChoiceMissing => template.choice_error = Some(message.as_str()),
        _ => template.poll_type_error = Some("Choose a voting type"),
    }

    templates::render(&template, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use warp::http::header;
    use warp::test::request;

    use super::*;
    use crate::voting::VotingType;
    use crate::web::testing::{body, TestApp};

    #[tokio::test]
    async fn index_lists_published_polls_newest_first() {
        let app = TestApp::new();
        let (owner, _) = app.seed_user("owner");
        let now = Utc::now();
        app.seed_poll(&owner, "Older?", &["a"], VotingType::Unrestricted, now - Duration::hours(2));
        app.seed_poll(&owner, "Newer?", &["a"], VotingType::Unrestricted, now - Duration::hours(1));
        app.seed_poll(&owner, "Future?", &["a"], VotingType::Unrestricted, now + Duration::hours(1));

        let res = request().path("/polls").reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        let newer = html.find("Newer?").unwrap();
        let older = html.find("Older?").unwrap();
        assert!(newer < older);
        assert!(!html.contains("Future?"));
        assert!(html.contains("Page 1 of 1."));
    }

    #[tokio::test]
    async fn index_clamps_page_numbers() {
        let app = TestApp::new();
        let (owner, _) = app.seed_user("owner");
        let now = Utc::now();
        for i in 0..12 {
            app.seed_poll(&owner, &format!("Poll number {i:02}"), &["a"], VotingType::Unrestricted,
                now - Duration::minutes(i));
        }

        let res = request().path("/polls?page=abc").reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        assert!(html.contains("Page 1 of 3."));
        assert!(html.contains("Poll number 00"));
        assert!(!html.contains("Poll number 05"));

        let res = request().path("/polls?page=9999").reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        assert!(html.contains("Page 3 of 3."));
        assert!(html.contains("Poll number 11"));
        assert!(!html.contains("Poll number 09"));

        let res = request().path("/polls?page=2").reply(&app.routes()).await;
        let html = body(&res);
        assert!(html.contains("Page 2 of 3."));
        assert!(html.contains("Poll number 05"));
        assert!(html.contains("Poll number 09"));
    }

    #[tokio::test]
    async fn my_polls_requires_login_and_filters_by_owner() {
        let app = TestApp::new();
        let (alice, alice_token) = app.seed_user("alice");
        let (bob, _) = app.seed_user("bob");
        let earlier = Utc::now() - Duration::minutes(1);
        app.seed_poll(&alice, "Alice asks?", &["a"], VotingType::Unrestricted, earlier);
        app.seed_poll(&bob, "Bob asks?", &["a"], VotingType::Unrestricted, earlier);

        let res = request().path("/polls/mine").reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/accounts/login/?next=/polls/mine");

        let res = request()
            .path("/polls/mine")
            .header("authorization", format!("Bearer {alice_token}"))
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        assert!(html.contains("Alice asks?"));
        assert!(!html.contains("Bob asks?"));
    }

    #[tokio::test]
    async fn detail_hides_unknown_and_future_polls() {
        let app = TestApp::new();
        let (owner, _) = app.seed_user("owner");
        let live = app.seed_poll(&owner, "Live?", &["Yes", "No"], VotingType::Unrestricted,
            Utc::now() - Duration::minutes(1));
        let future = app.seed_poll(&owner, "Later?", &["Yes"], VotingType::Unrestricted,
            Utc::now() + Duration::days(1));

        let res = request().path(&format!("/polls/{}", live.id)).reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        assert!(html.contains("Live?"));
        assert!(html.contains(r#"name="choice2""#));

        let res = request().path(&format!("/polls/{}", future.id)).reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = request().path("/polls/4242").reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_requires_login() {
        let app = TestApp::new();

        let res = request().path("/polls/create").reply(&app.routes()).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/accounts/login/?next=/polls/create");

        let res = request()
            .method("POST")
            .path("/polls/create")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("question=Q%3F&choice1=A&radio-poll-type=1")
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(app.count_polls(), 0);
    }

    #[tokio::test]
    async fn create_stores_poll_and_choices() {
        let app = TestApp::new();
        let (_, token) = app.seed_user("alice");

        let res = request()
            .method("POST")
            .path("/polls/create")
            .header("cookie", format!("session={token}"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("question=+Lunch%3F+&choice1=Pizza&choice2=+&choice3=Tacos&choice5=Ignored&radio-poll-type=2")
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.ends_with("/embed"));

        let mut conn = app.state.db.connection().unwrap();
        let polls: Vec<models::Poll> = schema::polls::table
            .select(models::Poll::as_select())
            .load(&mut *conn)
            .unwrap();
        assert_eq!(polls.len(), 1);
        assert_eq!(location, format!("/polls/{}/embed", polls[0].id));

        let poll = get_internal(&mut conn, Id(polls[0].id)).unwrap();
        assert_eq!(poll.question, "Lunch?");
        assert_eq!(poll.voting_type, VotingType::RegisteredOnly);
        let texts: Vec<&str> = poll.choices.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Pizza", "Tacos"]);
    }

    #[tokio::test]
    async fn create_form_renders_configured_choice_slots() {
        let app = TestApp::new();
        let (_, token) = app.seed_user("alice");

        let res = request()
            .path("/polls/create")
            .header("authorization", format!("Bearer {token}"))
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        assert!(html.contains(r#"name="choice10""#));
        assert!(!html.contains(r#"name="choice11""#));
    }

    #[tokio::test]
    async fn create_accepts_more_than_four_choices() {
        let app = TestApp::new();
        let (_, token) = app.seed_user("alice");
        let fields: String = (1..=6).map(|n| format!("&choice{n}=Option+{n}")).collect();

        let res = request()
            .method("POST")
            .path("/polls/create")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("question=Many%3F&radio-poll-type=1{fields}"))
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);

        let mut conn = app.state.db.connection().unwrap();
        let id: i32 = schema::polls::table.select(schema::polls::id).first(&mut *conn).unwrap();
        let poll = get_internal(&mut conn, Id(id)).unwrap();
        assert_eq!(poll.choices.len(), 6);
        assert_eq!(poll.choices[5].text, "Option 6");
    }

    #[tokio::test]
    async fn rejected_form_keeps_entered_choices() {
        let app = TestApp::new();
        let (_, token) = app.seed_user("alice");

        let res = request()
            .method("POST")
            .path("/polls/create")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("question=&choice1=Pizza&choice2=Tacos&radio-poll-type=1")
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        assert!(html.contains(r#"value="Pizza""#));
        assert!(html.contains(r#"value="Tacos""#));
        assert!(html.contains(r#"name="choice10""#));
    }

    #[tokio::test]
    async fn create_rejects_missing_question() {
        let app = TestApp::new();
        let (_, token) = app.seed_user("alice");

        let res = request()
            .method("POST")
            .path("/polls/create")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("question=&choice1=A&radio-poll-type=1")
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body(&res).contains("The question is missing"));
        assert_eq!(app.count_polls(), 0);
    }

    #[tokio::test]
    async fn create_rejects_blank_choices() {
        let app = TestApp::new();
        let (_, token) = app.seed_user("alice");

        let res = request()
            .method("POST")
            .path("/polls/create")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("question=Q%3F&choice1=&choice2=++&radio-poll-type=1")
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body(&res);
        assert!(html.contains("At least one choice is required"));
        assert!(html.contains(r#"value="Q?""#));
        assert_eq!(app.count_polls(), 0);
    }

    #[tokio::test]
    async fn create_rejects_unknown_voting_type() {
        let app = TestApp::new();
        let (_, token) = app.seed_user("alice");

        let res = request()
            .method("POST")
            .path("/polls/create")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("question=Q%3F&choice1=A&radio-poll-type=7")
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body(&res).contains("Choose a voting type"));
        assert_eq!(app.count_polls(), 0);
    }

    #[tokio::test]
    async fn embed_links_are_absolute() {
        let app = TestApp::new();

        let res = request()
            .path("/polls/12/embed")
            .header("host", "polls.example.org")
            .reply(&app.routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body(&res).contains("http://polls.example.org/polls/12"));
    }
}

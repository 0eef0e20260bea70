mod auth;
mod ballot_api;
mod db;
mod pagination;
mod poll_api;
mod result_api;
mod templates;

#[cfg(test)]
mod testing;

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::{info, warn};
use warp::filters::BoxedFilter;
use warp::http::{header, StatusCode};
use warp::reply::{self, Reply, Response};
use warp::Filter;

use crate::config::Config;
use crate::error::{self, WebError};
use crate::voting::UnvalidatedSubmission;
use db::Database;

const FORM_LIMIT: u64 = 16 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
}

pub async fn setup(config: Config) -> Result<()> {
    let addr = config.bind_addr()?;
    let db = Database::establish(&config.database_url, config.db_pool_size)?;
    let state: AppState = Arc::new(AppStateInner { db, config });

    let (addr, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {e}");
            }
            info!("Shutting down");
        })?;
    info!("Approval polls listening on {}", addr);

    server.await;
    Ok(())
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let static_files = warp::path("static")
        .and(warp::fs::dir(state.config.static_dir.clone()));

    pages(state.clone())
        .or(api(state))
        .or(static_files)
        .recover(error::handle_rejection)
        .with(warp::log::custom(|log| {
            info!(
                method = %log.method(),
                path = log.path(),
                status = log.status().as_u16(),
                elapsed = ?log.elapsed(),
                "request"
            );
        }))
}

fn pages(state: AppState) -> BoxedFilter<(Response,)> {
    let user = auth::current_user(state.clone());

    let home = warp::get()
        .and(warp::path::end())
        .map(|| see_other("/polls"));

    let index = warp::path!("polls")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(user.clone())
        .and(warp::query::<ListQuery>())
        .and_then(poll_api::index);

    let my_polls = warp::path!("polls" / "mine")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(user.clone())
        .and(warp::query::<ListQuery>())
        .and_then(poll_api::my_polls);

    let create_form = warp::path!("polls" / "create")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(user.clone())
        .map(poll_api::create_form);

    let create = warp::path!("polls" / "create")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(user.clone())
        .and(form_body())
        .and_then(poll_api::create);

    let detail = warp::path!("polls" / i32)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(user.clone())
        .and_then(poll_api::detail);

    let results = warp::path!("polls" / i32 / "results")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(user.clone())
        .and_then(result_api::results_page);

    let vote = warp::path!("polls" / i32 / "vote")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(user.clone())
        .and(form_body())
        .and_then(ballot_api::vote);

    let embed = warp::path!("polls" / i32 / "embed")
        .and(warp::get())
        .and(with_state(state))
        .and(user)
        .and(warp::header::optional::<String>("host"))
        .map(poll_api::embed_instructions);

    home
        .or(index).unify()
        .or(my_polls).unify()
        .or(create_form).unify()
        .or(create).unify()
        .or(detail).unify()
        .or(results).unify()
        .or(vote).unify()
        .or(embed).unify()
        .boxed()
}

fn api(state: AppState) -> BoxedFilter<(Response,)> {
    let user = auth::current_user(state.clone());

    let results = warp::path!("api" / "polls" / i32 / "results")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(result_api::get_result);

    let ballots = warp::path!("api" / "polls" / i32 / "ballots")
        .and(warp::post())
        .and(with_state(state))
        .and(user)
        .and(warp::body::content_length_limit(FORM_LIMIT))
        .and(warp::body::json::<UnvalidatedSubmission>())
        .and_then(ballot_api::submit);

    results.or(ballots).unify().boxed()
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn form_body() -> impl Filter<Extract = (HashMap<String, String>,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

pub fn see_other(location: impl AsRef<str>) -> Response {
    reply::with_header(
        reply::with_status(warp::reply(), StatusCode::SEE_OTHER),
        header::LOCATION,
        location.as_ref(),
    ).into_response()
}

/// Sends anonymous visitors to the login page, returning them to `next` afterwards.
pub fn login_redirect(config: &Config, next: &str) -> Response {
    see_other(format!("{}?next={}", config.login_url, next))
}

pub fn respond(result: Result<Response, WebError>) -> Response {
    result.unwrap_or_else(Reply::into_response)
}

/// Runs a handler body on the blocking pool; pooled connections and SQLite
/// busy waits must never park a runtime worker.
pub async fn blocking<F>(work: F) -> Result<Response, warp::Rejection>
where
    F: FnOnce() -> Result<Response, WebError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(work)
        .await
        .unwrap_or_else(|e| Err(WebError::internal(format!("Request worker failed: {e}"))));
    Ok(respond(result))
}

use askama::Template;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

use crate::error::WebError;
use crate::voting::{Poll, PollResult, User};
use super::db::models::PollSummary;
use super::pagination::Page;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub heading: &'a str,
    pub base_path: &'a str,
    pub user: Option<&'a User>,
    pub latest_poll_list: Page<PollSummary>,
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailTemplate<'a> {
    pub user: Option<&'a User>,
    pub poll: &'a Poll,
    pub error_message: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "results.html")]
pub struct ResultsTemplate<'a> {
    pub user: Option<&'a User>,
    pub poll: &'a Poll,
    pub result: &'a PollResult,
}

#[derive(Template)]
#[template(path = "create.html")]
pub struct CreateTemplate<'a> {
    pub user: Option<&'a User>,
    pub question: &'a str,
    /// One entry per rendered `choice<k>` input.
    pub choices: Vec<&'a str>,
    pub question_error: Option<&'a str>,
    pub choice_error: Option<&'a str>,
    pub poll_type_error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "embed_instructions.html")]
pub struct EmbedTemplate<'a> {
    pub user: Option<&'a User>,
    pub link: &'a str,
}

pub fn render<T: Template>(template: &T, code: StatusCode) -> Result<Response, WebError> {
    let html = template.render()
        .map_err(|e| WebError::internal(format!("Failed to render {}: {e}", std::any::type_name::<T>())))?;
    Ok(reply::with_status(reply::html(html), code).into_response())
}

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;
use warp::http::Response;
use warp::hyper::body::Bytes;
use warp::reply::Reply;
use warp::Filter;

use crate::config::Config;
use crate::voting::{self, Id, VotingType};
use super::auth::issue_token;
use super::db::{models, schema, Database};
use super::poll_api::get_internal;
use super::{AppState, AppStateInner};

/// A fresh app per test, in memory unless built with [`TestApp::on_disk`].
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> TestApp {
        TestApp::with_database(Database::in_memory())
    }

    /// Backed by a fresh database file, so several pooled connections see
    /// the same data and can contend for its write lock.
    pub fn on_disk(pool_size: u32) -> (TestApp, PathBuf) {
        let path = std::env::temp_dir().join(format!("approval-polls-{}.db", Uuid::new_v4()));
        let db = Database::establish(&path.to_string_lossy(), pool_size).unwrap();
        (TestApp::with_database(db), path)
    }

    pub fn with_database(db: Database) -> TestApp {
        let state = Arc::new(AppStateInner { db, config: Config::default() });
        TestApp { state }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        super::routes(self.state.clone())
    }

    /// Registers a user and returns it with a valid session token.
    pub fn seed_user(&self, name: &str) -> (voting::User, String) {
        let sub = Uuid::new_v4();
        let mut conn = self.state.db.connection().unwrap();

        let user: models::User = diesel::insert_into(schema::users::table)
            .values(&models::NewUser { federated_id: sub.hyphenated().to_string(), display_name: name })
            .returning(models::User::as_returning())
            .get_result(&mut *conn)
            .unwrap();

        let token = issue_token(&self.state.config.jwt_secret, sub, name);
        (voting::User::try_from(user).unwrap(), token)
    }

    pub fn seed_poll(
        &self,
        owner: &voting::User,
        question: &str,
        choices: &[&str],
        voting_type: VotingType,
        pub_date: DateTime<Utc>,
    ) -> voting::Poll {
        let mut conn = self.state.db.connection().unwrap();

        let poll_id: i32 = diesel::insert_into(schema::polls::table)
            .values(&models::NewPoll {
                question,
                pub_date: pub_date.naive_utc(),
                owner_id: owner.id.0,
                voting_type: voting_type.code(),
            })
            .returning(schema::polls::id)
            .get_result(&mut *conn)
            .unwrap();

        let rows: Vec<models::NewChoice> = choices.iter()
            .map(|text| models::NewChoice { poll_id, choice_text: text })
            .collect();
        diesel::insert_into(schema::choices::table)
            .values(&rows)
            .execute(&mut *conn)
            .unwrap();

        get_internal(&mut conn, Id(poll_id)).unwrap()
    }

    pub fn count_polls(&self) -> i64 {
        let mut conn = self.state.db.connection().unwrap();
        schema::polls::table.count().get_result(&mut *conn).unwrap()
    }

    pub fn count_votes(&self) -> i64 {
        let mut conn = self.state.db.connection().unwrap();
        schema::votes::table.count().get_result(&mut *conn).unwrap()
    }

    pub fn ballots(&self) -> Vec<models::Ballot> {
        let mut conn = self.state.db.connection().unwrap();
        schema::ballots::table
            .order(schema::ballots::id.asc())
            .select(models::Ballot::as_select())
            .load(&mut *conn)
            .unwrap()
    }

    /// Choice ids approved on a stored ballot, lowest first.
    pub fn voted_choices(&self, ballot_id: i32) -> Vec<i32> {
        let mut conn = self.state.db.connection().unwrap();
        schema::votes::table
            .filter(schema::votes::ballot_id.eq(ballot_id))
            .order(schema::votes::choice_id.asc())
            .select(schema::votes::choice_id)
            .load(&mut *conn)
            .unwrap()
    }
}

pub fn body(res: &Response<Bytes>) -> String {
    String::from_utf8_lossy(res.body()).into_owned()
}

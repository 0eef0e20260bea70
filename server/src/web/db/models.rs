use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::voting;
use super::schema;

#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub federated_id: String,
    pub display_name: String,
}

impl TryFrom<User> for voting::User {
    type Error = uuid::Error;
    fn try_from(value: User) -> Result<Self, Self::Error> {
        Ok(voting::User::new(
            voting::Id(value.id),
            Uuid::parse_str(&value.federated_id)?,
            value.display_name,
        ))
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::users)]
pub struct NewUser<'a> {
    pub federated_id: String,
    pub display_name: &'a str,
}

#[derive(Debug, Associations, Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::polls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(User, foreign_key = owner_id))]
pub struct Poll {
    pub id: i32,
    pub question: String,
    pub pub_date: NaiveDateTime,
    pub owner_id: i32,
    pub voting_type: i32,
}

impl TryFrom<(Poll, Vec<Choice>)> for voting::Poll {
    type Error = ValidationError;
    fn try_from((poll, choices): (Poll, Vec<Choice>)) -> Result<Self, Self::Error> {
        let Poll { id, question, pub_date, owner_id, voting_type } = poll;

        Ok(voting::Poll {
            id: voting::Id(id),
            question,
            choices: choices.into_iter().map(voting::Choice::from).collect(),
            voting_type: voting::VotingType::try_from(voting_type)?,
            owner_id: voting::Id(owner_id),
            pub_date: pub_date.and_utc(),
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::polls)]
pub struct NewPoll<'a> {
    pub question: &'a str,
    pub pub_date: NaiveDateTime,
    pub owner_id: i32,
    pub voting_type: i32,
}

impl<'a> NewPoll<'a> {
    pub fn from(owner: &voting::User, poll: &'a voting::CreatePoll) -> Self {
        NewPoll {
            question: &poll.question,
            pub_date: chrono::Utc::now().naive_utc(),
            owner_id: owner.id.0,
            voting_type: poll.voting_type.code(),
        }
    }
}

/// Published poll summary for listings.
#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = schema::polls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PollSummary {
    pub id: i32,
    pub question: String,
    pub pub_date: NaiveDateTime,
}

#[derive(Debug, Associations, Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::choices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Poll))]
pub struct Choice {
    pub id: i32,
    pub poll_id: i32,
    pub choice_text: String,
}

impl From<Choice> for voting::Choice {
    fn from(value: Choice) -> Self {
        voting::Choice {
            id: voting::Id(value.id),
            text: value.choice_text,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::choices)]
pub struct NewChoice<'a> {
    pub poll_id: i32,
    pub choice_text: &'a str,
}

#[derive(Debug, Associations, Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::ballots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Poll))]
pub struct Ballot {
    pub id: i32,
    pub poll_id: i32,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = schema::ballots)]
pub struct NewBallot {
    pub poll_id: i32,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl From<&voting::Ballot> for NewBallot {
    fn from(value: &voting::Ballot) -> Self {
        NewBallot {
            poll_id: value.poll_id.0,
            user_id: value.voter_id.map(|id| id.0),
            created_at: value.created_at.naive_utc(),
        }
    }
}

#[derive(Debug, Associations, Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::votes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Ballot))]
#[diesel(belongs_to(Choice))]
pub struct Vote {
    pub id: i32,
    pub ballot_id: i32,
    pub choice_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = schema::votes)]
pub struct NewVote {
    pub ballot_id: i32,
    pub choice_id: i32,
}

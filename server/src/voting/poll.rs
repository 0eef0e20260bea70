use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::Id;
use crate::error::ValidationError;

/// Who may vote in a poll, and how often.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingType {
    /// Anyone, any number of times; ballots carry no identity.
    Unrestricted,
    /// Authenticated users only, one ballot each.
    RegisteredOnly,
}

impl VotingType {
    pub const fn code(self) -> i32 {
        match self {
            VotingType::Unrestricted => 1,
            VotingType::RegisteredOnly => 2,
        }
    }
}

impl TryFrom<i32> for VotingType {
    type Error = ValidationError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VotingType::Unrestricted),
            2 => Ok(VotingType::RegisteredOnly),
            other => Err(ValidationError::VotingTypeInvalid(other.to_string())),
        }
    }
}

impl TryFrom<&str> for VotingType {
    type Error = ValidationError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value
            .trim()
            .parse::<i32>()
            .map_err(|_| ValidationError::VotingTypeInvalid(value.to_string()))
            .and_then(VotingType::try_from)
    }
}

impl Display for VotingType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            VotingType::Unrestricted => write!(f, "open to everyone"),
            VotingType::RegisteredOnly => write!(f, "registered users only"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Choice {
    pub id: Id,
    pub text: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Poll {
    pub id: Id,
    pub question: String,
    /// In insertion order; the form addresses them as `choice1`, `choice2`, ...
    pub choices: Vec<Choice>,
    pub voting_type: VotingType,
    pub owner_id: Id,
    pub pub_date: DateTime<Utc>,
}

impl Poll {
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.pub_date <= now
    }

    pub fn choice(&self, id: Id) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

/// A poll ready to be stored: trimmed question, at least one non-blank choice.
#[derive(Debug, PartialEq)]
pub struct CreatePoll {
    pub question: String,
    pub choices: Vec<String>,
    pub voting_type: VotingType,
}

/// Raw poll creation input, as posted by the creation form.
#[derive(Debug, Default, Clone)]
pub struct UnvalidatedCreatePoll {
    pub question: Option<String>,
    pub choices: Vec<String>,
    pub voting_type: Option<String>,
}

impl UnvalidatedCreatePoll {
    /// Collects `choice1`, `choice2`, ... up to the first missing key.
    pub fn from_form(fields: &HashMap<String, String>) -> UnvalidatedCreatePoll {
        let choices = (1..)
            .map_while(|n| fields.get(&format!("choice{n}")).cloned())
            .collect();

        UnvalidatedCreatePoll {
            question: fields.get("question").cloned(),
            choices,
            voting_type: fields.get("radio-poll-type").cloned(),
        }
    }

    /// The trimmed question, kept so a rejected form can be shown again.
    pub fn trimmed_question(&self) -> &str {
        self.question.as_deref().map(str::trim).unwrap_or_default()
    }
}

impl TryFrom<UnvalidatedCreatePoll> for CreatePoll {
    type Error = ValidationError;
    fn try_from(value: UnvalidatedCreatePoll) -> Result<Self, Self::Error> {
        let question = value.trimmed_question();
        if question.is_empty() {
            return Err(ValidationError::QuestionMissing);
        }

        let choices: Vec<String> = value.choices.iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        if choices.is_empty() {
            return Err(ValidationError::ChoiceMissing);
        }

        let voting_type = match value.voting_type.as_deref() {
            Some(raw) => VotingType::try_from(raw)?,
            None => return Err(ValidationError::VotingTypeInvalid(String::new())),
        };

        Ok(CreatePoll {
            question: question.to_string(),
            choices,
            voting_type,
        })
    }
}

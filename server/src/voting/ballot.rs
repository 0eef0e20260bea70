use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::Id;
use super::poll::{Poll, VotingType};
use super::user::User;
use crate::error::{CastError, ValidationError};

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Selection {
    pub choice_id: Id,
    pub selected: bool,
}

/// Ballot contents as submitted, not yet checked against the poll.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnvalidatedSubmission {
    pub selections: Vec<Selection>,
}

impl UnvalidatedSubmission {
    /// Maps the form's `choice<k>` checkboxes onto the poll's k-th choice.
    /// Only the presence of a field counts, never its value.
    pub fn from_form(fields: &HashMap<String, String>, poll: &Poll) -> UnvalidatedSubmission {
        let selections = poll.choices.iter()
            .enumerate()
            .map(|(index, choice)| Selection {
                choice_id: choice.id,
                selected: fields.contains_key(&format!("choice{}", index + 1)),
            })
            .collect();

        UnvalidatedSubmission { selections }
    }
}

/// The approved choices of a ballot, in the poll's choice order.
#[derive(Debug, PartialEq)]
pub struct Submission {
    pub approved: Vec<Id>,
}

impl TryFrom<(UnvalidatedSubmission, &Poll)> for Submission {
    type Error = ValidationError;
    fn try_from((submission, poll): (UnvalidatedSubmission, &Poll)) -> Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        let mut picked = HashSet::new();

        for Selection { choice_id, selected } in submission.selections {
            if poll.choice(choice_id).is_none() {
                return Err(ValidationError::SelectionInvalid { poll_id: poll.id, choice_id });
            }
            if !seen.insert(choice_id) {
                return Err(ValidationError::SelectionDuplicate(choice_id));
            }
            if selected {
                picked.insert(choice_id);
            }
        }

        let approved = poll.choices.iter()
            .map(|c| c.id)
            .filter(|id| picked.contains(id))
            .collect();

        Ok(Submission { approved })
    }
}

#[derive(Debug, Serialize)]
pub struct Ballot {
    pub poll_id: Id,
    /// Only recorded for registered-only polls.
    pub voter_id: Option<Id>,
    pub approved: Vec<Id>,
    pub created_at: DateTime<Utc>,
}

impl Ballot {
    /// Applies the poll's voting policy to a submission from `voter`.
    pub fn cast(poll: &Poll, voter: Option<&User>, submission: Submission) -> Result<Ballot, CastError> {
        let voter_id = match (poll.voting_type, voter) {
            (VotingType::Unrestricted, _) => None,
            (VotingType::RegisteredOnly, Some(user)) => Some(user.id),
            (VotingType::RegisteredOnly, None) => return Err(CastError::LoginRequired),
        };

        Ok(Ballot {
            poll_id: poll.id,
            voter_id,
            approved: submission.approved,
            created_at: Utc::now(),
        })
    }
}

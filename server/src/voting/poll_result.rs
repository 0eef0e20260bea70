use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id::Id;
use super::poll::Poll;

#[derive(Serialize, Debug, PartialEq)]
pub struct ChoiceTally {
    pub choice_id: Id,
    pub text: String,
    pub votes: i64,
    /// Share of ballots approving this choice, 0 to 100.
    pub percent: f64,
}

#[derive(Serialize, Debug)]
pub struct PollResult {
    pub poll_id: Id,
    pub evaluated_at: DateTime<Utc>,

    pub ballot_count: i64,
    pub tally: Vec<ChoiceTally>,
    pub leaders: Vec<Id>,
}

impl PollResult {
    /// Builds the approval tally from per-choice vote counts. Choices with
    /// no entry in `votes` have zero approvals; entries for choices that are
    /// not part of the poll are ignored.
    pub fn evaluate(poll: &Poll, ballot_count: i64, votes: &[(Id, i64)]) -> PollResult {
        let counts: HashMap<Id, i64> = votes.iter().copied().collect();

        let tally: Vec<ChoiceTally> = poll.choices.iter()
            .map(|choice| {
                let votes = counts.get(&choice.id).copied().unwrap_or(0);
                let percent = if ballot_count > 0 {
                    votes as f64 * 100.0 / ballot_count as f64
                } else {
                    0.0
                };
                ChoiceTally { choice_id: choice.id, text: choice.text.clone(), votes, percent }
            })
            .collect();

        // every choice with the top count leads; nobody leads an empty poll
        let top = tally.iter().map(|t| t.votes).max().unwrap_or(0);
        let leaders = tally.iter()
            .filter(|t| top > 0 && t.votes == top)
            .map(|t| t.choice_id)
            .collect();

        PollResult {
            poll_id: poll.id,
            evaluated_at: Utc::now(),
            ballot_count,
            tally,
            leaders,
        }
    }

    pub fn is_leader(&self, choice_id: &Id) -> bool {
        self.leaders.contains(choice_id)
    }
}

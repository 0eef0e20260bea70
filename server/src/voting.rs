mod ballot;
mod id;
mod poll;
mod poll_result;
mod user;

pub use ballot::{Ballot, Submission, UnvalidatedSubmission};
pub use id::Id;
pub use poll::{Choice, CreatePoll, Poll, UnvalidatedCreatePoll, VotingType};
pub use poll_result::PollResult;
pub use user::User;

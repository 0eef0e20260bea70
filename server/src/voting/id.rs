use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Row identifier shared by polls, choices, ballots and users.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub i32);

impl Display for Id {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<i32> for Id {
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

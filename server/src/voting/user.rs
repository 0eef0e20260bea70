use serde::Serialize;
use uuid::Uuid;

use super::id::Id;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub federated_id: Uuid,
    pub display_name: String,
}

impl User {
    pub const fn new(id: Id, federated_id: Uuid, display_name: String) -> User {
        User {
            id,
            federated_id,
            display_name,
        }
    }
}

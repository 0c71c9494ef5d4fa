use serde::{Deserialize, Serialize};

/// Application user profile, keyed by the identity provider's user id.
/// Created on first successful authentication with the email doubling
/// as the initial display name.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

use serde::{Deserialize, Serialize};

/// A person's membership in a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(rename = "id")]
    pub membership_id: String,
    #[serde(rename = "personId")]
    pub person_id: String,
}

/// Request body of `POST /memberships`
#[derive(Debug, Serialize)]
pub(crate) struct CreateMembershipRequest<'a> {
    #[serde(rename = "roomId")]
    pub room_id: &'a str,
    #[serde(rename = "personId")]
    pub person_id: &'a str,
}

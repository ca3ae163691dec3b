use serde::{Deserialize, Serialize};

/// A row of the `profiles` table, keyed by the auth user id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub is_landlord: bool,
    pub company_name: Option<String>,
    pub profile_image: Option<String>,
}

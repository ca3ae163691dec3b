use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The User struct is the identity record embedded in every session.
///
/// `user_metadata` is free-form and owned by the backend; the accessors below
/// only read the keys the marketplace relies on (`is_landlord`, `name`,
/// `company_name`, `profile_image`). Any field this struct does not name is
/// kept in `extra` so that a read-modify-write never loses data.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Construct a new User with an id, optional email and metadata.
    pub fn new(id: String, email: Option<String>, user_metadata: Option<Map<String, Value>>) -> Self {
        User {
            id,
            email,
            user_metadata: user_metadata.unwrap_or_default(),
            extra: Map::new(),
        }
    }

    /// True only when the metadata carries a literal `is_landlord: true`.
    pub fn is_landlord(&self) -> bool {
        self.user_metadata
            .get("is_landlord")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata_str("name")
    }

    pub fn company_name(&self) -> Option<&str> {
        self.metadata_str("company_name")
    }

    pub fn profile_image(&self) -> Option<&str> {
        self.metadata_str("profile_image")
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(Value::as_str)
    }
}

/// Metadata attached to an account at signup.
///
/// Tenants send `company_name: null`; the backend stores the key either way.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignUpMetadata {
    pub name: String,
    pub is_landlord: bool,
    pub company_name: Option<String>,
    pub profile_image: Option<String>,
}

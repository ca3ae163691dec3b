use reqwest::Method;
use tracing::info;

use super::error::BackendError;
use super::http::{read_json, BackendHttp};
use crate::models::Profile;

const PROFILES_PATH: &str = "/rest/v1/profiles";

/// The `profiles` table behind the REST API.
pub struct ProfilesTable<'a> {
    http: &'a BackendHttp,
    access_token: Option<String>,
}

impl<'a> ProfilesTable<'a> {
    pub fn new(http: &'a BackendHttp, access_token: Option<String>) -> Self {
        ProfilesTable { http, access_token }
    }

    /// Insert one row and return it as stored.
    pub async fn insert(&self, profile: &Profile) -> Result<Profile, BackendError> {
        let response = self
            .http
            .request(Method::POST, PROFILES_PATH, self.access_token.as_deref())
            .header("Prefer", "return=representation")
            .json(&[profile])
            .send()
            .await?;
        let mut rows: Vec<Profile> = read_json(response).await?;
        if rows.is_empty() {
            return Err(BackendError::Decode("insert returned no rows".to_string()));
        }
        let row = rows.swap_remove(0);
        info!(
            event_name = "rest.profiles.inserted",
            event_domain = "rest",
            user_id = row.id.as_str(),
            is_landlord = row.is_landlord,
            "profile row created"
        );
        Ok(row)
    }
}

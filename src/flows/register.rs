use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use thiserror::Error;
use tracing::info;

use super::FlowError;
use crate::backend::{Backend, FileOptions};
use crate::models::{Profile, SignUpMetadata};
use crate::resolver::Route;

const PROFILE_BUCKET: &str = "profiles";
const MIN_PASSWORD_LEN: usize = 6;

/// Form problems, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Email is required")]
    EmailRequired,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
    #[error("Name is required")]
    NameRequired,
    #[error("Profile photo is required for landlords")]
    PhotoRequired,
    #[error("Company name is required for landlords")]
    CompanyRequired,
}

/// Where a profile photo comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// A `data:` URL with a base64 payload.
    DataUrl(String),
    File(PathBuf),
}

impl ImageSource {
    /// `data:` URLs are taken as-is, anything else is a file path.
    pub fn parse(source: &str) -> Self {
        if source.starts_with("data:") {
            ImageSource::DataUrl(source.to_string())
        } else {
            ImageSource::File(PathBuf::from(source))
        }
    }

    pub async fn read(&self) -> Result<Vec<u8>, FlowError> {
        match self {
            ImageSource::DataUrl(url) => {
                let (header, payload) = url
                    .split_once(',')
                    .ok_or_else(|| FlowError::Upload("malformed data URL".to_string()))?;
                if !header.ends_with(";base64") {
                    return Err(FlowError::Upload("data URL is not base64 encoded".to_string()));
                }
                general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| FlowError::Upload(e.to_string()))
            }
            ImageSource::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| FlowError::Upload(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Signup form state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub name: String,
    pub is_landlord: bool,
    pub company_name: String,
    pub profile_image: Option<ImageSource>,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.is_empty() {
            return Err(ValidationError::EmailRequired);
        }
        if self.password.is_empty() {
            return Err(ValidationError::PasswordRequired);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        if self.name.is_empty() {
            return Err(ValidationError::NameRequired);
        }
        if self.is_landlord {
            if self.profile_image.is_none() {
                return Err(ValidationError::PhotoRequired);
            }
            if self.company_name.is_empty() {
                return Err(ValidationError::CompanyRequired);
            }
        }
        Ok(())
    }

    /// Switching to tenant discards the landlord-only fields.
    pub fn set_landlord(&mut self, is_landlord: bool) {
        self.is_landlord = is_landlord;
        if !is_landlord {
            self.company_name.clear();
            self.profile_image = None;
        }
    }

    fn company(&self) -> Option<String> {
        if self.is_landlord {
            Some(self.company_name.clone())
        } else {
            None
        }
    }
}

/// Create the account, its profile row and a signed-in session.
/// Returns the screen for the new account's role.
pub async fn register(backend: &Backend, form: &RegistrationForm) -> Result<Route, FlowError> {
    form.validate()?;

    let profile_image = match &form.profile_image {
        Some(source) => Some(upload_profile_image(backend, source).await?),
        None => None,
    };

    let metadata = SignUpMetadata {
        name: form.name.clone(),
        is_landlord: form.is_landlord,
        company_name: form.company(),
        profile_image: profile_image.clone(),
    };
    let signed_up = backend
        .auth()
        .sign_up(&form.email, &form.password, &metadata)
        .await?;

    let profile = Profile {
        id: signed_up.user.id.clone(),
        name: form.name.clone(),
        is_landlord: form.is_landlord,
        company_name: form.company(),
        profile_image,
    };
    backend.profiles().await.insert(&profile).await?;

    backend
        .auth()
        .sign_in_with_password(&form.email, &form.password)
        .await?;

    info!(
        event_name = "flows.register.completed",
        event_domain = "flows",
        user_id = profile.id.as_str(),
        is_landlord = form.is_landlord,
        "account registered"
    );
    Ok(Route::for_role(form.is_landlord))
}

async fn upload_profile_image(backend: &Backend, source: &ImageSource) -> Result<String, FlowError> {
    let bytes = source.read().await?;
    let object = format!("profile-{}.jpg", Utc::now().timestamp_millis());
    let options = FileOptions {
        content_type: "image/jpeg".to_string(),
        upsert: false,
        ..Default::default()
    };
    let bucket = backend.storage().from(PROFILE_BUCKET);
    bucket
        .upload(&object, bytes, &options)
        .await
        .map_err(|e| FlowError::Upload(e.to_string()))?;
    Ok(bucket.get_public_url(&object))
}

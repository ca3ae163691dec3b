//! The account screens as plain async functions: each takes the backend,
//! performs the calls the screen would, and returns where to go next.

pub mod login;
pub mod register;
pub mod settings;

use thiserror::Error;

pub use login::login;
pub use register::{register, ImageSource, RegistrationForm, ValidationError};
pub use settings::{sign_out, toggle_user_mode, ModeToggle};

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Failed to upload profile image: {0}")]
    Upload(String),
    #[error("{0}")]
    Backend(#[from] BackendError),
}

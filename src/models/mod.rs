pub mod profile;
pub mod session;
pub mod user;

pub use profile::Profile;
pub use session::{AuthChange, AuthEvent, Session};
pub use user::{SignUpMetadata, User};

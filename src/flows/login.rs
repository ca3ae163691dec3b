use super::FlowError;
use crate::backend::Backend;
use crate::resolver::Route;

/// Sign in and pick the screen for the account's role.
pub async fn login(backend: &Backend, email: &str, password: &str) -> Result<Route, FlowError> {
    let session = backend.auth().sign_in_with_password(email, password).await?;
    Ok(Route::for_user(&session.user))
}

use std::fmt;

use crate::models::User;

/// The screens the resolver can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Home,
    Dashboard,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Home => "/home",
            Route::Dashboard => "/dashboard",
        }
    }

    /// Landlords land on the dashboard, everyone else on home.
    pub fn for_role(is_landlord: bool) -> Self {
        if is_landlord {
            Route::Dashboard
        } else {
            Route::Home
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self::for_role(user.is_landlord())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn test_routes_by_role() {
        let mut metadata = Map::new();
        metadata.insert("is_landlord".to_string(), json!(true));
        let landlord = User::new("u1".to_string(), None, Some(metadata));
        let tenant = User::new("u2".to_string(), None, None);

        assert_eq!(Route::for_user(&landlord), Route::Dashboard);
        assert_eq!(Route::for_user(&tenant), Route::Home);
        assert_eq!(Route::Dashboard.to_string(), "/dashboard");
        assert_eq!(Route::Register.as_str(), "/register");
    }
}

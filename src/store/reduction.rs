//! Projections applied to a session's `user` object when it has to fit a
//! size-limited store. Each one is pure and works on raw JSON, since the
//! session schema belongs to the auth backend and may grow at any time.

use serde_json::{Map, Value};

/// A projection of the `user` object of a session payload.
pub type Reduction = fn(&Value) -> Value;

/// Tried in order until one fits the store's capacity.
pub const SESSION_REDUCTIONS: [Reduction; 2] = [minimal_user, landlord_flag_only];

const MINIMAL_METADATA_KEYS: [&str; 3] = ["name", "is_landlord", "company_name"];

/// `{id, email, user_metadata: {name, is_landlord, company_name}}`,
/// leaving out anything absent or null.
pub fn minimal_user(user: &Value) -> Value {
    let mut projected = Map::new();
    copy_present(user, &mut projected, "id");
    copy_present(user, &mut projected, "email");

    let mut metadata = Map::new();
    if let Some(source) = user.get("user_metadata") {
        for key in MINIMAL_METADATA_KEYS {
            copy_present(source, &mut metadata, key);
        }
    }
    projected.insert("user_metadata".to_string(), Value::Object(metadata));
    Value::Object(projected)
}

/// `{id, user_metadata: {is_landlord}}`: just enough to route the user.
pub fn landlord_flag_only(user: &Value) -> Value {
    let mut projected = Map::new();
    copy_present(user, &mut projected, "id");

    let mut metadata = Map::new();
    if let Some(source) = user.get("user_metadata") {
        copy_present(source, &mut metadata, "is_landlord");
    }
    projected.insert("user_metadata".to_string(), Value::Object(metadata));
    Value::Object(projected)
}

fn copy_present(source: &Value, target: &mut Map<String, Value>, key: &str) {
    if let Some(value) = source.get(key).filter(|v| !v.is_null()) {
        target.insert(key.to_string(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_user() -> Value {
        json!({
            "id": "u1",
            "email": "landlord@example.com",
            "aud": "authenticated",
            "role": "authenticated",
            "app_metadata": {"provider": "email"},
            "user_metadata": {
                "name": "Lena",
                "is_landlord": true,
                "company_name": null,
                "profile_image": "https://cdn.example.com/p.jpg",
                "temp_user_mode": false
            },
            "identities": [{"id": "i1"}]
        })
    }

    #[test]
    fn test_minimal_user_keeps_only_routing_fields() {
        assert_eq!(
            minimal_user(&full_user()),
            json!({
                "id": "u1",
                "email": "landlord@example.com",
                "user_metadata": {"name": "Lena", "is_landlord": true}
            })
        );
    }

    #[test]
    fn test_minimal_user_without_metadata_or_email() {
        assert_eq!(
            minimal_user(&json!({"id": "u2", "email": null})),
            json!({"id": "u2", "user_metadata": {}})
        );
    }

    #[test]
    fn test_landlord_flag_only() {
        assert_eq!(
            landlord_flag_only(&full_user()),
            json!({"id": "u1", "user_metadata": {"is_landlord": true}})
        );
        assert_eq!(
            landlord_flag_only(&json!({"id": "u3", "user_metadata": {"name": "T"}})),
            json!({"id": "u3", "user_metadata": {}})
        );
    }

    #[test]
    fn test_reductions_shrink_monotonically() {
        let user = full_user();
        let sizes: Vec<usize> = SESSION_REDUCTIONS
            .iter()
            .map(|reduce| reduce(&user).to_string().len())
            .collect();
        assert!(user.to_string().len() > sizes[0]);
        assert!(sizes[0] > sizes[1]);
    }
}

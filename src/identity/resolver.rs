//! Profile lookup over the generic record store. Pure glue: fetch the row
//! keyed by user id, decode it, and reject anything outside the closed role
//! set at this boundary.

use serde_json::Value;

use crate::error::{AppError, AppResult};

use super::principal::{Profile, ProfileFields, User};
use super::provider::{Filter, IdentityProvider, Row};

pub const PROFILES_TABLE: &str = "profiles";

/// Decode one record-store row into a `Profile`. An out-of-set role value
/// fails here rather than leaking an untyped string into the app.
pub fn decode_profile(row: Row) -> AppResult<Profile> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| AppError::profile_read("bad_profile_row", e.to_string()))
}

/// Fetch the profile for `user_id`. `Ok(None)` means not yet provisioned,
/// which is a valid transient state, not an error.
pub async fn fetch_profile(
    provider: &dyn IdentityProvider,
    user_id: &str,
) -> AppResult<Option<Profile>> {
    let rows = provider
        .select(PROFILES_TABLE, &Filter::eq("id", user_id))
        .await
        .map_err(|e| AppError::profile_read("profile_select_failed", e.to_string()))?;
    match rows.into_iter().next() {
        Some(row) => Ok(Some(decode_profile(row)?)),
        None => Ok(None),
    }
}

/// Build the row inserted at sign-up: provider-issued id and email merged
/// with the caller-supplied domain fields.
pub fn profile_row(user: &User, fields: &ProfileFields) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), Value::from(user.id.clone()));
    row.insert("email".into(), Value::from(user.email.clone()));
    row.insert("name".into(), Value::from(fields.name.clone()));
    row.insert("role".into(), Value::from(fields.role.as_str()));
    if let Some(class) = &fields.class {
        row.insert("class".into(), Value::from(class.clone()));
    }
    if let Some(subject) = &fields.subject {
        row.insert("subject".into(), Value::from(subject.clone()));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn row(json: serde_json::Value) -> Row {
        match json {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn decodes_full_teacher_row() {
        let p = decode_profile(row(serde_json::json!({
            "id": "u1", "email": "a@x.com", "name": "A",
            "role": "teacher", "subject": "Math"
        })))
        .unwrap();
        assert_eq!(p.role, Role::Teacher);
        assert_eq!(p.subject.as_deref(), Some("Math"));
        assert_eq!(p.class, None);
    }

    #[test]
    fn rejects_unknown_role() {
        let err = decode_profile(row(serde_json::json!({
            "id": "u1", "name": "A", "role": "principal"
        })))
        .unwrap_err();
        assert_eq!(err.code_str(), "bad_profile_row");
    }

    #[test]
    fn profile_row_merges_identity_and_fields() {
        let user = User { id: "u1".into(), email: "a@x.com".into() };
        let fields = ProfileFields {
            name: "A".into(),
            role: Role::Teacher,
            class: None,
            subject: Some("Math".into()),
        };
        let row = profile_row(&user, &fields);
        assert_eq!(row.get("id").unwrap(), "u1");
        assert_eq!(row.get("email").unwrap(), "a@x.com");
        assert_eq!(row.get("role").unwrap(), "teacher");
        assert_eq!(row.get("subject").unwrap(), "Math");
        assert!(!row.contains_key("class"));
    }
}

use serde::{Deserialize, Serialize};

/// Closed classification of a user. Anything outside these two values is
/// rejected at the profile-resolver boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

/// Stable identity derived from a provider session. Exists only while a
/// session is live; 1:1 with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Domain record keyed by `User.id`. May be absent even when the user is
/// present (not yet provisioned); that is a valid transient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Domain fields supplied at sign-up; merged into the new profile row
/// alongside the provider-issued user id and email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileFields {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// The externally-observable identity tuple. Consumers get a copy; re-reads
/// may differ once a new auth event has landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub user: Option<User>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl Snapshot {
    /// State before the first session resolution completes.
    pub fn initial() -> Self {
        Snapshot { user: None, profile: None, loading: true }
    }

    /// Settled state with nobody signed in.
    pub fn anonymous() -> Self {
        Snapshot { user: None, profile: None, loading: false }
    }
}

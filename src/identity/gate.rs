//! Access gate consulted before rendering any protected screen. Pure and
//! synchronous on purpose: it must be testable without standing up a
//! provider.

use super::principal::{Role, Snapshot};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The requested screen may render.
    Render,
    /// Send the user elsewhere instead of rendering.
    Redirect(&'static str),
    /// Identity is still resolving; show a neutral waiting indicator and do
    /// not redirect.
    Pending,
}

/// Decide whether a screen guarded by `required_role` may render under
/// `snapshot`. An absent profile counts as "role unknown, deny".
pub fn decide(snapshot: &Snapshot, required_role: Option<Role>) -> GateDecision {
    if snapshot.loading {
        return GateDecision::Pending;
    }
    if snapshot.user.is_none() {
        return GateDecision::Redirect(LOGIN_PATH);
    }
    if let Some(required) = required_role {
        return match &snapshot.profile {
            Some(profile) if profile.role == required => GateDecision::Render,
            _ => GateDecision::Redirect(DASHBOARD_PATH),
        };
    }
    GateDecision::Render
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Profile, User};

    fn snap(user: bool, role: Option<Role>, loading: bool) -> Snapshot {
        Snapshot {
            user: user.then(|| User { id: "u1".into(), email: "a@x.com".into() }),
            profile: role.map(|r| Profile {
                id: "u1".into(),
                name: "A".into(),
                role: r,
                class: None,
                subject: None,
            }),
            loading,
        }
    }

    #[test]
    fn pending_while_loading_regardless_of_role() {
        assert_eq!(decide(&snap(false, None, true), None), GateDecision::Pending);
        assert_eq!(decide(&snap(false, None, true), Some(Role::Teacher)), GateDecision::Pending);
        assert_eq!(decide(&snap(true, Some(Role::Student), true), Some(Role::Student)), GateDecision::Pending);
    }

    #[test]
    fn unauthenticated_redirects_to_login() {
        assert_eq!(decide(&snap(false, None, false), None), GateDecision::Redirect(LOGIN_PATH));
        assert_eq!(
            decide(&snap(false, None, false), Some(Role::Teacher)),
            GateDecision::Redirect(LOGIN_PATH)
        );
    }

    #[test]
    fn role_mismatch_redirects_to_dashboard() {
        let s = snap(true, Some(Role::Student), false);
        assert_eq!(decide(&s, Some(Role::Teacher)), GateDecision::Redirect(DASHBOARD_PATH));
        assert_eq!(decide(&s, Some(Role::Student)), GateDecision::Render);
    }

    #[test]
    fn missing_profile_is_role_unknown_deny() {
        let s = snap(true, None, false);
        assert_eq!(decide(&s, Some(Role::Student)), GateDecision::Redirect(DASHBOARD_PATH));
        // but unguarded screens still render for a roleless user
        assert_eq!(decide(&s, None), GateDecision::Render);
    }

    #[test]
    fn decide_is_referentially_transparent() {
        let s = snap(true, Some(Role::Teacher), false);
        let first = decide(&s, Some(Role::Teacher));
        for _ in 0..10 {
            assert_eq!(decide(&s, Some(Role::Teacher)), first);
        }
        assert_eq!(s, snap(true, Some(Role::Teacher), false));
    }
}

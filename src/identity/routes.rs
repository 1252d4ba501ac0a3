//! Routing surface and navigation controller: maps gate decisions onto the
//! app's screen paths, including the role-dispatching `/dashboard` hub.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::gate::{self, GateDecision, DASHBOARD_PATH};
use super::principal::{Role, Snapshot};

pub const STUDENT_DASHBOARD_PATH: &str = "/student/dashboard";
pub const TEACHER_DASHBOARD_PATH: &str = "/teacher/dashboard";

#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub path: &'static str,
    pub protected: bool,
    pub required_role: Option<Role>,
}

const ROUTES: &[RouteSpec] = &[
    RouteSpec { path: "/login", protected: false, required_role: None },
    RouteSpec { path: "/signup", protected: false, required_role: None },
    RouteSpec { path: DASHBOARD_PATH, protected: true, required_role: None },
    RouteSpec { path: STUDENT_DASHBOARD_PATH, protected: true, required_role: Some(Role::Student) },
    RouteSpec { path: "/student/homework", protected: true, required_role: Some(Role::Student) },
    RouteSpec { path: "/student/doubt", protected: true, required_role: Some(Role::Student) },
    RouteSpec { path: TEACHER_DASHBOARD_PATH, protected: true, required_role: Some(Role::Teacher) },
    RouteSpec { path: "/teacher/analytics", protected: true, required_role: Some(Role::Teacher) },
];

static ROUTE_INDEX: Lazy<HashMap<&'static str, &'static RouteSpec>> =
    Lazy::new(|| ROUTES.iter().map(|r| (r.path, r)).collect());

pub fn route_for(path: &str) -> Option<&'static RouteSpec> {
    ROUTE_INDEX.get(path).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Render(&'static str),
    Redirect(&'static str),
    /// Neutral waiting screen; identity or profile is still settling.
    Waiting,
}

/// Resolve a navigation request against the current snapshot. `/` and
/// unknown paths funnel into `/dashboard`, which then dispatches by role.
pub fn navigate(snapshot: &Snapshot, path: &str) -> NavOutcome {
    let Some(route) = route_for(path) else {
        return NavOutcome::Redirect(DASHBOARD_PATH);
    };
    if !route.protected {
        return NavOutcome::Render(route.path);
    }
    match gate::decide(snapshot, route.required_role) {
        GateDecision::Pending => NavOutcome::Waiting,
        GateDecision::Redirect(target) => NavOutcome::Redirect(target),
        GateDecision::Render => {
            if route.path == DASHBOARD_PATH {
                match snapshot.profile.as_ref().map(|p| p.role) {
                    Some(Role::Student) => NavOutcome::Redirect(STUDENT_DASHBOARD_PATH),
                    Some(Role::Teacher) => NavOutcome::Redirect(TEACHER_DASHBOARD_PATH),
                    // The profile lookup may still legitimately be settling
                    // even after loading flipped false; wait, do not bounce.
                    None => NavOutcome::Waiting,
                }
            } else {
                NavOutcome::Render(route.path)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub path: &'static str,
}

const STUDENT_MENU: &[MenuItem] = &[
    MenuItem { label: "Dashboard", path: STUDENT_DASHBOARD_PATH },
    MenuItem { label: "Homework", path: "/student/homework" },
    MenuItem { label: "Ask Doubt", path: "/student/doubt" },
];

const TEACHER_MENU: &[MenuItem] = &[
    MenuItem { label: "Dashboard", path: TEACHER_DASHBOARD_PATH },
    MenuItem { label: "Analytics", path: "/teacher/analytics" },
];

/// Sidebar entries for the given role.
pub fn menu_for(role: Role) -> &'static [MenuItem] {
    match role {
        Role::Student => STUDENT_MENU,
        Role::Teacher => TEACHER_MENU,
    }
}

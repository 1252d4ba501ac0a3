//! Central identity and session management for Homeroom.
//! Keep the public surface thin and split implementation across sub-modules.

mod gate;
mod principal;
mod provider;
mod resolver;
mod routes;
mod session;

pub use gate::{decide, GateDecision, DASHBOARD_PATH, LOGIN_PATH};
pub use principal::{Profile, ProfileFields, Role, Snapshot, User};
pub use provider::{
    AuthEvent, Filter, IdentityProvider, MemoryProvider, ProviderError, Row, Session,
    Subscription,
};
pub use resolver::{decode_profile, fetch_profile, profile_row, PROFILES_TABLE};
pub use routes::{menu_for, navigate, route_for, MenuItem, NavOutcome, RouteSpec};
pub use session::SessionManager;

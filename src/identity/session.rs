//! The session state machine. Owns the authoritative `{user, profile,
//! loading}` snapshot, reconciles the one-shot startup fetch with the
//! provider's push channel, and fences asynchronous profile lookups so a
//! stale resolution can never clobber a newer identity.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

use super::principal::{Profile, ProfileFields, Snapshot, User};
use super::provider::{AuthEvent, IdentityProvider, Row};
use super::resolver;

struct Inner {
    state: RwLock<Snapshot>,
    // Bumped on every push event; lets the startup fetch detect that it lost
    // the race against a live event.
    epoch: AtomicU64,
    // Bumped each time a profile lookup is issued. A completion applies only
    // if no later lookup exists, so two lookups for the same user are still
    // ordered by issue time, not completion time.
    lookup_gen: AtomicU64,
    torn_down: AtomicBool,
}

impl Inner {
    /// Reserve the generation for a lookup about to be spawned.
    fn issue_lookup(&self) -> u64 {
        self.lookup_gen.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply one push event to the snapshot. The `user` update is synchronous
    /// with the event; returns the user id whose profile must be resolved
    /// asynchronously, if any.
    fn apply_event(&self, event: AuthEvent) -> Option<String> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        match event {
            AuthEvent::SignedOut => {
                state.user = None;
                state.profile = None;
                state.loading = false;
                None
            }
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                // A profile belonging to a different identity must not
                // survive the switch, even for a frame.
                if state.profile.as_ref().map(|p| p.id.as_str()) != Some(session.user.id.as_str()) {
                    state.profile = None;
                }
                let uid = session.user.id.clone();
                state.user = Some(session.user);
                state.loading = false;
                Some(uid)
            }
        }
    }
}

/// Resolve the profile for `uid` and apply it only if this lookup is still
/// current when it completes: `uid` must match the current user and no later
/// lookup may have been issued since `gen` was reserved. Stale completions,
/// successful or failed, are dropped. With `settle`, `loading` is cleared in
/// the same write as the profile, so no reader can observe one without the
/// other.
async fn resolve_and_apply(
    provider: Arc<dyn IdentityProvider>,
    inner: Arc<Inner>,
    uid: String,
    gen: u64,
    settle: bool,
) {
    let result = resolver::fetch_profile(provider.as_ref(), &uid).await;
    let mut state = inner.state.write();
    if settle {
        state.loading = false;
    }
    if inner.torn_down.load(Ordering::SeqCst) {
        return;
    }
    if state.user.as_ref().map(|u| u.id.as_str()) != Some(uid.as_str())
        || gen != inner.lookup_gen.load(Ordering::SeqCst)
    {
        debug!(user = %uid, "discarding stale profile resolution");
        return;
    }
    match result {
        Ok(profile) => state.profile = profile,
        Err(e) => {
            // Authenticated but roleless; the access gate denies role-gated
            // screens until a later resolution succeeds.
            warn!(user = %uid, "profile lookup failed: {}", e);
            state.profile = None;
        }
    }
}

/// Role-aware session controller. One instance per running app; screens hold
/// it behind an `Arc` and read `snapshot()`.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    inner: Arc<Inner>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        SessionManager {
            provider,
            inner: Arc::new(Inner {
                state: RwLock::new(Snapshot::initial()),
                epoch: AtomicU64::new(0),
                lookup_gen: AtomicU64::new(0),
                torn_down: AtomicBool::new(false),
            }),
            pump: Mutex::new(None),
        }
    }

    /// Copy-on-read view of the current identity state.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.read().clone()
    }

    /// Subscribe to the push channel and resolve the stored session, if any.
    /// Call once at process start. Fails open to anonymous on provider
    /// errors; `loading` is guaranteed false when this returns.
    pub async fn initialize(&self) -> AppResult<()> {
        {
            let mut pump = self.pump.lock();
            if pump.is_some() {
                return Err(AppError::internal(
                    "already_initialized",
                    "initialize() may only be called once per SessionManager",
                ));
            }
            let mut sub = self.provider.subscribe();
            let provider = Arc::clone(&self.provider);
            let inner = Arc::clone(&self.inner);
            *pump = Some(tokio::spawn(async move {
                // Own the whole Subscription, not just `sub.events`: disjoint
                // capture would otherwise drop the unsubscribe guard here.
                let mut sub = sub;
                while let Some(event) = sub.events.recv().await {
                    if let Some(uid) = inner.apply_event(event) {
                        let gen = inner.issue_lookup();
                        let provider = Arc::clone(&provider);
                        let inner = Arc::clone(&inner);
                        tokio::spawn(resolve_and_apply(provider, inner, uid, gen, false));
                    }
                }
            }));
        }

        let start_epoch = self.inner.epoch.load(Ordering::SeqCst);
        match self.provider.get_session().await {
            Ok(Some(session)) => {
                let fresh = {
                    let mut state = self.inner.state.write();
                    // A push event that landed while the fetch was in flight
                    // is newer than the fetched session and wins.
                    if self.inner.epoch.load(Ordering::SeqCst) == start_epoch {
                        state.user = Some(session.user.clone());
                        true
                    } else {
                        false
                    }
                };
                if fresh {
                    let gen = self.inner.issue_lookup();
                    resolve_and_apply(
                        Arc::clone(&self.provider),
                        Arc::clone(&self.inner),
                        session.user.id,
                        gen,
                        true,
                    )
                    .await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("startup session fetch failed, continuing anonymous: {}", e);
            }
        }
        self.inner.state.write().loading = false;
        Ok(())
    }

    /// Create a credential, then insert the profile row keyed by the new user
    /// id. A `ProfileWrite` failure after the credential succeeded leaves an
    /// orphaned credential with no profile; the caller should retry the
    /// profile creation rather than ignore it.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        fields: ProfileFields,
    ) -> AppResult<User> {
        let user = self
            .provider
            .sign_up(email, password)
            .await
            .map_err(|e| AppError::auth("sign_up_failed", e.to_string()))?;
        let row = resolver::profile_row(&user, &fields);
        self.provider
            .insert(resolver::PROFILES_TABLE, vec![row])
            .await
            .map_err(|e| AppError::profile_write("profile_insert_failed", e.to_string()))?;
        // Resolve eagerly so the snapshot does not depend on whether the
        // push event's lookup ran before or after the insert above. This
        // generation postdates the insert, so a pump lookup that read the
        // table before the row existed can no longer apply.
        let gen = self.inner.issue_lookup();
        resolve_and_apply(
            Arc::clone(&self.provider),
            Arc::clone(&self.inner),
            user.id.clone(),
            gen,
            false,
        )
        .await;
        Ok(user)
    }

    /// Surfaces immediate failure only; on success the snapshot updates via
    /// the provider's push event, not this call.
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<()> {
        self.provider
            .sign_in(email, password)
            .await
            .map_err(|e| AppError::auth("invalid_credentials", e.to_string()))?;
        Ok(())
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        self.provider
            .sign_out()
            .await
            .map_err(|e| AppError::auth("sign_out_failed", e.to_string()))?;
        // Clear eagerly instead of waiting for the push event, shrinking the
        // window where stale role-gated UI could flash.
        self.inner.state.write().profile = None;
        Ok(())
    }

    /// Partial update of the current profile. The in-memory profile is
    /// replaced with the server-confirmed row, not the optimistic merge, so
    /// the snapshot never diverges from persisted state.
    pub async fn update_profile(&self, updates: Row) -> AppResult<Profile> {
        let uid = self
            .inner
            .state
            .read()
            .user
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or_else(|| AppError::auth("not_signed_in", "no current user"))?;
        let row = self
            .provider
            .update(resolver::PROFILES_TABLE, &uid, updates)
            .await
            .map_err(|e| AppError::profile_write("profile_update_failed", e.to_string()))?;
        let profile = resolver::decode_profile(row)?;
        let mut state = self.inner.state.write();
        if state.user.as_ref().map(|u| u.id.as_str()) == Some(uid.as_str()) {
            state.profile = Some(profile.clone());
        }
        Ok(profile)
    }

    /// Stop the event pump, drop the push subscription, and bar any still
    /// in-flight profile lookup from mutating the snapshot. Idempotent.
    pub fn teardown(&self) {
        self.inner.torn_down.store(true, Ordering::SeqCst);
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
            debug!("session event pump stopped");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

//! Identity provider contract plus the in-process reference implementation.
//! The session machine only depends on the `IdentityProvider` trait; the
//! hosted backend and `MemoryProvider` are interchangeable behind it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use super::principal::User;

/// Provider-issued proof of authentication. Replaced wholesale on every auth
/// event, never partially mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Push-channel payloads, delivered strictly in the order the provider
/// emits them.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email is already registered")]
    EmailTaken,
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("record store error: {0}")]
    RecordStore(String),
    #[error("no row with id {0}")]
    RowNotFound(String),
}

/// A generic record-store row. Tables are schemaless JSON objects; typed
/// decoding happens at the consumer.
pub type Row = Map<String, Value>;

/// Equality filter over one field, or no filter at all.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    field: Option<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Filter { field: None }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter { field: Some((field.into(), value.into())) }
    }

    pub fn field(&self) -> Option<(&str, &Value)> {
        self.field.as_ref().map(|(name, value)| (name.as_str(), value))
    }

    pub fn matches(&self, row: &Row) -> bool {
        match &self.field {
            None => true,
            Some((name, value)) => row.get(name) == Some(value),
        }
    }
}

/// Live hookup to the provider's push channel. Dropping it unsubscribes;
/// holders own the receiving end for their whole lifetime.
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<AuthEvent>,
    _guard: SubscriptionGuard,
}

impl Subscription {
    pub fn new(
        events: mpsc::UnboundedReceiver<AuthEvent>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Subscription { events, _guard: SubscriptionGuard { unsubscribe: Some(Box::new(unsubscribe)) } }
    }
}

struct SubscriptionGuard {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

/// External authentication service plus its generic record store.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// One-shot lookup of the current session, if any.
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Open the push channel. At most one live subscription should exist per
    /// session machine; a second without dropping the first means duplicate
    /// event delivery.
    fn subscribe(&self) -> Subscription;

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, ProviderError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError>;
    async fn sign_out(&self) -> Result<(), ProviderError>;

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, ProviderError>;
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), ProviderError>;
    async fn update(&self, table: &str, id: &str, fields: Row) -> Result<Row, ProviderError>;
}

// 128-bit random token, base64url without padding
fn gen_token() -> String {
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

fn hash_password(password: &str) -> Result<String, ProviderError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| ProviderError::Unreachable(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| ProviderError::Unreachable(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ProviderError::Unreachable(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

struct Credential {
    user: User,
    phc: String,
}

struct MemoryInner {
    ttl: Duration,
    // keyed by lowercased email
    creds: RwLock<HashMap<String, Credential>>,
    tables: RwLock<HashMap<String, Vec<Row>>>,
    session: RwLock<Option<Session>>,
    listeners: RwLock<HashMap<u64, mpsc::UnboundedSender<AuthEvent>>>,
    next_listener: AtomicU64,
}

/// In-process provider: Argon2 credential table, JSON record store, and a
/// fan-out push channel. Stands in for the hosted service in tests and the
/// demo binary.
#[derive(Clone)]
pub struct MemoryProvider {
    inner: Arc<MemoryInner>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(60 * 60))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        MemoryProvider {
            inner: Arc::new(MemoryInner {
                ttl,
                creds: RwLock::new(HashMap::new()),
                tables: RwLock::new(HashMap::new()),
                session: RwLock::new(None),
                listeners: RwLock::new(HashMap::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    fn emit(&self, event: AuthEvent) {
        let mut listeners = self.inner.listeners.write();
        listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    fn issue_session(&self, user: User) -> Session {
        let session = Session {
            access_token: gen_token(),
            expires_at: Utc::now() + chrono::Duration::from_std(self.inner.ttl).unwrap_or(chrono::Duration::hours(1)),
            user,
        };
        *self.inner.session.write() = Some(session.clone());
        session
    }

    /// Re-issue the current session's token and notify listeners, as the
    /// hosted service does periodically before expiry.
    pub fn refresh_token(&self) -> Option<Session> {
        let current = self.inner.session.read().clone()?;
        let refreshed = self.issue_session(current.user);
        self.emit(AuthEvent::TokenRefreshed(refreshed.clone()));
        Some(refreshed)
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryProvider {
    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        let session = self.inner.session.read().clone();
        match session {
            Some(s) if s.expires_at > Utc::now() => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().insert(id, tx);
        let inner = Arc::clone(&self.inner);
        Subscription::new(rx, move || {
            inner.listeners.write().remove(&id);
            debug!(listener = id, "push subscription dropped");
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, ProviderError> {
        let key = email.to_ascii_lowercase();
        let phc = hash_password(password)?;
        let user = User { id: uuid::Uuid::new_v4().to_string(), email: email.to_string() };
        {
            let mut creds = self.inner.creds.write();
            if creds.contains_key(&key) {
                return Err(ProviderError::EmailTaken);
            }
            creds.insert(key, Credential { user: user.clone(), phc });
        }
        // The hosted service signs the new account in immediately.
        let session = self.issue_session(user.clone());
        self.emit(AuthEvent::SignedIn(session));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError> {
        let key = email.to_ascii_lowercase();
        let user = {
            let creds = self.inner.creds.read();
            let cred = creds.get(&key).ok_or(ProviderError::InvalidCredentials)?;
            if !verify_password(&cred.phc, password) {
                return Err(ProviderError::InvalidCredentials);
            }
            cred.user.clone()
        };
        let session = self.issue_session(user);
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        *self.inner.session.write() = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, ProviderError> {
        let tables = self.inner.tables.read();
        let rows = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), ProviderError> {
        let mut tables = self.inner.tables.write();
        tables.entry(table.to_string()).or_default().extend(rows);
        Ok(())
    }

    async fn update(&self, table: &str, id: &str, fields: Row) -> Result<Row, ProviderError> {
        let mut tables = self.inner.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| ProviderError::RowNotFound(id.to_string()))?;
        for row in rows.iter_mut() {
            if row.get("id").and_then(|v| v.as_str()) == Some(id) {
                for (k, v) in fields {
                    row.insert(k, v);
                }
                return Ok(row.clone());
            }
        }
        Err(ProviderError::RowNotFound(id.to_string()))
    }
}

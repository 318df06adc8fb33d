//! # Session Store
//!
//! Holds the bearer token of the logged-in user and persists it across runs.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Session Ownership                              │
//! │                                                                         │
//! │  CLI shell ──login(token)/logout()──► SessionStore ──► TokenStorage     │
//! │                                          │  ▲          (session.json)   │
//! │                          subscribe()     │  │ current_token()           │
//! │                 ┌────────────────────────┘  │                           │
//! │                 ▼                           │                           │
//! │      watch::Receiver<AuthState>         HttpApi ──401──► invalidate()   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store is injected into the adapter at construction; nothing reads the
//! token from a global.
//!
//! ## Atomicity
//! Storage and the in-memory token are changed while one lock is held, so
//! no reader ever sees one of them holding a token and the other not. Auth
//! state subscribers are notified after both changed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};

// =============================================================================
// Auth State
// =============================================================================

/// What the shell should route on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No token held.
    Anonymous,
    /// A token is held and has not been rejected.
    Authenticated,
    /// The server rejected the token; the user must log in again.
    Expired,
}

impl AuthState {
    /// Returns true if protected screens may be shown.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

// =============================================================================
// Token Storage
// =============================================================================

/// Durable key/value storage for the session token.
pub trait TokenStorage: Send + Sync {
    /// Reads the value under `key`, if any.
    fn load(&self, key: &str) -> ClientResult<Option<String>>;

    /// Writes `value` under `key`.
    fn store(&self, key: &str, value: &str) -> ClientResult<()>;

    /// Deletes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> ClientResult<()>;
}

/// Storage backed by a small JSON object file.
///
/// Writes go to a sibling temp file which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTokenStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> ClientResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                ClientError::Storage(format!("{} is corrupt: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(map)
            .map_err(|e| ClientError::Storage(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn store(&self, key: &str, value: &str) -> ClientResult<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> ClientResult<MutexGuard<'_, BTreeMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| ClientError::Storage("memory storage lock poisoned".into()))
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> ClientResult<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.values()?.remove(key);
        Ok(())
    }
}

// =============================================================================
// Session Store
// =============================================================================

/// The single owner of the session token.
pub struct SessionStore {
    storage: Arc<dyn TokenStorage>,
    key: String,
    token: Mutex<Option<String>>,
    state_tx: watch::Sender<AuthState>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Opens the store and restores a previously persisted token.
    pub fn open(storage: Arc<dyn TokenStorage>, key: impl Into<String>) -> ClientResult<Self> {
        let key = key.into();
        let token = storage.load(&key)?.filter(|t| !t.trim().is_empty());

        let state = if token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        };
        debug!(key = %key, ?state, "Session restored");

        let (state_tx, _) = watch::channel(state);
        Ok(SessionStore {
            storage,
            key,
            token: Mutex::new(token),
            state_tx,
        })
    }

    /// An ephemeral store, for tests and one-off runs.
    pub fn in_memory() -> Self {
        let (state_tx, _) = watch::channel(AuthState::Anonymous);
        SessionStore {
            storage: Arc::new(MemoryTokenStorage::new()),
            key: dosely_core::DEFAULT_TOKEN_KEY.to_string(),
            token: Mutex::new(None),
            state_tx,
        }
    }

    fn token_guard(&self) -> ClientResult<MutexGuard<'_, Option<String>>> {
        self.token
            .lock()
            .map_err(|_| ClientError::Storage("session lock poisoned".into()))
    }

    /// Stores a freshly issued token.
    pub fn login(&self, token: &str) -> ClientResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ClientError::Storage("refusing to store an empty token".into()));
        }

        {
            let mut guard = self.token_guard()?;
            self.storage.store(&self.key, token)?;
            *guard = Some(token.to_string());
        }

        self.state_tx.send_replace(AuthState::Authenticated);
        info!("Logged in");
        Ok(())
    }

    /// Forgets the token at the user's request.
    pub fn logout(&self) -> ClientResult<()> {
        self.clear()?;
        self.state_tx.send_replace(AuthState::Anonymous);
        info!("Logged out");
        Ok(())
    }

    /// Forgets a token the server rejected.
    ///
    /// Subscribers see [`AuthState::Expired`] so the shell can route to login.
    pub fn invalidate(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "Failed to clear rejected token from storage");
        }
        self.state_tx.send_replace(AuthState::Expired);
        warn!("Session token rejected by server");
    }

    /// Forgets `token` after the server rejected it, unless the session has
    /// already moved on to another token. Returns true if it was forgotten.
    pub fn invalidate_token(&self, token: &str) -> bool {
        let cleared = match self.token_guard() {
            Ok(mut guard) if guard.as_deref() == Some(token) => {
                if let Err(e) = self.storage.remove(&self.key) {
                    warn!(error = %e, "Failed to clear rejected token from storage");
                }
                *guard = None;
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "Session lock unavailable, token kept");
                false
            }
        };

        if cleared {
            self.state_tx.send_replace(AuthState::Expired);
            warn!("Session token rejected by server");
        } else {
            debug!("Rejected token is no longer current, session kept");
        }
        cleared
    }

    fn clear(&self) -> ClientResult<()> {
        let mut guard = self.token_guard()?;
        let removed = self.storage.remove(&self.key);
        // Memory is cleared even if storage fails.
        *guard = None;
        removed
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    pub fn current_token(&self) -> Option<String> {
        self.token_guard().ok().and_then(|guard| guard.clone())
    }

    pub fn state(&self) -> AuthState {
        *self.state_tx.borrow()
    }

    /// Receives every auth state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }
}

//! Session Store
//!
//! Process-wide authenticated-session state: the access/refresh token pair and
//! the identity record the ledger returns for the logged-in customer. One store
//! instance is shared (behind `Arc`) by the gateway and both state machines;
//! only the credential flow writes to it, and only on terminal success.
//!
//! The store survives restarts through a JSON snapshot under a fixed storage
//! name, rehydrated at open with no network call. Absent or corrupt snapshot
//! means logged out.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Fixed storage name for the persisted session record.
pub const STORAGE_NAME: &str = "luisbank-auth";

/// Identity record owned by the ledger service. Treated as a value object;
/// `id` doubles as the default originating account for self-service transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
    pub cpf_masked: String,
    pub mfa_enabled: bool,
}

/// In-memory session state. `is_authenticated` is derived, never stored, so no
/// state can exist where it is true without an access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
    pub identity: Option<Identity>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// On-disk envelope: `{"state": {...}}`, absence means logged out.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    state: Session,
}

type Subscriber = Box<dyn Fn(&Session) + Send + Sync>;

/// Owned, observable session container.
///
/// All mutation goes through [`login`](Self::login),
/// [`set_identity`](Self::set_identity) and [`logout`](Self::logout); each one
/// updates the state atomically under a single lock, rewrites the snapshot,
/// then notifies subscribers with the new state.
pub struct SessionStore {
    path: Option<PathBuf>,
    inner: Mutex<Session>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SessionStore {
    /// Open the store backed by `<dir>/luisbank-auth.json`, rehydrating any
    /// previous session. Never touches the network.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(format!("{STORAGE_NAME}.json"));
        let session = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<PersistedRecord>(&raw) {
                Ok(record) => {
                    debug!(authenticated = record.state.is_authenticated(), "session rehydrated");
                    record.state
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt session snapshot, starting logged out");
                    Session::default()
                }
            },
            Err(_) => Session::default(),
        };
        Self {
            path: Some(path),
            inner: Mutex::new(session),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Store with no persistence, for tests and ephemeral processes.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Session::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Record a successful credential flow: both tokens set in one step.
    /// Any identity already present (from a previous session) is kept until
    /// the follow-up identity read replaces it.
    pub fn login(&self, access_token: String, refresh_token: String) {
        let snapshot = {
            let mut session = self.inner.lock().unwrap();
            session.access_token = Some(access_token);
            session.refresh_token = Some(refresh_token);
            session.clone()
        };
        info!("session established");
        self.persist(&snapshot);
        self.notify(&snapshot);
    }

    /// Refresh the identity record (e.g. after the follow-up `me` read).
    pub fn set_identity(&self, identity: Identity) {
        let snapshot = {
            let mut session = self.inner.lock().unwrap();
            session.identity = Some(identity);
            session.clone()
        };
        self.persist(&snapshot);
        self.notify(&snapshot);
    }

    /// Clear the session and void the persisted record. Idempotent.
    pub fn logout(&self) {
        let snapshot = {
            let mut session = self.inner.lock().unwrap();
            *session = Session::default();
            session.clone()
        };
        if let Some(path) = &self.path
            && let Err(e) = fs::remove_file(path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "failed to remove session snapshot");
        }
        info!("session cleared");
        self.notify(&snapshot);
    }

    pub fn snapshot(&self) -> Session {
        self.inner.lock().unwrap().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().unwrap().is_authenticated()
    }

    /// Current access token, attached by the gateway to every request.
    pub fn bearer_token(&self) -> Option<String> {
        self.inner.lock().unwrap().access_token.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.lock().unwrap().identity.clone()
    }

    /// Register an observer invoked with the new state after every mutation.
    pub fn subscribe(&self, f: impl Fn(&Session) + Send + Sync + 'static) {
        self.subscribers.lock().unwrap().push(Box::new(f));
    }

    fn persist(&self, session: &Session) {
        let Some(path) = &self.path else { return };
        let record = PersistedRecord {
            state: session.clone(),
        };
        let write = serde_json::to_string_pretty(&record)
            .map_err(std::io::Error::other)
            .and_then(|json| fs::write(path, json));
        if let Err(e) = write {
            // Storage is best effort: the in-memory session stays valid.
            warn!(path = %path.display(), error = %e, "failed to persist session snapshot");
        }
    }

    fn notify(&self, session: &Session) {
        for subscriber in self.subscribers.lock().unwrap().iter() {
            subscriber(session);
        }
    }
}

//! Idempotency Key Provider
//!
//! Every money-movement attempt carries one client-generated key so the ledger
//! can collapse duplicate executions of the same logical intent. The key is
//! created exactly once per pending operation, never per HTTP call.
//!
//! Two sources exist: the secure OS-random UUID path, and a pseudo-random
//! RFC-4122-shaped fallback for runtimes without an entropy source. The key's
//! only required property is practical uniqueness per user session, so the
//! fallback is acceptable. Selection happens once at startup via
//! [`detect_key_source`], not inline at call sites.

use std::fmt;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 36-character version-4-UUID-shaped token attached to side-effecting requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of idempotency keys.
pub trait KeySource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &'static str;

    /// Generate a fresh key. Called once per pending operation.
    fn new_key(&self) -> IdempotencyKey;
}

/// Primary source: cryptographically secure random v4 UUIDs.
pub struct OsRandomKeys;

impl KeySource for OsRandomKeys {
    fn name(&self) -> &'static str {
        "os-random"
    }

    fn new_key(&self) -> IdempotencyKey {
        IdempotencyKey(uuid::Uuid::new_v4().to_string())
    }
}

/// Fallback source: synthesizes the RFC-4122 v4 shape from a seeded PRNG.
///
/// Not unguessable, and does not need to be: the server keys its dedup window
/// on the string, so uniqueness per session is the whole contract.
pub struct PseudoRandomKeys {
    rng: Mutex<StdRng>,
}

impl PseudoRandomKeys {
    pub fn new() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed);
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for PseudoRandomKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for PseudoRandomKeys {
    fn name(&self) -> &'static str {
        "pseudo-random"
    }

    fn new_key(&self) -> IdempotencyKey {
        const HEX: &[u8] = b"0123456789abcdef";
        let mut rng = self.rng.lock().unwrap();
        let mut out = String::with_capacity(36);
        for c in "xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx".chars() {
            match c {
                'x' => out.push(HEX[rng.gen_range(0..16)] as char),
                // Variant nibble: 10xx -> one of 8, 9, a, b
                'y' => out.push(HEX[rng.gen_range(0..4) | 0x8] as char),
                fixed => out.push(fixed),
            }
        }
        IdempotencyKey(out)
    }
}

/// Probe the secure source once and pick the implementation for this process.
///
/// `uuid::Uuid::new_v4` aborts the generator when the OS exposes no entropy
/// source; the probe catches that single failure and falls back.
pub fn detect_key_source() -> Box<dyn KeySource> {
    match std::panic::catch_unwind(uuid::Uuid::new_v4) {
        Ok(_) => Box::new(OsRandomKeys),
        Err(_) => {
            warn!("secure UUID source unavailable, using pseudo-random idempotency keys");
            Box::new(PseudoRandomKeys::new())
        }
    }
}

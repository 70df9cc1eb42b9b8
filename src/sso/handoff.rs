use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::user::TokenPair;

pub const HANDOFF_KEY_LEN: usize = 32;
pub const HANDOFF_TTL: Duration = Duration::from_secs(10);

/// What a handoff key redeems to: session credentials, or the reason none were issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandoffPayload {
    Credentials(TokenPair),
    Error { status: String, message: String },
}

impl HandoffPayload {
    pub fn error(message: impl Into<String>) -> Self {
        HandoffPayload::Error {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    payload: HandoffPayload,
    expires_at: Instant,
}

/// Process-wide, time-bound store of single-use handoff keys.
///
/// Writers are SSO callbacks, readers are redemptions. `take` removes the entry
/// under the lock, so two racing redemptions of one key see the payload at most once.
#[derive(Debug, Clone)]
pub struct HandoffStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl Default for HandoffStore {
    fn default() -> Self {
        Self::new(HANDOFF_TTL)
    }
}

impl HandoffStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Binds `payload` to a fresh random key and returns the key.
    pub fn issue(&self, payload: HandoffPayload) -> String {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at > now);

        let key = loop {
            let candidate = generate_key();
            if !entries.contains_key(&candidate) {
                break candidate;
            }
        };

        entries.insert(
            key.clone(),
            Entry {
                payload,
                expires_at: now + self.ttl,
            },
        );
        key
    }

    /// Atomically removes and returns the payload. Unknown, expired and already
    /// consumed keys are indistinguishable and all yield `None`.
    pub fn take(&self, key: &str) -> Option<HandoffPayload> {
        let entry = self.lock().remove(key)?;
        (entry.expires_at > Instant::now()).then_some(entry.payload)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned map still holds valid entries; keep serving it.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 32 characters drawn uniformly from `[A-Za-z0-9]`.
pub fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(HANDOFF_KEY_LEN)
        .map(char::from)
        .collect()
}

//! Session-scoped JWT token cache.
//!
//! The REST API requires a guest JWT per institution. Tokens live in a
//! cache keyed by institution code, injected into the connector instead of
//! being read from an ambient session container; the surrounding session
//! store provides per-user isolation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Storage interface for session-scoped JWT tokens
pub trait TokenCache: Send + Sync + std::fmt::Debug {
    /// A cached, unexpired token for the institution, if any
    fn get(&self, institution: &str) -> Option<String>;

    /// Store a freshly issued token
    fn set(&self, institution: &str, token: String);

    /// Invalidate the cached token (after a 403)
    fn clear(&self, institution: &str);
}

/// In-memory token cache with a local expiry clock.
///
/// The wire token is opaque, so expiry is tracked locally with a
/// configurable lifetime rather than decoding the JWT.
#[derive(Debug)]
pub struct MemoryTokenCache {
    ttl: Duration,
    tokens: Mutex<HashMap<String, (Instant, String)>>,
}

impl MemoryTokenCache {
    /// Create a token cache with the given token lifetime
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryTokenCache {
    fn default() -> Self {
        // Primo guest JWTs are valid for an hour
        Self::new(Duration::from_secs(3600))
    }
}

impl TokenCache for MemoryTokenCache {
    fn get(&self, institution: &str) -> Option<String> {
        let tokens = self.tokens.lock().ok()?;
        match tokens.get(institution) {
            Some((issued_at, token)) if issued_at.elapsed() < self.ttl => Some(token.clone()),
            _ => None,
        }
    }

    fn set(&self, institution: &str, token: String) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(institution.to_string(), (Instant::now(), token));
        }
    }

    fn clear(&self, institution: &str) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.remove(institution);
        }
    }
}

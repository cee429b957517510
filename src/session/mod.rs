//! Session module - per-user conversation state
//!
//! Each session key maps to its own [`ConversationSession`] behind its own
//! async mutex, so two users never see each other's history or transcript
//! and one slow request only blocks its own session.
//!
//! # Example
//!
//! ```
//! use clipchat::history::Turn;
//! use clipchat::session::SessionManager;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = SessionManager::new();
//!     let session = manager.get_or_create("tab-1").await.unwrap();
//!
//!     let mut guard = session.lock().await;
//!     guard.set_transcript("0:00:00 --> 0:00:04: Welcome");
//!     let epoch = guard.epoch();
//!     assert!(guard.append_if_current(epoch, Turn::new("Hi", "Hello!")));
//! }
//! ```

pub mod types;

pub use types::{ConversationSession, SessionSnapshot};

use crate::config::DEFAULT_MAX_STORED_TURNS;
use crate::error::{ClipchatError, Result};
use crate::log_component;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Session key used when the client does not send one.
pub const DEFAULT_SESSION_KEY: &str = "default";

/// Longest accepted session key, in characters.
pub const MAX_SESSION_KEY_CHARS: usize = 128;

/// A session shared between the manager and in-flight requests.
pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// In-memory registry of conversation sessions.
///
/// Cloning is cheap and every clone sees the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
    max_turns: usize,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_max_turns(DEFAULT_MAX_STORED_TURNS)
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager whose sessions keep at most `max_turns` turns each.
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_turns,
        }
    }

    /// Get an existing session or create an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`ClipchatError::Session`] if `key` is empty, too long, or
    /// contains control characters.
    pub async fn get_or_create(&self, key: &str) -> Result<SharedSession> {
        validate_key(key)?;

        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(key) {
                return Ok(Arc::clone(session));
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have created it between the two locks.
        let session = sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                log_component!(debug, "session", "Session created", key = key);
                Arc::new(Mutex::new(
                    ConversationSession::new(key).with_max_turns(self.max_turns),
                ))
            })
            .clone();
        Ok(session)
    }

    /// Get a session by key without creating it.
    pub async fn get(&self, key: &str) -> Option<SharedSession> {
        let sessions = self.sessions.read().await;
        sessions.get(key).cloned()
    }

    /// Remove a session. Returns `true` if it existed.
    ///
    /// Requests already holding the session keep working on their copy of
    /// the `Arc`; their results are simply not visible to later requests.
    pub async fn delete(&self, key: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(key).is_some()
    }

    /// All session keys, sorted.
    pub async fn list(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut keys: Vec<String> = sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop sessions untouched for longer than `max_idle`.
    ///
    /// Sessions whose lock is currently held are in use and are skipped.
    /// Returns the number of sessions removed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = chrono::Utc::now();
        let limit = max_idle.as_secs();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => guard.idle_secs(now) <= limit,
            Err(_) => true,
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            log_component!(
                info,
                "session",
                "Evicted idle sessions",
                evicted = evicted,
                remaining = sessions.len(),
            );
        }
        evicted
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ClipchatError::Session("session key is empty".into()));
    }
    if key.chars().count() > MAX_SESSION_KEY_CHARS {
        return Err(ClipchatError::Session(format!(
            "session key longer than {} characters",
            MAX_SESSION_KEY_CHARS
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(ClipchatError::Session(
            "session key contains control characters".into(),
        ));
    }
    Ok(())
}

/// Make a session key safe to embed in a file name.
///
/// Path separators and other characters that are special on common
/// filesystems are percent-encoded, and `%` itself is escaped so distinct
/// keys never collide.
///
/// ```
/// use clipchat::session::sanitize_key;
///
/// assert_eq!(sanitize_key("user:42"), "user%3A42");
/// assert_eq!(sanitize_key("../etc"), "..%2Fetc");
/// ```
pub fn sanitize_key(key: &str) -> String {
    let mut result = String::with_capacity(key.len() * 3);
    for c in key.chars() {
        match c {
            '/' => result.push_str("%2F"),
            '\\' => result.push_str("%5C"),
            ':' => result.push_str("%3A"),
            '*' => result.push_str("%2A"),
            '?' => result.push_str("%3F"),
            '"' => result.push_str("%22"),
            '<' => result.push_str("%3C"),
            '>' => result.push_str("%3E"),
            '|' => result.push_str("%7C"),
            ' ' => result.push_str("%20"),
            '%' => result.push_str("%25"),
            c => result.push(c),
        }
    }
    result
}

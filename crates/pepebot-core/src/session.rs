//! Session store: per-key history, summary, and JSON persistence.
//!
//! Maps `session_key → Session` with per-key async locks, so turns on
//! different sessions never contend. Each session persists as one JSON
//! document at `{sessions_dir}/{percent-encoded key}.json`, written via
//! temp-file + rename so an ill-timed restart cannot leave a torn file.
//! A corrupt file fails only that session: it is logged and replaced
//! with a fresh one, never propagated to the caller.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use percent_encoding::{percent_decode_str, percent_encode, NON_ALPHANUMERIC};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use pepebot_types::error::PepebotError;
use pepebot_types::message::ChatMessage;
use pepebot_types::session::Session;

/// A session key with its message count and last-updated timestamp,
/// as returned by [`SessionStore::list`].
#[derive(Debug, Clone)]
pub struct SessionListing {
    /// The session key.
    pub key: String,
    /// Number of messages currently in the history.
    pub message_count: usize,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Disk-backed store of conversation sessions.
pub struct SessionStore {
    sessions_dir: PathBuf,
    entries: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    /// Create a store rooted at the given directory. The directory is
    /// created on first save.
    pub fn new(sessions_dir: PathBuf) -> Self {
        Self {
            sessions_dir,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The sessions directory.
    pub fn sessions_dir(&self) -> &PathBuf {
        &self.sessions_dir
    }

    /// Get the per-key entry, loading from disk on first reference.
    ///
    /// Sessions are created lazily: an unknown key yields an empty
    /// session. A corrupt file is logged and replaced with a fresh
    /// session rather than failing the store.
    async fn entry(&self, key: &str) -> Arc<Mutex<Session>> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            return entry.clone();
        }

        let session = match self.read_from_disk(key).await {
            Ok(Some(session)) => {
                debug!(key, messages = session.messages.len(), "loaded session from disk");
                session
            }
            Ok(None) => Session::new(key),
            Err(e) => {
                warn!(key, error = %e, "corrupt session file, starting fresh");
                Session::new(key)
            }
        };

        let entry = Arc::new(Mutex::new(session));
        entries.insert(key.to_string(), entry.clone());
        entry
    }

    /// Return a snapshot of the session, creating it when absent.
    pub async fn get_or_create(&self, key: &str) -> Session {
        let entry = self.entry(key).await;
        let session = entry.lock().await;
        session.clone()
    }

    /// Snapshot copy of the message history.
    pub async fn get_history(&self, key: &str) -> Vec<ChatMessage> {
        let entry = self.entry(key).await;
        let session = entry.lock().await;
        session.messages.clone()
    }

    /// The stored summary (empty when none).
    pub async fn get_summary(&self, key: &str) -> String {
        let entry = self.entry(key).await;
        let session = entry.lock().await;
        session.summary.clone()
    }

    /// Append a message with the given role and plain-text content.
    pub async fn append(&self, key: &str, role: &str, content: &str) {
        self.append_message(key, ChatMessage::new(role, content)).await;
    }

    /// Append a full message (multi-block content, tool calls, ...).
    pub async fn append_message(&self, key: &str, message: ChatMessage) {
        let entry = self.entry(key).await;
        let mut session = entry.lock().await;
        session.add(message);
    }

    /// Replace the summary.
    pub async fn set_summary(&self, key: &str, text: &str) {
        let entry = self.entry(key).await;
        let mut session = entry.lock().await;
        session.summary = text.to_string();
        session.updated_at = Utc::now();
    }

    /// Retain only the last `keep_tail` messages.
    pub async fn truncate_history(&self, key: &str, keep_tail: usize) {
        let entry = self.entry(key).await;
        let mut session = entry.lock().await;
        session.truncate_to_tail(keep_tail);
    }

    /// Drop history and summary.
    pub async fn clear(&self, key: &str) {
        let entry = self.entry(key).await;
        let mut session = entry.lock().await;
        session.clear();
    }

    /// Run a closure against the locked session and persist the result.
    ///
    /// Used by the agent loop to commit a whole turn (user + assistant)
    /// atomically against concurrent summarization.
    pub async fn update_and_save<F>(&self, key: &str, f: F) -> Result<(), PepebotError>
    where
        F: FnOnce(&mut Session),
    {
        let entry = self.entry(key).await;
        let mut session = entry.lock().await;
        f(&mut session);
        self.write_to_disk(&session).await
    }

    /// Persist the session to its JSON file.
    pub async fn save(&self, key: &str) -> Result<(), PepebotError> {
        let entry = self.entry(key).await;
        let session = entry.lock().await;
        self.write_to_disk(&session).await
    }

    /// Enumerate stored sessions (disk and memory merged).
    pub async fn list(&self) -> Result<Vec<SessionListing>, PepebotError> {
        let mut listings: HashMap<String, SessionListing> = HashMap::new();

        // Disk first: sessions from previous runs.
        if self.sessions_dir.is_dir() {
            let mut dir = tokio::fs::read_dir(&self.sessions_dir).await?;
            while let Some(dirent) = dir.next_entry().await? {
                let name = dirent.file_name().to_string_lossy().into_owned();
                let Some(stem) = name.strip_suffix(".json") else {
                    continue;
                };
                let Ok(key) = percent_decode_str(stem).decode_utf8() else {
                    warn!(filename = %name, "skipping undecodable session filename");
                    continue;
                };
                let key = key.into_owned();
                match self.read_from_disk(&key).await {
                    Ok(Some(session)) => {
                        listings.insert(
                            key.clone(),
                            SessionListing {
                                key,
                                message_count: session.messages.len(),
                                updated_at: session.updated_at,
                            },
                        );
                    }
                    Ok(None) => {}
                    Err(e) => warn!(key = %key, error = %e, "skipping corrupt session file"),
                }
            }
        }

        // In-memory entries override disk (they may be newer).
        let entries = self.entries.lock().await;
        for (key, entry) in entries.iter() {
            let session = entry.lock().await;
            listings.insert(
                key.clone(),
                SessionListing {
                    key: key.clone(),
                    message_count: session.messages.len(),
                    updated_at: session.updated_at,
                },
            );
        }

        let mut result: Vec<SessionListing> = listings.into_values().collect();
        result.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(result)
    }

    /// Compute the file path for a session key (reversible encoding).
    fn session_path(&self, key: &str) -> PathBuf {
        let encoded = percent_encode(key.as_bytes(), NON_ALPHANUMERIC).to_string();
        self.sessions_dir.join(format!("{encoded}.json"))
    }

    async fn read_from_disk(&self, key: &str) -> Result<Option<Session>, PepebotError> {
        let path = self.session_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    /// Write via temp file + rename so restarts never observe a torn
    /// session file.
    async fn write_to_disk(&self, session: &Session) -> Result<(), PepebotError> {
        tokio::fs::create_dir_all(&self.sessions_dir).await?;
        let path = self.session_path(&session.key);
        let tmp = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(key = %session.key, "saved session");
        Ok(())
    }
}

//! On-disk chat session snapshots.
//!
//! One pretty-printed JSON file per session, `<dir>/<session_id>.json`,
//! rewritten in full on every save. Timestamps are RFC 3339 with full
//! precision, so a loaded session equals the one that was saved.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ragline_core::chat::ChatSession;
use ragline_core::{Error, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            message_count: session.messages.len(),
        }
    }
}

pub struct SessionStore {
    dir: PathBuf,
}

/// Session ids become file names; reject anything that could escape `dir`.
fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && !session_id.starts_with('.')
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid session id: {:?}", session_id)))
    }
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{}.json", session_id)))
    }

    pub fn save(&self, session: &ChatSession) -> Result<()> {
        let path = self.path_for(&session.session_id)?;
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(session)?;
        // Write then rename so a crash never leaves a truncated snapshot.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!(session_id = %session.session_id, "saved session");
        Ok(())
    }

    pub fn load(&self, session_id: &str) -> Result<Option<ChatSession>> {
        let path = self.path_for(session_id)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Saved sessions, most recently updated first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions = Vec::new();
        for path in self.session_files()? {
            let parsed = std::fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|content| Ok(serde_json::from_str::<ChatSession>(&content)?));
            match parsed {
                Ok(session) => sessions.push(SessionSummary::from(&session)),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable session file")
                }
            }
        }
        sessions.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(sessions)
    }

    /// Returns whether a snapshot existed.
    pub fn delete(&self, session_id: &str) -> Result<bool> {
        let path = self.path_for(session_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every snapshot; returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let files = self.session_files()?;
        for path in &files {
            std::fs::remove_file(path)?;
        }
        Ok(files.len())
    }

    fn session_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::chat::Role;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_path_like_ids() {
        assert!(validate_session_id("../etc/passwd").is_err());
        assert!(validate_session_id("a/b").is_err());
        assert!(validate_session_id("a\\b").is_err());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id(".hidden").is_err());
        assert!(validate_session_id("6f1c9a4e-2b7d-4c1e-9f00-0a1b2c3d4e5f").is_ok());
    }

    #[test]
    fn test_load_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        assert!(store.load("nope").unwrap().is_none());
        assert!(!store.delete("nope").unwrap());
    }

    #[test]
    fn test_list_skips_garbage() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let mut session = ChatSession::with_id("s1");
        session.add_message(Role::User, "hello");
        store.save(&session).unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{not json").unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].session_id, "s1");
        assert_eq!(list[0].message_count, 1);
    }
}

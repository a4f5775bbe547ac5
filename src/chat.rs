//! Non-grounded multi-turn chat.
//!
//! The prompt is built purely from the session's own recent history; no
//! retrieval happens here. Sessions live in a bounded in-memory map and,
//! when a [`SessionStore`] is attached, are snapshotted to disk after every
//! completed exchange.
//!
//! A session with a generation in flight is never evicted.
//!
//! A turn appends the user message first. The assistant message is only
//! appended once a generation completes: a failed call, a stream that
//! errors, or a stream whose consumer goes away leaves the session ending
//! on the user message.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ragline_core::chat::{ChatSession, Role};
use ragline_core::prompt::chat_prompt;
use ragline_core::{Error, Result};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::llm::{FragmentStream, LanguageModel};
use crate::session_store::SessionStore;

/// Forwarding capacity between the model stream and the chat consumer.
/// Kept at one so a consumer that stops reading is noticed promptly.
const FORWARD_BUFFER: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String,
}

/// Live sessions plus a count of generations running against each.
#[derive(Default)]
struct LiveSessions {
    sessions: HashMap<String, ChatSession>,
    in_flight: HashMap<String, usize>,
}

/// Session map shared with stream forwarding tasks.
struct Sessions {
    live: Mutex<LiveSessions>,
    store: Option<SessionStore>,
    max_sessions: usize,
}

impl Sessions {
    fn lock(&self) -> Result<MutexGuard<'_, LiveSessions>> {
        self.live
            .lock()
            .map_err(|_| Error::store("session map lock poisoned"))
    }

    fn persist(&self, session: &ChatSession) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(session) {
                tracing::warn!(session_id = %session.session_id, error = %e, "failed to save session");
            }
        }
    }

    /// Insert, evicting the least recently updated idle session when full.
    ///
    /// Sessions with a generation in flight are never evicted; if every
    /// live session is busy the map grows past `max_sessions` until one
    /// of them finishes.
    fn insert(&self, session: ChatSession) -> Result<()> {
        let evicted = {
            let mut live = self.lock()?;
            let LiveSessions {
                sessions,
                in_flight,
            } = &mut *live;
            let evicted = if !sessions.contains_key(&session.session_id)
                && sessions.len() >= self.max_sessions
            {
                let oldest = sessions
                    .values()
                    .filter(|s| !in_flight.contains_key(&s.session_id))
                    .min_by_key(|s| s.updated_at)
                    .map(|s| s.session_id.clone());
                oldest.and_then(|id| sessions.remove(&id))
            } else {
                None
            };
            sessions.insert(session.session_id.clone(), session);
            evicted
        };
        if let Some(evicted) = evicted {
            tracing::debug!(session_id = %evicted.session_id, "evicted session");
            self.persist(&evicted);
        }
        Ok(())
    }

    /// Make `session_id` live, loading it from disk if needed.
    fn activate(&self, session_id: &str) -> Result<()> {
        if self.lock()?.sessions.contains_key(session_id) {
            return Ok(());
        }
        let loaded = match &self.store {
            Some(store) => store.load(session_id)?,
            None => None,
        };
        match loaded {
            Some(session) => self.insert(session),
            None => Err(Error::SessionNotFound(session_id.to_string())),
        }
    }

    /// Apply `f` to a live session, then snapshot it.
    fn update<T>(&self, session_id: &str, f: impl FnOnce(&mut ChatSession) -> T) -> Result<T> {
        let (out, snapshot) = {
            let mut live = self.lock()?;
            let session = live
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
            let out = f(session);
            (out, session.clone())
        };
        self.persist(&snapshot);
        Ok(out)
    }

    /// Append the user message, pin the session and render the prompt.
    fn begin_turn(
        self: &Arc<Self>,
        session_id: &str,
        message: &str,
        max_history: usize,
    ) -> Result<(Turn, String)> {
        let mut live = self.lock()?;
        let session = live
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        session.add_message(Role::User, message);
        let prompt = chat_prompt(session.history(max_history));
        *live.in_flight.entry(session_id.to_string()).or_insert(0) += 1;
        let turn = Turn {
            sessions: Arc::clone(self),
            session_id: session_id.to_string(),
        };
        Ok((turn, prompt))
    }

    fn release(&self, session_id: &str) {
        let Ok(mut live) = self.live.lock() else {
            return;
        };
        if let Some(count) = live.in_flight.get_mut(session_id) {
            *count -= 1;
            if *count == 0 {
                live.in_flight.remove(session_id);
            }
        }
    }
}

/// A generation in progress. Keeps its session pinned in memory until
/// dropped, so the reply always lands in the session that asked for it.
struct Turn {
    sessions: Arc<Sessions>,
    session_id: String,
}

impl Turn {
    fn complete(self, reply: String) -> Result<()> {
        self.sessions
            .update(&self.session_id, |s| s.add_message(Role::Assistant, reply))
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.sessions.release(&self.session_id);
    }
}

pub struct ChatEngine {
    llm: Arc<dyn LanguageModel>,
    sessions: Arc<Sessions>,
    max_history: usize,
}

impl ChatEngine {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        max_history: usize,
        max_sessions: usize,
        store: Option<SessionStore>,
    ) -> Self {
        Self {
            llm,
            sessions: Arc::new(Sessions {
                live: Mutex::new(LiveSessions::default()),
                store,
                max_sessions: max_sessions.max(1),
            }),
            max_history,
        }
    }

    pub fn create_session(&self) -> Result<String> {
        let session = ChatSession::new();
        let session_id = session.session_id.clone();
        self.sessions.insert(session)?;
        tracing::debug!(session_id = %session_id, "created session");
        Ok(session_id)
    }

    fn resolve(&self, session_id: Option<&str>) -> Result<String> {
        match session_id {
            Some(id) => {
                self.sessions.activate(id)?;
                Ok(id.to_string())
            }
            None => self.create_session(),
        }
    }

    /// Send `message` and wait for the full reply. `None` starts a new session.
    pub async fn chat(&self, session_id: Option<&str>, message: &str) -> Result<ChatReply> {
        let session_id = self.resolve(session_id)?;
        let (turn, prompt) = self
            .sessions
            .begin_turn(&session_id, message, self.max_history)?;
        let reply = self.llm.invoke(&prompt).await?;
        turn.complete(reply.clone())?;
        Ok(ChatReply { session_id, reply })
    }

    /// Send `message` and stream the reply.
    ///
    /// The assistant message is recorded when the model finishes, before the
    /// returned stream closes, and only if the consumer is still attached.
    pub async fn chat_stream(
        &self,
        session_id: Option<&str>,
        message: &str,
    ) -> Result<(String, FragmentStream)> {
        let session_id = self.resolve(session_id)?;
        let (turn, prompt) = self
            .sessions
            .begin_turn(&session_id, message, self.max_history)?;
        let mut upstream = self.llm.stream(&prompt).await?;

        let (tx, rx) = mpsc::channel(FORWARD_BUFFER);
        let id = session_id.clone();
        tokio::spawn(async move {
            let mut reply = String::new();
            while let Some(item) = upstream.recv().await {
                match item {
                    Ok(fragment) => {
                        reply.push_str(&fragment);
                        if tx.send(Ok(fragment)).await.is_err() {
                            tracing::debug!(session_id = %id, "chat consumer dropped");
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
            if tx.is_closed() {
                return;
            }
            if let Err(e) = turn.complete(reply) {
                tracing::warn!(session_id = %id, error = %e, "could not record reply");
            }
            drop(tx);
        });

        Ok((session_id, rx))
    }

    pub fn clear_history(&self, session_id: &str) -> Result<()> {
        self.sessions.activate(session_id)?;
        self.sessions.update(session_id, |s| s.clear_history())
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        if let Some(session) = self.sessions.lock()?.sessions.get(session_id) {
            return Ok(Some(session.clone()));
        }
        match &self.sessions.store {
            Some(store) => store.load(session_id),
            None => Ok(None),
        }
    }

    /// Remove a session from memory and disk. Returns whether it existed.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let in_memory = self.sessions.lock()?.sessions.remove(session_id).is_some();
        let on_disk = match &self.sessions.store {
            Some(store) => store.delete(session_id)?,
            None => false,
        };
        Ok(in_memory || on_disk)
    }

    /// Ids of the sessions currently held in memory, sorted.
    pub fn session_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.sessions.lock()?.sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn store(&self) -> Option<&SessionStore> {
        self.sessions.store.as_ref()
    }
}

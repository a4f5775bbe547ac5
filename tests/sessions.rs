//! Session persistence: exact snapshots, listing, and a [`ChatEngine`]
//! resuming a conversation saved by another engine instance.

use std::sync::Arc;

use async_trait::async_trait;
use ragline::chat::ChatEngine;
use ragline::llm::{single_fragment, FragmentStream, LanguageModel};
use ragline::session_store::SessionStore;
use ragline_core::chat::{ChatSession, Role};
use ragline_core::{Error, Result};
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};

/// Echoes the number of non-blank prompt lines back, so replies depend on history.
struct LineCounter;

#[async_trait]
impl LanguageModel for LineCounter {
    fn name(&self) -> &str {
        "counter"
    }

    fn model(&self) -> &str {
        "lines"
    }

    async fn invoke(&self, prompt: &str) -> Result<String> {
        let lines = prompt.lines().filter(|l| !l.trim().is_empty()).count();
        Ok(format!("{} lines", lines))
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream> {
        Ok(single_fragment(self.invoke(prompt).await?))
    }
}

/// Signals when a generation starts, then holds the reply until released.
struct GatedModel {
    started: Arc<Notify>,
    gate: Arc<Notify>,
}

#[async_trait]
impl LanguageModel for GatedModel {
    fn name(&self) -> &str {
        "gated"
    }

    fn model(&self) -> &str {
        "test"
    }

    async fn invoke(&self, _prompt: &str) -> Result<String> {
        self.started.notify_one();
        self.gate.notified().await;
        Ok("full reply".to_string())
    }

    async fn stream(&self, _prompt: &str) -> Result<FragmentStream> {
        let (tx, rx) = mpsc::channel(4);
        let started = Arc::clone(&self.started);
        let gate = Arc::clone(&self.gate);
        tokio::spawn(async move {
            started.notify_one();
            gate.notified().await;
            let _ = tx.send(Ok("full ".to_string())).await;
            let _ = tx.send(Ok("reply".to_string())).await;
        });
        Ok(rx)
    }
}

fn gated_engine(tmp: &TempDir) -> (ChatEngine, Arc<Notify>, Arc<Notify>) {
    let started = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let model = GatedModel {
        started: Arc::clone(&started),
        gate: Arc::clone(&gate),
    };
    let chat = ChatEngine::new(Arc::new(model), 20, 1, Some(SessionStore::new(tmp.path())));
    (chat, started, gate)
}

fn roles_and_text(session: &ChatSession) -> Vec<(Role, &str)> {
    session
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect()
}

fn engine(store: SessionStore, max_sessions: usize) -> ChatEngine {
    ChatEngine::new(Arc::new(LineCounter), 20, max_sessions, Some(store))
}

#[test]
fn test_snapshot_roundtrip_is_exact() {
    let tmp = TempDir::new().unwrap();
    let store = SessionStore::new(tmp.path());

    let mut session = ChatSession::with_id("exact");
    session.add_message(Role::User, "Grüße, with \"quotes\"\nand newlines");
    session.add_message(Role::Assistant, "reply");
    session.context_documents.push("report.pdf".to_string());
    session
        .metadata
        .insert("topic".to_string(), serde_json::json!("testing"));

    store.save(&session).unwrap();
    let loaded = store.load("exact").unwrap().unwrap();
    assert_eq!(loaded, session);
}

#[test]
fn test_list_orders_by_last_update() {
    let tmp = TempDir::new().unwrap();
    let store = SessionStore::new(tmp.path());

    let mut older = ChatSession::with_id("older");
    older.add_message(Role::User, "first");
    store.save(&older).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    let mut newer = ChatSession::with_id("newer");
    newer.add_message(Role::User, "one");
    newer.add_message(Role::Assistant, "two");
    store.save(&newer).unwrap();

    std::fs::write(tmp.path().join("garbage.json"), "{ not json").unwrap();

    let listed = store.list().unwrap();
    let ids: Vec<&str> = listed.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(ids, vec!["newer", "older"]);
    assert_eq!(listed[0].message_count, 2);
}

#[test]
fn test_delete_and_clear() {
    let tmp = TempDir::new().unwrap();
    let store = SessionStore::new(tmp.path().join("sessions"));

    assert!(store.list().unwrap().is_empty());
    assert_eq!(store.clear().unwrap(), 0);

    for id in ["a", "b", "c"] {
        store.save(&ChatSession::with_id(id)).unwrap();
    }
    assert!(store.delete("b").unwrap());
    assert!(!store.delete("b").unwrap());
    assert_eq!(store.clear().unwrap(), 2);
    assert!(store.load("a").unwrap().is_none());
}

#[test]
fn test_path_like_session_ids_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = SessionStore::new(tmp.path());

    for bad in ["../escape", "a/b", "", ".hidden"] {
        assert!(
            matches!(store.load(bad), Err(Error::Validation(_))),
            "accepted {:?}",
            bad
        );
    }
}

#[tokio::test]
async fn test_engine_resumes_saved_session() {
    let tmp = TempDir::new().unwrap();

    let session_id = {
        let first = engine(SessionStore::new(tmp.path()), 8);
        let reply = first.chat(None, "hello").await.unwrap();
        assert_eq!(reply.reply, "1 lines");
        reply.session_id
    };

    let second = engine(SessionStore::new(tmp.path()), 8);
    assert!(second.session_ids().unwrap().is_empty());

    let reply = second.chat(Some(&session_id), "again").await.unwrap();
    // Prompt is: user hello, assistant reply, user again.
    assert_eq!(reply.reply, "3 lines");

    let saved = SessionStore::new(tmp.path()).load(&session_id).unwrap().unwrap();
    assert_eq!(saved.messages.len(), 4);
    assert_eq!(saved.messages[3].content, "3 lines");
}

#[tokio::test]
async fn test_evicted_session_is_reloaded() {
    let tmp = TempDir::new().unwrap();
    let chat = engine(SessionStore::new(tmp.path()), 1);

    let first = chat.chat(None, "one").await.unwrap().session_id;
    let second = chat.chat(None, "two").await.unwrap().session_id;
    assert_eq!(chat.session_ids().unwrap(), vec![second.clone()]);

    let resumed = chat.chat(Some(&first), "three").await.unwrap();
    assert_eq!(resumed.session_id, first);
    assert_eq!(chat.session_ids().unwrap(), vec![first.clone()]);

    let session = chat.get_session(&second).unwrap().unwrap();
    assert_eq!(session.messages.len(), 2);
}

#[tokio::test]
async fn test_deleted_session_not_found() {
    let tmp = TempDir::new().unwrap();
    let chat = engine(SessionStore::new(tmp.path()), 4);

    let id = chat.chat(None, "hi").await.unwrap().session_id;
    assert!(chat.delete_session(&id).unwrap());
    assert!(matches!(
        chat.chat(Some(&id), "still there?").await,
        Err(Error::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_streamed_reply_survives_eviction_pressure() {
    let tmp = TempDir::new().unwrap();
    let (chat, started, gate) = gated_engine(&tmp);

    let (id, mut stream) = chat.chat_stream(None, "hello").await.unwrap();
    started.notified().await;

    // The map is full, but the busy session must not be the one evicted.
    let other = chat.create_session().unwrap();
    let mut live = chat.session_ids().unwrap();
    live.sort();
    let mut expected = vec![id.clone(), other];
    expected.sort();
    assert_eq!(live, expected);

    gate.notify_one();
    let mut reply = String::new();
    while let Some(fragment) = stream.recv().await {
        reply.push_str(&fragment.unwrap());
    }
    assert_eq!(reply, "full reply");

    let session = chat.get_session(&id).unwrap().unwrap();
    assert_eq!(
        roles_and_text(&session),
        vec![(Role::User, "hello"), (Role::Assistant, "full reply")]
    );
    let saved = SessionStore::new(tmp.path()).load(&id).unwrap().unwrap();
    assert_eq!(saved.messages.len(), 2);
}

#[tokio::test]
async fn test_blocking_reply_survives_eviction_pressure() {
    let tmp = TempDir::new().unwrap();
    let (chat, started, gate) = gated_engine(&tmp);

    let (reply, other) = tokio::join!(chat.chat(None, "hello"), async {
        started.notified().await;
        let other = chat.create_session().unwrap();
        gate.notify_one();
        other
    });
    let reply = reply.unwrap();
    assert_eq!(reply.reply, "full reply");
    assert_ne!(reply.session_id, other);

    let session = chat.get_session(&reply.session_id).unwrap().unwrap();
    assert_eq!(
        roles_and_text(&session),
        vec![(Role::User, "hello"), (Role::Assistant, "full reply")]
    );
}

#[tokio::test]
async fn test_idle_session_evicted_after_turn_finishes() {
    let tmp = TempDir::new().unwrap();
    let chat = engine(SessionStore::new(tmp.path()), 1);

    let first = chat.chat(None, "one").await.unwrap().session_id;
    let second = chat.create_session().unwrap();
    assert_eq!(chat.session_ids().unwrap(), vec![second]);

    let saved = SessionStore::new(tmp.path()).load(&first).unwrap().unwrap();
    assert_eq!(saved.messages.len(), 2);
}

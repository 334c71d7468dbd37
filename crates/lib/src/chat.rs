//! Chat session manager: user input in, replies reconciled back into the log.
//!
//! Each submission appends a user turn and a pending turn, then fetches the reply on a
//! spawned task. The reply replaces exactly the pending turn of its own submission, so
//! overlapping submissions never clear each other's placeholders. Failures become error
//! turns; nothing is retried.

use crate::config::{self, Config};
use crate::llm::{CompletionBackend, CompletionClient, Content};
use crate::markup;
use crate::primer;
use crate::quick_menu;
use crate::session::{Session, SubmissionId, Turn};
use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("not a quick-menu question: {0}")]
    UnknownQuickMenuOption(String),
    #[error("quick menu is no longer shown")]
    QuickMenuClosed,
}

/// Change notifications for a view (re-render, auto-scroll).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    TurnAppended { index: usize },
    PendingRemoved { submission: SubmissionId },
    PanelToggled { open: bool },
}

/// Handle to a submission whose reply is still being fetched.
pub struct InFlight {
    submission: SubmissionId,
    handle: JoinHandle<()>,
}

impl InFlight {
    pub fn submission(&self) -> SubmissionId {
        self.submission
    }

    /// Wait until the reply (or error) has been written to the log.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            log::warn!("chat: submission {} task failed: {}", self.submission, e);
        }
    }
}

/// Owns one chat session and the backend that answers it.
pub struct ChatManager {
    session: Arc<RwLock<Session>>,
    backend: Arc<dyn CompletionBackend>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatManager {
    pub fn new(primer: impl Into<String>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_session(Session::new(primer), backend)
    }

    fn with_session(session: Session, backend: Arc<dyn CompletionBackend>) -> Self {
        log::info!("chat: session {} created", session.id());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: Arc::new(RwLock::new(session)),
            backend,
            events,
        }
    }

    /// Build a manager from config: completion client, primer (file override or built-in), initial panel state.
    pub fn from_config(config: &Config, config_path: &Path) -> Result<Self> {
        Self::from_config_with_env(config, config_path, config::process_env)
    }

    /// Same as [`ChatManager::from_config`] with `env` supplying the MEDCHAT_* overrides.
    pub fn from_config_with_env(
        config: &Config,
        config_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let Some(url) = config::resolve_completion_url_with(config, &env) else {
            anyhow::bail!(
                "no completion endpoint configured; set completion.url in {} or MEDCHAT_COMPLETION_URL",
                config_path.display()
            );
        };
        let api_key = config::resolve_api_key_with(config, &env);
        let client = match config.completion.timeout_secs {
            Some(secs) => CompletionClient::with_timeout(url, api_key, Duration::from_secs(secs)),
            None => CompletionClient::new(url, api_key),
        };
        let primer_path = config::resolve_primer_path(config, config_path);
        let mut session = Session::new(primer::load_primer(primer_path.as_deref()));
        session.set_panel_open(config.chat.open_on_start);
        Ok(Self::with_session(session, Arc::new(client)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Copy of the current session state.
    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn turns(&self) -> Vec<Turn> {
        self.session.read().await.turns().to_vec()
    }

    pub async fn show_quick_menu(&self) -> bool {
        self.session.read().await.show_quick_menu()
    }

    pub async fn panel_open(&self) -> bool {
        self.session.read().await.panel_open()
    }

    pub async fn open_panel(&self) {
        self.set_panel(true).await;
    }

    /// Hides the panel; in-flight fetches keep running.
    pub async fn close_panel(&self) {
        self.set_panel(false).await;
    }

    /// Returns the new visibility.
    pub async fn toggle_panel(&self) -> bool {
        let mut s = self.session.write().await;
        let open = !s.panel_open();
        self.apply_panel(&mut s, open);
        open
    }

    async fn set_panel(&self, open: bool) {
        let mut s = self.session.write().await;
        self.apply_panel(&mut s, open);
    }

    fn apply_panel(&self, s: &mut Session, open: bool) {
        if s.panel_open() != open {
            s.set_panel_open(open);
            let _ = self.events.send(ChatEvent::PanelToggled { open });
        }
    }

    /// Append `text` as a user turn plus a pending turn, then fetch the reply in the background.
    pub async fn submit_user_message(&self, text: &str) -> Result<InFlight, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let mut s = self.session.write().await;
        Ok(self.begin(&mut s, text))
    }

    /// Same as typing `question`; only valid while the quick menu is shown.
    pub async fn select_quick_menu_option(&self, question: &str) -> Result<InFlight, ChatError> {
        if quick_menu::find_question(question).is_none() {
            return Err(ChatError::UnknownQuickMenuOption(question.to_string()));
        }
        let mut s = self.session.write().await;
        if !s.show_quick_menu() {
            return Err(ChatError::QuickMenuClosed);
        }
        Ok(self.begin(&mut s, question))
    }

    fn begin(&self, s: &mut Session, text: &str) -> InFlight {
        let submission = s.begin_submission(text);
        let id = submission.id;
        log::debug!("chat: {} submission {} started", s.id(), id);
        let last = s.len() - 1;
        let _ = self.events.send(ChatEvent::TurnAppended { index: last - 1 });
        let _ = self.events.send(ChatEvent::TurnAppended { index: last });

        let handle = tokio::spawn(fetch_reply(
            Arc::downgrade(&self.session),
            Arc::clone(&self.backend),
            self.events.clone(),
            id,
            submission.history,
        ));
        InFlight {
            submission: id,
            handle,
        }
    }
}

async fn fetch_reply(
    session: Weak<RwLock<Session>>,
    backend: Arc<dyn CompletionBackend>,
    events: broadcast::Sender<ChatEvent>,
    id: SubmissionId,
    history: Vec<Content>,
) {
    let (text, is_error) = match backend.complete(history).await {
        Ok(raw) => (markup::render_bold(&raw), false),
        Err(e) => {
            log::warn!("chat: submission {} failed: {}", id, e);
            (e.user_message(), true)
        }
    };

    let Some(session) = session.upgrade() else {
        log::debug!("chat: session gone, dropping reply for submission {}", id);
        return;
    };
    let mut s = session.write().await;
    match s.resolve(id, text, is_error) {
        Some(r) => {
            let _ = events.send(ChatEvent::PendingRemoved { submission: id });
            let _ = events.send(ChatEvent::TurnAppended { index: r.appended });
        }
        None => log::warn!("chat: no pending turn for submission {}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionError, Role};
    use crate::session::{TurnKind, PENDING_TEXT};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    type Reply = Result<String, CompletionError>;

    /// Backend whose replies are released by the test, keyed by the last user text.
    #[derive(Default)]
    struct GatedBackend {
        gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
        requests: Mutex<Vec<Vec<Content>>>,
    }

    impl GatedBackend {
        fn gate(&self, text: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(text.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl CompletionBackend for GatedBackend {
        async fn complete(&self, contents: Vec<Content>) -> Reply {
            let key = contents.last().unwrap().parts[0].text.clone();
            self.requests.lock().unwrap().push(contents);
            let rx = self.gates.lock().unwrap().remove(&key);
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(CompletionError::Malformed("gate dropped".into()))),
                None => Ok(format!("echo: {}", key)),
            }
        }
    }

    fn manager(backend: Arc<GatedBackend>) -> ChatManager {
        ChatManager::new("primer", backend)
    }

    fn api_error(message: &str) -> CompletionError {
        CompletionError::Api {
            status: 429,
            message: Some(message.to_string()),
        }
    }

    #[tokio::test]
    async fn fresh_session_shows_quick_menu() {
        let m = manager(Arc::new(GatedBackend::default()));
        let turns = m.turns().await;
        assert_eq!(turns.len(), 1);
        assert!(turns[0].hidden_from_view);
        assert!(m.show_quick_menu().await);
    }

    #[tokio::test]
    async fn success_replaces_pending_with_bold_reply() {
        let backend = Arc::new(GatedBackend::default());
        let gate = backend.gate("Hello");
        let m = manager(backend.clone());

        let flight = m.submit_user_message("Hello").await.unwrap();
        let turns = m.turns().await;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1], Turn::user("Hello"));
        assert_eq!(turns[2].text, PENDING_TEXT);
        assert!(!m.show_quick_menu().await);

        gate.send(Ok("  **Hi!**\n".to_string())).unwrap();
        flight.wait().await;

        let turns = m.turns().await;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2], Turn::model("<b>Hi!</b>"));
        assert!(!m.show_quick_menu().await);

        let sent = backend.requests.lock().unwrap()[0].clone();
        assert_eq!(
            sent,
            vec![
                Content::text(Role::User, "primer"),
                Content::text(Role::User, "Hello"),
            ]
        );
    }

    #[tokio::test]
    async fn api_error_becomes_error_turn() {
        let backend = Arc::new(GatedBackend::default());
        let gate = backend.gate("Hello");
        let m = manager(backend);
        let flight = m.submit_user_message("Hello").await.unwrap();
        gate.send(Err(api_error("quota exceeded"))).unwrap();
        flight.wait().await;

        let last = m.turns().await.pop().unwrap();
        assert_eq!(last.text, "quota exceeded");
        assert!(last.is_error);
        assert_eq!(last.kind, TurnKind::Model);
    }

    #[tokio::test]
    async fn malformed_reply_uses_generic_message() {
        let backend = Arc::new(GatedBackend::default());
        let gate = backend.gate("Hello");
        let m = manager(backend);
        let flight = m.submit_user_message("Hello").await.unwrap();
        gate.send(Err(CompletionError::Malformed("no candidate text".into())))
            .unwrap();
        flight.wait().await;

        let last = m.turns().await.pop().unwrap();
        assert_eq!(last.text, crate::llm::FETCH_FAILED);
        assert!(last.is_error);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_side_effects() {
        let m = manager(Arc::new(GatedBackend::default()));
        assert_eq!(
            m.submit_user_message("  \n").await.err(),
            Some(ChatError::EmptyMessage)
        );
        assert_eq!(m.turns().await.len(), 1);
        assert!(m.show_quick_menu().await);
    }

    #[tokio::test]
    async fn quick_menu_question_is_sent_verbatim_once() {
        let m = manager(Arc::new(GatedBackend::default()));
        let q = quick_menu::question_at(4, 1).unwrap();
        m.select_quick_menu_option(q).await.unwrap().wait().await;

        let turns = m.turns().await;
        assert_eq!(turns[1].text, q);
        assert_eq!(turns[2], Turn::model(format!("echo: {}", q)));
        assert!(!m.show_quick_menu().await);

        let other = quick_menu::question_at(0, 0).unwrap();
        assert_eq!(
            m.select_quick_menu_option(other).await.err(),
            Some(ChatError::QuickMenuClosed)
        );
    }

    #[tokio::test]
    async fn unknown_quick_menu_option_is_rejected() {
        let m = manager(Arc::new(GatedBackend::default()));
        let err = m.select_quick_menu_option("free text").await.err();
        assert!(matches!(err, Some(ChatError::UnknownQuickMenuOption(_))));
        assert!(m.show_quick_menu().await);
    }

    #[tokio::test]
    async fn overlapping_submissions_resolve_their_own_placeholders() {
        let backend = Arc::new(GatedBackend::default());
        let first_gate = backend.gate("first");
        let second_gate = backend.gate("second");
        let m = manager(backend);
        let mut events = m.subscribe();

        let first = m.submit_user_message("first").await.unwrap();
        let second = m.submit_user_message("second").await.unwrap();
        assert_eq!(m.snapshot().await.pending_count(), 2);

        second_gate.send(Ok("two".to_string())).unwrap();
        let second_id = second.submission();
        second.wait().await;
        let turns = m.turns().await;
        assert_eq!(turns[2].kind, TurnKind::Pending(first.submission()));
        assert_eq!(turns.last().unwrap(), &Turn::model("two"));

        first_gate.send(Err(api_error("late"))).unwrap();
        let first_id = first.submission();
        first.wait().await;

        let s = m.snapshot().await;
        assert_eq!(s.pending_count(), 0);
        assert!(s.turns().iter().all(|t| t.text != PENDING_TEXT));
        assert!(s.turns()[0].hidden_from_view);
        assert_eq!(s.turns().last().unwrap(), &Turn::error("late"));

        let mut removed = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if let ChatEvent::PendingRemoved { submission } = ev {
                removed.push(submission);
            }
        }
        assert_eq!(removed, vec![second_id, first_id]);
    }

    #[tokio::test]
    async fn reply_after_drop_is_discarded() {
        let backend = Arc::new(GatedBackend::default());
        let gate = backend.gate("Hello");
        let m = manager(backend);
        let mut events = m.subscribe();
        let flight = m.submit_user_message("Hello").await.unwrap();
        drop(m);
        gate.send(Ok("too late".to_string())).unwrap();
        flight.wait().await;

        while let Ok(ev) = events.try_recv() {
            assert!(matches!(ev, ChatEvent::TurnAppended { index: 1 | 2 }), "{:?}", ev);
        }
    }

    #[tokio::test]
    async fn panel_toggles_emit_events_only_on_change() {
        let m = manager(Arc::new(GatedBackend::default()));
        let mut events = m.subscribe();
        assert!(!m.panel_open().await);
        assert!(m.toggle_panel().await);
        m.open_panel().await;
        m.close_panel().await;
        assert!(!m.panel_open().await);

        assert_eq!(events.try_recv().unwrap(), ChatEvent::PanelToggled { open: true });
        assert_eq!(events.try_recv().unwrap(), ChatEvent::PanelToggled { open: false });
        assert!(events.try_recv().is_err());
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn from_config_requires_endpoint() {
        let err = ChatManager::from_config_with_env(
            &Config::default(),
            Path::new("/tmp/config.json"),
            no_env,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("completion"));
    }

    #[tokio::test]
    async fn from_config_sets_initial_panel_state() {
        let mut config = Config::default();
        config.completion.url = Some("http://127.0.0.1:9/generate".to_string());
        let path = Path::new("/tmp/config.json");

        let closed = ChatManager::from_config_with_env(&config, path, no_env).unwrap();
        assert!(!closed.panel_open().await);

        config.chat.open_on_start = true;
        let open = ChatManager::from_config_with_env(&config, path, no_env).unwrap();
        assert!(open.panel_open().await);
        assert!(open.show_quick_menu().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_are_not_lost() {
        let m = Arc::new(manager(Arc::new(GatedBackend::default())));
        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let m = Arc::clone(&m);
                tokio::spawn(async move { m.toggle_panel().await })
            })
            .collect();
        let mut opened = 0;
        for t in tasks {
            if t.await.unwrap() {
                opened += 1;
            }
        }
        assert_eq!(opened, 100);
        assert!(!m.panel_open().await);
    }
}

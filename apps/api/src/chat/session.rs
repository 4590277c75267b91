//! Chat Session Manager — one lazily created conversation over the analyzed candidates.
//!
//! States: uninitialized → active (once, never back). Activation needs a non-empty
//! job description and at least one completed analysis.
//!
//! Only one reply streams at a time: a second `send` while a reply is in flight
//! is rejected by the manager itself.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::prompts::build_system_instruction;
use crate::errors::AppError;
use crate::llm_client::{ChatTurn, LlmClient, LlmError, TextStream};
use crate::models::analysis::AnalysisResult;
use crate::models::chat::ChatMessage;

pub const GREETING: &str = "Hello! I am your HR AI Assistant. I have reviewed the resumes and \
    job description. Ask me anything about the candidates!";

pub const APOLOGY: &str = "I'm sorry, I encountered an error. Please try again.";

// ────────────────────────────────────────────────────────────────────────────
// Context
// ────────────────────────────────────────────────────────────────────────────

/// Job description plus the completed analyses the assistant can talk about.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub job_description: String,
    pub candidates: Vec<AnalysisResult>,
}

impl ChatContext {
    pub fn is_ready(&self) -> bool {
        !self.job_description.trim().is_empty() && !self.candidates.is_empty()
    }
}

/// When the session's context is captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextPolicy {
    /// Captured once at activation, never refreshed.
    #[default]
    Snapshot,
    /// Rebuilt from current results before every send.
    Live,
}

impl FromStr for ContextPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "snapshot" => Ok(ContextPolicy::Snapshot),
            "live" => Ok(ContextPolicy::Live),
            other => Err(format!("unknown chat context policy '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Model seam
// ────────────────────────────────────────────────────────────────────────────

/// Streaming chat backend. `LlmClient` in production, scripted in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn open_stream(&self, system: &str, history: &[ChatTurn])
        -> Result<TextStream, LlmError>;
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn open_stream(
        &self,
        system: &str,
        history: &[ChatTurn],
    ) -> Result<TextStream, LlmError> {
        self.stream(system, history).await
    }
}

/// Progress of one streamed reply, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Delta { text: String },
    Error { message: String },
    Done { text: String },
}

pub type ChatReplyStream = BoxStream<'static, ChatEvent>;

// ────────────────────────────────────────────────────────────────────────────
// Manager
// ────────────────────────────────────────────────────────────────────────────

struct ActiveSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    context: ChatContext,
    system: String,
    /// Completed exchanges only; failed sends are not replayed.
    history: Vec<ChatTurn>,
}

struct Inner {
    model: Arc<dyn ChatModel>,
    policy: ContextPolicy,
    session: Mutex<Option<ActiveSession>>,
    messages: Mutex<Vec<ChatMessage>>,
    in_flight: AtomicBool,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn messages(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a message and returns its index in the log.
    fn push_message(&self, message: ChatMessage) -> usize {
        let mut messages = self.messages();
        messages.push(message);
        messages.len() - 1
    }

    fn set_message_text(&self, index: usize, text: &str) {
        if let Some(message) = self.messages().get_mut(index) {
            message.text = text.to_string();
        }
    }

    fn record_exchange(&self, user_text: String, reply: String) {
        if reply.is_empty() {
            return;
        }
        if let Some(session) = self.session().as_mut() {
            session.history.push(ChatTurn::user(user_text));
            session.history.push(ChatTurn::assistant(reply));
        }
    }
}

/// Releases the single-flight lock when the reply stream ends or is dropped.
struct InFlightGuard(Arc<Inner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub candidate_count: usize,
}

#[derive(Clone)]
pub struct ChatSessionManager {
    inner: Arc<Inner>,
}

impl ChatSessionManager {
    pub fn new(model: Arc<dyn ChatModel>, policy: ContextPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                model,
                policy,
                session: Mutex::new(None),
                messages: Mutex::new(vec![ChatMessage::model(GREETING)]),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.session().is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.inner.session().as_ref().map(|s| SessionInfo {
            id: s.id,
            created_at: s.created_at,
            candidate_count: s.context.candidates.len(),
        })
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.messages().clone()
    }

    /// Creates the session if it does not exist and `context` is ready.
    /// Returns true only for the call that performed the transition.
    pub fn activate(&self, context: &ChatContext) -> bool {
        let mut session = self.inner.session();
        if session.is_some() || !context.is_ready() {
            return false;
        }

        let id = Uuid::new_v4();
        info!(
            session_id = %id,
            candidates = context.candidates.len(),
            "Chat session created"
        );
        *session = Some(ActiveSession {
            id,
            created_at: Utc::now(),
            system: build_system_instruction(context),
            context: context.clone(),
            history: Vec::new(),
        });
        true
    }

    /// Sends a user message and returns the live reply stream.
    ///
    /// `current` is used to activate the session lazily and, under the live
    /// policy, to refresh its context. The reply keeps streaming into the log
    /// only while the returned stream is polled.
    pub fn send(&self, text: &str, current: &ChatContext) -> Result<ChatReplyStream, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("message cannot be empty".to_string()));
        }

        self.activate(current);
        if !self.is_active() {
            return Err(AppError::ChatNotReady);
        }

        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::Conflict(
                "A reply is already being generated".to_string(),
            ));
        }
        let guard = InFlightGuard(self.inner.clone());

        let (system, history) = {
            let mut session = self.inner.session();
            let Some(session) = session.as_mut() else {
                return Err(AppError::ChatNotReady);
            };
            if self.inner.policy == ContextPolicy::Live && current.is_ready() {
                session.context = current.clone();
                session.system = build_system_instruction(current);
            }
            let mut history = session.history.clone();
            history.push(ChatTurn::user(text));
            (session.system.clone(), history)
        };

        self.inner.push_message(ChatMessage::user(text));

        let inner = self.inner.clone();
        let user_text = text.to_string();

        let stream = async_stream::stream! {
            let _guard = guard;

            let mut upstream = match inner.model.open_stream(&system, &history).await {
                Ok(upstream) => upstream,
                Err(e) => {
                    warn!(error = %e, "Chat stream failed to open");
                    inner.push_message(ChatMessage::model(APOLOGY));
                    yield ChatEvent::Error { message: APOLOGY.to_string() };
                    return;
                }
            };

            let reply_index = inner.push_message(ChatMessage::model(""));
            let mut buffer = String::new();

            while let Some(chunk) = upstream.next().await {
                match chunk {
                    Ok(piece) => {
                        buffer.push_str(&piece);
                        inner.set_message_text(reply_index, &buffer);
                        yield ChatEvent::Delta { text: piece };
                    }
                    Err(e) => {
                        warn!(error = %e, "Chat stream failed mid-reply");
                        inner.push_message(ChatMessage::model(APOLOGY));
                        yield ChatEvent::Error { message: APOLOGY.to_string() };
                        return;
                    }
                }
            }

            inner.record_exchange(user_text, buffer.clone());
            yield ChatEvent::Done { text: buffer };
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::models::chat::ChatRole;

    /// Replays a fixed script of chunks and records what it was asked.
    #[derive(Default)]
    struct ScriptedModel {
        chunks: Vec<Result<String, String>>,
        fail_open: bool,
        opened: AtomicUsize,
        seen: Mutex<Vec<(String, Vec<ChatTurn>)>>,
    }

    impl ScriptedModel {
        fn replying(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| Ok(c.to_string())).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn open_stream(
            &self,
            system: &str,
            history: &[ChatTurn],
        ) -> Result<TextStream, LlmError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), history.to_vec()));
            if self.fail_open {
                return Err(LlmError::EmptyContent);
            }
            let items: Vec<Result<String, LlmError>> = self
                .chunks
                .iter()
                .map(|c| c.clone().map_err(LlmError::Stream))
                .collect();
            Ok(futures::stream::iter(items).boxed())
        }
    }

    fn candidate(name: &str, score: u32) -> AnalysisResult {
        AnalysisResult {
            candidate_name: name.to_string(),
            match_score: score,
            matched_skills: vec!["Rust".to_string()],
            missing_skills: vec![],
            summary: "ok".to_string(),
            filename: format!("{name}.pdf"),
        }
    }

    fn ready_context() -> ChatContext {
        ChatContext {
            job_description: "Senior Rust Engineer".to_string(),
            candidates: vec![candidate("Jane", 90)],
        }
    }

    fn manager(model: ScriptedModel, policy: ContextPolicy) -> (ChatSessionManager, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        (ChatSessionManager::new(model.clone(), policy), model)
    }

    #[test]
    fn test_context_policy_from_str() {
        assert_eq!("snapshot".parse::<ContextPolicy>(), Ok(ContextPolicy::Snapshot));
        assert_eq!(" LIVE ".parse::<ContextPolicy>(), Ok(ContextPolicy::Live));
        assert!("sometimes".parse::<ContextPolicy>().is_err());
    }

    #[test]
    fn test_log_starts_with_greeting() {
        let (chat, _) = manager(ScriptedModel::default(), ContextPolicy::Snapshot);
        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::Model);
        assert_eq!(messages[0].text, GREETING);
    }

    #[test]
    fn test_activation_requires_job_description_and_results() {
        let (chat, _) = manager(ScriptedModel::default(), ContextPolicy::Snapshot);

        assert!(!chat.activate(&ChatContext {
            job_description: "  ".to_string(),
            candidates: vec![candidate("Jane", 90)],
        }));
        assert!(!chat.activate(&ChatContext {
            job_description: "Rust".to_string(),
            candidates: vec![],
        }));
        assert!(!chat.is_active());
    }

    #[test]
    fn test_activation_happens_exactly_once() {
        let (chat, _) = manager(ScriptedModel::default(), ContextPolicy::Snapshot);

        assert!(chat.activate(&ready_context()));
        let first = chat.session_info().unwrap();
        assert!(!chat.activate(&ready_context()));
        assert!(!chat.activate(&ready_context()));
        assert_eq!(chat.session_info().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_send_before_ready_is_rejected() {
        let (chat, model) = manager(ScriptedModel::replying(&["hi"]), ContextPolicy::Snapshot);

        let result = chat.send("Who is best?", &ChatContext::default());
        assert!(matches!(result, Err(AppError::ChatNotReady)));
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(model.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let (chat, _) = manager(ScriptedModel::replying(&["hi"]), ContextPolicy::Snapshot);
        assert!(matches!(
            chat.send("   ", &ready_context()),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_send_streams_into_last_message() {
        let (chat, _) = manager(
            ScriptedModel::replying(&["Jane ", "is ", "the best."]),
            ContextPolicy::Snapshot,
        );

        let mut stream = chat.send("Who is best?", &ready_context()).unwrap();

        assert_eq!(
            stream.next().await,
            Some(ChatEvent::Delta { text: "Jane ".to_string() })
        );
        let log = chat.messages();
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].role, ChatRole::User);
        assert_eq!(log[2].text, "Jane ");

        let rest: Vec<ChatEvent> = stream.collect().await;
        assert_eq!(
            rest.last(),
            Some(&ChatEvent::Done { text: "Jane is the best.".to_string() })
        );
        assert_eq!(chat.messages()[2].text, "Jane is the best.");
        assert!(!chat.is_busy());
    }

    #[tokio::test]
    async fn test_second_send_while_streaming_is_rejected() {
        let (chat, _) = manager(ScriptedModel::replying(&["a", "b"]), ContextPolicy::Snapshot);

        let first = chat.send("one", &ready_context()).unwrap();
        assert!(chat.is_busy());
        assert!(matches!(
            chat.send("two", &ready_context()),
            Err(AppError::Conflict(_))
        ));

        let _: Vec<ChatEvent> = first.collect().await;
        assert!(!chat.is_busy());
        assert!(chat.send("two", &ready_context()).is_ok());
    }

    #[tokio::test]
    async fn test_open_failure_appends_apology() {
        let model = ScriptedModel {
            fail_open: true,
            ..Default::default()
        };
        let (chat, _) = manager(model, ContextPolicy::Snapshot);

        let events: Vec<ChatEvent> = chat.send("hi", &ready_context()).unwrap().collect().await;
        assert_eq!(
            events,
            vec![ChatEvent::Error { message: APOLOGY.to_string() }]
        );

        let log = chat.messages();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].text, APOLOGY);
        assert!(!chat.is_busy());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_and_appends_apology() {
        let model = ScriptedModel {
            chunks: vec![Ok("Partial ".to_string()), Err("reset".to_string())],
            ..Default::default()
        };
        let (chat, model) = manager(model, ContextPolicy::Snapshot);

        let _: Vec<ChatEvent> = chat.send("hi", &ready_context()).unwrap().collect().await;

        let log = chat.messages();
        assert_eq!(log.len(), 4);
        assert_eq!(log[2].text, "Partial ");
        assert_eq!(log[3].text, APOLOGY);

        // Failed exchange is not replayed as history on the next send.
        *model.seen.lock().unwrap() = Vec::new();
        let _: Vec<ChatEvent> = chat.send("again", &ready_context()).unwrap().collect().await;
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].1, vec![ChatTurn::user("again")]);
    }

    #[tokio::test]
    async fn test_history_grows_with_completed_exchanges() {
        let (chat, model) = manager(ScriptedModel::replying(&["Jane."]), ContextPolicy::Snapshot);

        let _: Vec<ChatEvent> = chat.send("Who?", &ready_context()).unwrap().collect().await;
        let _: Vec<ChatEvent> = chat.send("Why?", &ready_context()).unwrap().collect().await;

        let seen = model.seen.lock().unwrap();
        assert_eq!(
            seen[1].1,
            vec![
                ChatTurn::user("Who?"),
                ChatTurn::assistant("Jane."),
                ChatTurn::user("Why?"),
            ]
        );
    }

    #[tokio::test]
    async fn test_snapshot_policy_freezes_context() {
        let (chat, model) = manager(ScriptedModel::replying(&["ok"]), ContextPolicy::Snapshot);

        let _: Vec<ChatEvent> = chat.send("hi", &ready_context()).unwrap().collect().await;

        let mut grown = ready_context();
        grown.candidates.push(candidate("Newcomer", 75));
        let _: Vec<ChatEvent> = chat.send("hi again", &grown).unwrap().collect().await;

        let seen = model.seen.lock().unwrap();
        assert!(!seen[1].0.contains("Newcomer"));
        assert_eq!(chat.session_info().unwrap().candidate_count, 1);
    }

    #[tokio::test]
    async fn test_live_policy_refreshes_context() {
        let (chat, model) = manager(ScriptedModel::replying(&["ok"]), ContextPolicy::Live);

        let _: Vec<ChatEvent> = chat.send("hi", &ready_context()).unwrap().collect().await;

        let mut grown = ready_context();
        grown.candidates.push(candidate("Newcomer", 75));
        let _: Vec<ChatEvent> = chat.send("hi again", &grown).unwrap().collect().await;

        let seen = model.seen.lock().unwrap();
        assert!(seen[1].0.contains("Newcomer"));
        assert_eq!(chat.session_info().unwrap().candidate_count, 2);
    }
}

//! Chat client state machine
//!
//! [`ChatClient`] owns the transcript and the bookkeeping for the single
//! in-flight `/chat` request. Sending is split into [`ChatClient::submit`] and
//! [`ChatClient::complete`] so an event loop can run the request on a
//! background task; [`ChatClient::send_message`] does both in one call.

use std::sync::Arc;

use tracing::{debug, error};

use crate::backend::ChatBackend;
use crate::error::{ChatError, FailureKind, ResetError};
use crate::state::{EntryId, Role, Transcript};

/// Identifies one dispatched `/chat` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(u64);

/// A message that has been added to the transcript and still needs sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChat {
    pub id: RequestId,
    pub message: String,
}

/// What a completed request did to the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Replied,
    Failed(FailureKind),
    /// The request no longer matches the active one (a restart happened).
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    request: RequestId,
    placeholder: EntryId,
}

pub struct ChatClient {
    backend: Arc<dyn ChatBackend>,
    transcript: Transcript,
    greeting: String,
    in_flight: Option<InFlight>,
    next_request: u64,
}

impl ChatClient {
    pub fn new(backend: Arc<dyn ChatBackend>, greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Self {
            backend,
            transcript: Transcript::with_greeting(&greeting),
            greeting,
            in_flight: None,
            next_request: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    /// True while a `/chat` request is awaiting its reply.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Takes the input field's text and records it as a user message followed by
    /// the loading placeholder.
    ///
    /// Returns `None` without touching anything when the trimmed input is empty
    /// or a request is already in flight; in the latter case the typed text stays
    /// in `input`.
    pub fn submit(&mut self, input: &mut String) -> Option<PendingChat> {
        let message = input.trim().to_string();
        if message.is_empty() {
            return None;
        }
        if self.is_busy() || self.transcript.active_placeholder().is_some() {
            debug!("ignoring send while a reply is pending");
            return None;
        }

        input.clear();
        self.transcript.push(Role::User, message.as_str());
        let placeholder = self.transcript.show_placeholder()?;

        let request = RequestId(self.next_request);
        self.next_request += 1;
        self.in_flight = Some(InFlight {
            request,
            placeholder,
        });

        Some(PendingChat {
            id: request,
            message,
        })
    }

    /// Applies the outcome of a request started by [`ChatClient::submit`].
    ///
    /// The placeholder is always removed before the reply or error message is
    /// appended.
    pub fn complete(&mut self, id: RequestId, result: Result<String, ChatError>) -> Completion {
        let in_flight = match self.in_flight {
            Some(in_flight) if in_flight.request == id => in_flight,
            _ => {
                debug!(?id, "discarding reply for a request that is no longer active");
                return Completion::Stale;
            }
        };
        self.in_flight = None;
        self.transcript.remove_placeholder(in_flight.placeholder);

        match result {
            Ok(reply) => {
                self.transcript.push(Role::Bot, reply);
                Completion::Replied
            }
            Err(e) => {
                error!(error = %e, "chat request failed");
                let kind = e.kind();
                self.transcript.push(Role::BotError, kind.user_message());
                Completion::Failed(kind)
            }
        }
    }

    /// Submits the input and waits for the backend's answer.
    pub async fn send_message(&mut self, input: &mut String) -> Option<Completion> {
        let pending = self.submit(input)?;
        let result = self.backend.chat(&pending.message).await;
        Some(self.complete(pending.id, result))
    }

    /// Clears the transcript down to the greeting, whatever `/reset` returned.
    ///
    /// The reset outcome is handed back so the caller decides whether to act on it.
    pub fn complete_restart(&mut self, result: Result<(), ResetError>) -> Result<(), ResetError> {
        if let Some(in_flight) = self.in_flight.take() {
            debug!(request = ?in_flight.request, "abandoning in-flight request on restart");
        }
        self.transcript.clear_and_seed(&self.greeting);
        result
    }

    pub async fn restart_conversation(&mut self) -> Result<(), ResetError> {
        let result = self.backend.reset().await;
        self.complete_restart(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{GENERIC_FAILURE_TEXT, UNAVAILABLE_TEXT};
    use crate::state::{Entry, LOADING_TEXT};

    const GREETING: &str = "Hello! How can I help?";

    #[derive(Default)]
    struct ScriptedBackend {
        sent: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<Result<String, ChatError>>>,
        reset_status: Option<u16>,
        resets: Mutex<usize>,
    }

    impl ScriptedBackend {
        fn replying(result: Result<String, ChatError>) -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([result])),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(&self, message: &str) -> Result<String, ChatError> {
            self.sent.lock().unwrap().push(message.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()))
        }

        async fn reset(&self) -> Result<(), ResetError> {
            *self.resets.lock().unwrap() += 1;
            match self.reset_status {
                Some(status) => Err(ResetError::Status { status }),
                None => Ok(()),
            }
        }
    }

    fn client_with(backend: ScriptedBackend) -> (ChatClient, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let client = ChatClient::new(backend.clone(), GREETING);
        (client, backend)
    }

    fn texts(client: &ChatClient) -> Vec<(&'static str, String)> {
        client
            .transcript()
            .entries()
            .iter()
            .map(|e| (e.class_name(), e.text().to_string()))
            .collect()
    }

    #[test]
    fn test_starts_with_greeting() {
        let (client, _) = client_with(ScriptedBackend::default());
        assert_eq!(texts(&client), vec![("bot-msg", GREETING.to_string())]);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let (mut client, backend) = client_with(ScriptedBackend::default());
        let mut input = "   \t ".to_string();

        assert!(client.send_message(&mut input).await.is_none());

        assert_eq!(client.transcript().len(), 1);
        assert!(backend.sent().is_empty());
        assert_eq!(input, "   \t ");
    }

    #[test]
    fn test_submit_appends_user_then_placeholder() {
        let (mut client, _) = client_with(ScriptedBackend::default());
        let mut input = "  Hello ".to_string();

        let pending = client.submit(&mut input).unwrap();

        assert_eq!(pending.message, "Hello");
        assert!(input.is_empty());
        assert_eq!(
            texts(&client)[1..],
            [
                ("user-msg", "Hello".to_string()),
                ("bot-msg loading", LOADING_TEXT.to_string()),
            ]
        );
        assert!(client.is_busy());
    }

    #[tokio::test]
    async fn test_successful_reply_replaces_placeholder() {
        let (mut client, backend) =
            client_with(ScriptedBackend::replying(Ok("Hi there".to_string())));
        let mut input = "Hello".to_string();

        let outcome = client.send_message(&mut input).await;

        assert_eq!(outcome, Some(Completion::Replied));
        assert_eq!(backend.sent(), vec!["Hello".to_string()]);
        assert_eq!(
            texts(&client),
            vec![
                ("bot-msg", GREETING.to_string()),
                ("user-msg", "Hello".to_string()),
                ("bot-msg", "Hi there".to_string()),
            ]
        );
        assert!(client.transcript().active_placeholder().is_none());
        assert!(!client.is_busy());
    }

    #[tokio::test]
    async fn test_status_failure_shows_unavailable() {
        let (mut client, _) =
            client_with(ScriptedBackend::replying(Err(ChatError::Status { status: 500 })));
        let mut input = "Hello".to_string();

        let outcome = client.send_message(&mut input).await;

        assert_eq!(outcome, Some(Completion::Failed(FailureKind::Unavailable)));
        let last = client.transcript().messages().last().unwrap();
        assert_eq!(last.role(), Role::BotError);
        assert_eq!(last.text(), UNAVAILABLE_TEXT);
        assert!(client
            .transcript()
            .entries()
            .iter()
            .all(|e| !matches!(e, Entry::Loading(_))));
    }

    #[tokio::test]
    async fn test_other_failure_shows_generic_message() {
        let decode = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        let (mut client, _) = client_with(ScriptedBackend::replying(Err(decode.into())));
        let mut input = "Hello".to_string();

        client.send_message(&mut input).await;

        let errors: Vec<_> = client
            .transcript()
            .messages()
            .filter(|m| m.role() == Role::BotError)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].text(), GENERIC_FAILURE_TEXT);
        assert!(client.transcript().active_placeholder().is_none());
    }

    #[test]
    fn test_second_send_while_busy_keeps_input() {
        let (mut client, _) = client_with(ScriptedBackend::default());
        let mut first = "one".to_string();
        client.submit(&mut first).unwrap();

        let mut second = "two".to_string();
        assert!(client.submit(&mut second).is_none());
        assert_eq!(second, "two");

        let loading = client
            .transcript()
            .entries()
            .iter()
            .filter(|e| matches!(e, Entry::Loading(_)))
            .count();
        assert_eq!(loading, 1);
    }

    #[tokio::test]
    async fn test_restart_clears_to_greeting_even_when_reset_fails() {
        let (mut client, backend) = client_with(ScriptedBackend {
            reset_status: Some(502),
            ..Default::default()
        });
        let mut input = "Hello".to_string();
        client.send_message(&mut input).await;
        assert!(client.transcript().len() > 1);

        let result = client.restart_conversation().await;

        assert!(matches!(result, Err(ResetError::Status { status: 502 })));
        assert_eq!(*backend.resets.lock().unwrap(), 1);
        assert_eq!(texts(&client), vec![("bot-msg", GREETING.to_string())]);
    }

    #[test]
    fn test_reply_after_restart_is_stale() {
        let (mut client, _) = client_with(ScriptedBackend::default());
        let mut input = "Hello".to_string();
        let pending = client.submit(&mut input).unwrap();

        client.complete_restart(Ok(())).unwrap();
        let outcome = client.complete(pending.id, Ok("late".to_string()));

        assert_eq!(outcome, Completion::Stale);
        assert_eq!(texts(&client), vec![("bot-msg", GREETING.to_string())]);
        assert!(!client.is_busy());
    }

    #[test]
    fn test_markup_is_kept_verbatim() {
        let (mut client, _) = client_with(ScriptedBackend::default());
        let mut input = "<script>alert(1)</script>".to_string();
        let pending = client.submit(&mut input).unwrap();
        client.complete(pending.id, Ok("**Step 1:** <b>go</b>".to_string()));

        let texts: Vec<_> = client.transcript().messages().map(|m| m.text()).collect();
        assert_eq!(texts[1], "<script>alert(1)</script>");
        assert_eq!(texts[2], "**Step 1:** <b>go</b>");
    }
}

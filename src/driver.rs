//! Conversation driver
//!
//! Bridges a `Session` and the remote model. The driver keeps no notion of
//! which grounding step is active: every call carries the system prompt and
//! the full history, and the model works out the next step from those.
//!
//! A driver is built per request from the session's current transcript, so
//! a turn whose reply failed is part of the history the next time round.

#[cfg(test)]
pub mod testing;

use crate::llm::{Connector, LlmError, LlmMessage, LlmRequest, LlmService};
use crate::locale::MISSING_KEY_WARNING;
use crate::reveal::{Pacing, Typewriter};
use crate::session::{Session, Turn};
use crate::system_prompt::OPENING_INSTRUCTION;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Missing or unusable API key; nothing was sent
    #[error("{0}")]
    Configuration(String),
    /// The model call failed; the session is still usable
    #[error("{0}")]
    RemoteCall(#[from] LlmError),
}

/// Per-deployment knobs for the driver
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub system_prompt: String,
    pub timeout: Duration,
    pub pacing: Pacing,
}

/// A reply ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// How fast the renderer should reveal `text`
    pub pacing: Pacing,
}

impl Reply {
    pub fn reveal(&self) -> Typewriter {
        Typewriter::new(self.text.clone())
    }
}

/// Remote chat session seeded with the system prompt and prior turns
pub struct ConversationDriver {
    service: Arc<dyn LlmService>,
    system: String,
    history: Vec<LlmMessage>,
    timeout: Duration,
    pacing: Pacing,
}

impl ConversationDriver {
    /// Validate the key and seed a chat with `transcript`.
    ///
    /// Fails with `DriverError::Configuration` when the key is absent or
    /// blank; in that case the connector is never asked for a client.
    pub fn initialize(
        connector: &dyn Connector,
        api_key: Option<&str>,
        transcript: &[Turn],
        options: &DriverOptions,
    ) -> Result<Self, DriverError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| DriverError::Configuration(MISSING_KEY_WARNING.to_string()))?;

        let service = connector
            .connect(api_key)
            .map_err(|e| DriverError::Configuration(e.message))?;

        Ok(Self {
            service,
            system: options.system_prompt.clone(),
            history: transcript.iter().map(Turn::to_llm_message).collect(),
            timeout: options.timeout,
            pacing: options.pacing,
        })
    }

    /// Have the assistant speak first.
    ///
    /// Returns `None` without calling the model when the opening already
    /// happened. If the user has spoken before any opening, the opening is
    /// skipped for good. On failure the first run stays pending so it can be
    /// retried.
    pub async fn opening_turn(
        &mut self,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Result<Option<Turn>, DriverError> {
        if !session.first_run_pending() {
            return Ok(None);
        }
        if !session.is_empty() {
            session.consume_first_run();
            return Ok(None);
        }

        let text = self.send_message(OPENING_INSTRUCTION, cancel).await?;
        let turn = Turn::assistant(text);
        session.append(turn.clone());
        session.consume_first_run();

        tracing::info!(session = %session.id(), step = ?session.step(), "Opening turn delivered");
        Ok(Some(turn))
    }

    /// Record the user's turn, ask the model, record its answer.
    ///
    /// On failure only the user's turn is added to the transcript.
    pub async fn respond(
        &mut self,
        session: &mut Session,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Reply, DriverError> {
        session.append(Turn::user(user_text));

        match self.send_message(user_text, cancel).await {
            Ok(text) => {
                session.append(Turn::assistant(text.clone()));
                tracing::info!(
                    session = %session.id(),
                    turns = session.len(),
                    step = session.step().label().unwrap_or("-"),
                    "Reply delivered"
                );
                Ok(Reply {
                    text,
                    pacing: self.pacing,
                })
            }
            Err(e) => {
                tracing::warn!(
                    session = %session.id(),
                    turns = session.len(),
                    kind = e.kind.as_str(),
                    "Reply failed"
                );
                Err(DriverError::RemoteCall(e))
            }
        }
    }

    /// One round trip. The chat history only moves forward on success.
    async fn send_message(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let mut messages = self.history.clone();
        messages.push(LlmMessage::user(text));
        let request = LlmRequest {
            system: self.system.clone(),
            messages,
            max_tokens: None,
        };

        let timeout = self.timeout;
        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(LlmError::cancelled("Request cancelled")),
            result = tokio::time::timeout(timeout, self.service.complete(&request)) => {
                result.unwrap_or_else(|_| {
                    Err(LlmError::timeout(format!(
                        "No response within {} seconds",
                        timeout.as_secs_f32()
                    )))
                })
            }
        };
        let response = outcome?;

        self.history = request.messages;
        self.history.push(LlmMessage::assistant(response.text.clone()));
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{DelayedMockLlmService, MockConnector, MockLlmService};
    use super::*;
    use crate::llm::{LlmErrorKind, LlmResponse, MessageRole};
    use crate::session::Role;
    use crate::system_prompt::SYSTEM_PROMPT;

    fn options() -> DriverOptions {
        DriverOptions {
            system_prompt: SYSTEM_PROMPT.to_string(),
            timeout: Duration::from_secs(5),
            pacing: Pacing::default(),
        }
    }

    fn driver_for<S: LlmService + 'static>(
        connector: &MockConnector<S>,
        session: &Session,
    ) -> ConversationDriver {
        ConversationDriver::initialize(connector, Some("k"), session.all(), &options()).unwrap()
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let connector = MockConnector::new(MockLlmService::new());
        let session = Session::new("s");

        for key in [None, Some(""), Some("   ")] {
            let result = ConversationDriver::initialize(&connector, key, session.all(), &options());
            assert!(matches!(result, Err(DriverError::Configuration(_))));
        }
        assert_eq!(connector.connect_count(), 0);
        assert!(connector.service().recorded_requests().is_empty());
    }

    #[test]
    fn test_initialize_seeds_history_with_model_role() {
        let service = MockLlmService::new();
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");
        session.append(Turn::assistant("Ciao"));
        session.append(Turn::user("aiuto"));

        let driver = driver_for(&connector, &session);
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(connector.last_key().as_deref(), Some("k"));
        assert_eq!(
            driver.history,
            vec![LlmMessage::assistant("Ciao"), LlmMessage::user("aiuto")]
        );
        assert_eq!(driver.history[0].role.remote_name(), "model");
    }

    #[tokio::test]
    async fn test_opening_turn_once() {
        let service = MockLlmService::new();
        service.queue_response(LlmResponse::text("Ciao, sono SOS Calma. Facciamo un respiro."));
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");
        let cancel = CancellationToken::new();

        let mut driver = driver_for(&connector, &session);
        let turn = driver
            .opening_turn(&mut session, &cancel)
            .await
            .unwrap()
            .expect("opening turn");

        assert!(!turn.content().is_empty());
        assert_eq!(turn.role(), Role::Assistant);
        assert_eq!(session.len(), 1);
        assert!(!session.first_run_pending());

        let requests = connector.service().recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, SYSTEM_PROMPT);
        assert_eq!(requests[0].messages, vec![LlmMessage::user(OPENING_INSTRUCTION)]);

        // Second call is a no-op
        let again = driver.opening_turn(&mut session, &cancel).await.unwrap();
        assert!(again.is_none());
        assert_eq!(connector.service().recorded_requests().len(), 1);
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_opening_stays_pending() {
        let service = MockLlmService::new();
        service.queue_error(LlmError::network("connection reset"));
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");

        let mut driver = driver_for(&connector, &session);
        let result = driver
            .opening_turn(&mut session, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(DriverError::RemoteCall(_))));
        assert_eq!(session.len(), 0);
        assert!(session.first_run_pending());
    }

    #[tokio::test]
    async fn test_opening_skipped_after_user_spoke() {
        let connector = MockConnector::new(MockLlmService::new());
        let mut session = Session::new("s");
        session.append(Turn::user("aiuto"));

        let mut driver = driver_for(&connector, &session);
        let result = driver
            .opening_turn(&mut session, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(!session.first_run_pending());
        assert!(connector.service().recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_respond_appends_both_turns() {
        let service = MockLlmService::new();
        service.queue_response(LlmResponse::text("Facciamo un respiro insieme."));
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");

        let mut driver = driver_for(&connector, &session);
        let reply = driver
            .respond(&mut session, "aiuto", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.text, "Facciamo un respiro insieme.");
        assert_eq!(reply.pacing, Pacing::default());
        let turns: Vec<(Role, &str)> = session
            .all()
            .iter()
            .map(|t| (t.role(), t.content()))
            .collect();
        assert_eq!(
            turns,
            vec![
                (Role::User, "aiuto"),
                (Role::Assistant, "Facciamo un respiro insieme."),
            ]
        );

        let frames: Vec<String> = reply.reveal().collect();
        assert_eq!(frames.first().map(String::as_str), Some("Facciamo "));
        assert_eq!(frames.last().map(String::as_str), Some("Facciamo un respiro insieme."));
    }

    #[tokio::test]
    async fn test_failure_on_nth_call_keeps_user_turn_only() {
        let service = MockLlmService::new();
        service.queue_response(LlmResponse::text("Scrivi 5 cose che vedi."));
        service.queue_response(LlmResponse::text("Ora 4 cose che puoi toccare."));
        service.queue_error(LlmError::rate_limit("quota exceeded"));
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");
        let cancel = CancellationToken::new();

        for text in ["ok", "sedia, lampada, finestra, libro, tazza"] {
            let mut driver = driver_for(&connector, &session);
            driver.respond(&mut session, text, &cancel).await.unwrap();
        }
        assert_eq!(session.len(), 4);

        let before = session.len();
        let mut driver = driver_for(&connector, &session);
        let err = driver
            .respond(&mut session, "tavolo, maglione", &cancel)
            .await
            .unwrap_err();

        match err {
            DriverError::RemoteCall(e) => {
                assert_eq!(e.kind, LlmErrorKind::RateLimit);
                assert!(e.to_string().contains("quota"));
            }
            DriverError::Configuration(_) => panic!("expected remote call error"),
        }
        assert_eq!(session.len(), before + 1);
        let last = session.all().last().unwrap();
        assert_eq!(last.role(), Role::User);
        assert_eq!(last.content(), "tavolo, maglione");
    }

    #[tokio::test]
    async fn test_retry_resends_failed_prompt() {
        let service = MockLlmService::new();
        service.queue_error(LlmError::network("down"));
        service.queue_response(LlmResponse::text("Va bene, respira."));
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");
        let cancel = CancellationToken::new();

        let mut driver = driver_for(&connector, &session);
        assert!(driver.respond(&mut session, "aiuto", &cancel).await.is_err());

        let mut driver = driver_for(&connector, &session);
        driver.respond(&mut session, "ci sei?", &cancel).await.unwrap();

        let requests = connector.service().recorded_requests();
        assert_eq!(
            requests[1].messages,
            vec![LlmMessage::user("aiuto"), LlmMessage::user("ci sei?")]
        );
        assert_eq!(session.len(), 3);
    }

    #[tokio::test]
    async fn test_transcript_length_and_alternation() {
        for opening in [false, true] {
            for exchanges in 0..6usize {
                let service = MockLlmService::new();
                for i in 0..=exchanges {
                    service.queue_response(LlmResponse::text(format!("risposta {i}")));
                }
                let connector = MockConnector::new(service);
                let mut session = Session::new("s");
                let cancel = CancellationToken::new();

                if opening {
                    let mut driver = driver_for(&connector, &session);
                    driver.opening_turn(&mut session, &cancel).await.unwrap();
                }
                for i in 0..exchanges {
                    let mut driver = driver_for(&connector, &session);
                    driver
                        .respond(&mut session, &format!("utente {i}"), &cancel)
                        .await
                        .unwrap();
                }

                let expected = 2 * exchanges + usize::from(opening);
                assert_eq!(session.len(), expected);

                let first = if opening { Role::Assistant } else { Role::User };
                for (i, turn) in session.all().iter().enumerate() {
                    let want = if i % 2 == 0 {
                        first
                    } else if first == Role::User {
                        Role::Assistant
                    } else {
                        Role::User
                    };
                    assert_eq!(turn.role(), want, "turn {i}, opening={opening}");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_history_sent_in_order() {
        let service = MockLlmService::new();
        service.queue_response(LlmResponse::text("Scrivi 5 cose che vedi."));
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");
        session.append(Turn::assistant("Ciao, respira."));

        let mut driver = driver_for(&connector, &session);
        driver
            .respond(&mut session, "fatto", &CancellationToken::new())
            .await
            .unwrap();

        let request = &connector.service().recorded_requests()[0];
        let roles: Vec<MessageRole> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::Assistant, MessageRole::User]);
        assert_eq!(request.messages[1].text, "fatto");
    }

    #[tokio::test]
    async fn test_timeout_is_remote_call_error() {
        let service = DelayedMockLlmService::new(Duration::from_secs(10));
        service.queue_response(LlmResponse::text("troppo tardi"));
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");
        let options = DriverOptions {
            timeout: Duration::from_millis(50),
            ..options()
        };

        let mut driver =
            ConversationDriver::initialize(&connector, Some("k"), session.all(), &options).unwrap();
        let err = driver
            .respond(&mut session, "aiuto", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::RemoteCall(ref e) if e.kind == LlmErrorKind::Timeout));
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_remote_call_error() {
        let service = DelayedMockLlmService::new(Duration::from_secs(10));
        service.queue_response(LlmResponse::text("troppo tardi"));
        let started = service.request_started.clone();
        let connector = MockConnector::new(service);
        let mut session = Session::new("s");
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            started.notified().await;
            canceller.cancel();
        });

        let mut driver = driver_for(&connector, &session);
        let err = driver
            .respond(&mut session, "aiuto", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::RemoteCall(ref e) if e.kind == LlmErrorKind::Cancelled));
        assert_eq!(session.len(), 1);
    }
}

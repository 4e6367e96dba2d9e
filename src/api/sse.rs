//! Server-Sent Events for chat replies
//!
//! A successful reply is revealed word by word: one `chunk` event per
//! cumulative prefix, spaced by the reply's pacing, then `done` with the full
//! text. A failed call yields a single `error` event so the page can show it
//! inline and keep the chat usable.

use crate::driver::Reply;
use crate::llm::LlmError;
use crate::locale::connection_error;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;

/// Events sent to the page while a reply is shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Chunk { text: String },
    Done { text: String },
    Error { message: String, kind: &'static str, retryable: bool },
}

/// Stream the reveal of `reply`
pub fn reveal_stream(reply: Reply) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    into_sse(reveal_events(reply))
}

/// Stream a single inline error
pub fn error_stream(error: &LlmError) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let event = ChatEvent::Error {
        message: connection_error(&error.message),
        kind: error.kind.as_str(),
        retryable: error.kind.is_retryable(),
    };
    into_sse(stream::once(async move { event }))
}

/// Reveal frames paced by the reply's hint; the first frame goes out at once
pub fn reveal_events(reply: Reply) -> impl Stream<Item = ChatEvent> {
    let delay = reply.pacing.per_chunk;
    let done = ChatEvent::Done {
        text: reply.text.clone(),
    };

    stream::iter(reply.reveal().enumerate())
        .then(move |(i, frame)| async move {
            if i > 0 && delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            ChatEvent::Chunk { text: frame }
        })
        .chain(stream::once(async move { done }))
}

fn into_sse(
    events: impl Stream<Item = ChatEvent> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(events.map(|event| Ok(chat_event_to_axum(event)))).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn chat_event_to_axum(event: ChatEvent) -> Event {
    let (event_type, data) = match event {
        ChatEvent::Chunk { text } => (
            "chunk",
            json!({
                "type": "chunk",
                "text": text
            }),
        ),
        ChatEvent::Done { text } => (
            "done",
            json!({
                "type": "done",
                "text": text
            }),
        ),
        ChatEvent::Error {
            message,
            kind,
            retryable,
        } => (
            "error",
            json!({
                "type": "error",
                "message": message,
                "kind": kind,
                "retryable": retryable
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}

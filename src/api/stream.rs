// src/api/stream.rs

//! Server-sent event stream of a run's status.
//!
//! Each observer gets its own pump task that drives a [`Subscription`] and
//! pushes frames into a small bounded channel; the HTTP response body reads
//! the other end. Frames:
//! - `update`   `{run_id, status, progress, current_step, started_at, completed_at}`
//! - `error`    `{message}`
//! - `complete` `{status}`, sent once, after which the stream ends.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::publish::{StatusPublisher, Subscription, SubscriptionEvent};
use crate::store::Run;
use crate::types::{RunId, RunStatus};

use super::AppState;

const FRAME_BUFFER: usize = 16;

pub const EVENT_UPDATE: &str = "update";
pub const EVENT_ERROR: &str = "error";
pub const EVENT_COMPLETE: &str = "complete";

/// One outbound event, before SSE encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    pub event: &'static str,
    pub data: Value,
}

impl StreamFrame {
    pub fn update(run: &Run) -> Self {
        Self {
            event: EVENT_UPDATE,
            data: json!({
                "run_id": run.run_id,
                "status": run.status,
                "progress": run.progress,
                "current_step": run.current_step,
                "started_at": run.started_at.map(|t| t.to_rfc3339()),
                "completed_at": run.completed_at.map(|t| t.to_rfc3339()),
            }),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event: EVENT_ERROR,
            data: json!({ "message": message.into() }),
        }
    }

    pub fn complete(status: RunStatus) -> Self {
        Self {
            event: EVENT_COMPLETE,
            data: json!({ "status": status }),
        }
    }

    pub fn into_sse(self) -> Event {
        Event::default().event(self.event).data(self.data.to_string())
    }
}

impl From<SubscriptionEvent> for StreamFrame {
    fn from(event: SubscriptionEvent) -> Self {
        match event {
            SubscriptionEvent::Update(run) => StreamFrame::update(&run),
            SubscriptionEvent::Error(message) => StreamFrame::error(message),
            SubscriptionEvent::Complete(status) => StreamFrame::complete(status),
        }
    }
}

/// Open a frame stream for `run_id`.
///
/// An unknown run (or an id that doesn't parse, passed as `None`) yields a
/// single `error` frame and ends.
pub fn open_stream(publisher: &StatusPublisher, run_id: Option<RunId>) -> ReceiverStream<StreamFrame> {
    let (tx, rx) = mpsc::channel(FRAME_BUFFER);

    match run_id.map(|id| publisher.subscribe(id)) {
        Some(Ok(subscription)) => {
            tokio::spawn(pump(subscription, tx));
        }
        Some(Err(_)) | None => {
            // Fresh channel with room to spare; the receiver is still alive.
            let _ = tx.try_send(StreamFrame::error("Run not found"));
        }
    }

    ReceiverStream::new(rx)
}

async fn pump(mut subscription: Subscription, tx: mpsc::Sender<StreamFrame>) {
    let run_id = subscription.run_id();

    loop {
        let event = tokio::select! {
            event = subscription.next() => event,
            _ = tx.closed() => {
                debug!(%run_id, "observer disconnected");
                return;
            }
        };

        let Some(event) = event else {
            debug!(%run_id, "status stream finished");
            return;
        };

        if tx.send(StreamFrame::from(event)).await.is_err() {
            debug!(%run_id, "observer disconnected");
            return;
        }
    }
}

/// `GET /experiments/run/{run_id}/stream`
pub async fn stream_run(
    State(state): State<AppState>,
    Path(raw_run_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let run_id = raw_run_id.parse::<RunId>().ok();
    let frames = open_stream(&state.publisher, run_id);
    let events = frames.map(|frame| Ok::<Event, Infallible>(frame.into_sse()));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(state.keep_alive)
            .text("keep-alive"),
    )
}

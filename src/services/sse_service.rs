use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::SessionStatus,
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{matchmaking_service, sse_events::EVENT_SESSION_SNAPSHOT},
    state::SharedState,
};

/// Subscribe to the event stream of a session, returning the snapshot to
/// send first so clients never need to refetch.
///
/// A completed session without a live runtime has nothing left to publish:
/// no receiver is returned and the stream closes after the snapshot.
pub async fn subscribe_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<(Option<broadcast::Receiver<ServerEvent>>, Option<ServerEvent>), ServiceError> {
    let store = state.require_store().await?;
    let session = store
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session {session_id} not found")))?;

    let (receiver, snapshot) = match state.runtime(session_id) {
        None if session.status == SessionStatus::Completed => {
            let snapshot = matchmaking_service::session_snapshot(state, session_id).await?;
            (None, snapshot)
        }
        _ => {
            let (runtime, _) = state.runtime_for(&session).await?;
            // Subscribe before reading the snapshot so no change falls in between.
            let receiver = runtime.hub().subscribe();
            let snapshot = matchmaking_service::snapshot_of(state, &runtime, &session).await?;
            (Some(receiver), snapshot)
        }
    };

    let first = match ServerEvent::json(EVENT_SESSION_SNAPSHOT.to_string(), &snapshot) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(session_id = %session_id, error = %err, "failed to serialize session snapshot");
            None
        }
    };
    Ok((receiver, first))
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    receiver: Option<broadcast::Receiver<ServerEvent>>,
    first: Option<ServerEvent>,
    session_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(16);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        if let Some(payload) = first {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }
        let Some(mut receiver) = receiver else {
            debug!(session_id = %session_id, "finished session; closing SSE stream after snapshot");
            return;
        };

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(session_id = %session_id, "session SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

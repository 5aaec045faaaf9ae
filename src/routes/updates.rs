//! `/ws/updates`: relays every broadcast under the Redis namespace to a
//! WebSocket client as text frames.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::{
    error::AppError,
    infra::{
        broadcast::{RelayError, UpdateSource, UpdateStream},
        CollaboratorError,
    },
    state::AppState,
    util::new_session_id,
};

pub async fn updates_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let Some(source) = state.updates.clone() else {
        return Err(CollaboratorError::Unavailable {
            collaborator: "redis-pubsub",
            reason: "update relay not configured".to_string(),
        }
        .into());
    };

    Ok(ws.on_upgrade(move |socket| relay_session(socket, source)))
}

async fn relay_session(mut socket: WebSocket, source: UpdateSource) {
    let session = new_session_id("ws");
    info!(%session, pattern = source.pattern(), "relay session opened");

    let mut attempt = 0;
    loop {
        let err = match source.subscribe().await {
            Ok(updates) => {
                let (err, forwarded) = forward(&mut socket, updates).await;
                if forwarded > 0 {
                    attempt = 0;
                }
                err
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            info!(%session, "relay session closed by client");
            return;
        }

        let Some(delay) = source.backoff.delay(attempt) else {
            error!(%session, attempts = attempt, "relay giving up: {err}");
            let _ = socket.send(Message::Close(None)).await;
            return;
        };
        attempt += 1;
        warn!(%session, attempt, ?delay, "relay interrupted, reconnecting: {err}");

        if sit_out(delay, &mut socket).await {
            info!(%session, "client left during reconnect");
            return;
        }
    }
}

/// Waits the full `delay` while draining inbound frames. Returns `true` if
/// the client left in the meantime.
async fn sit_out<S>(delay: Duration, inbound: &mut S) -> bool
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            frame = inbound.next() => {
                if ends_session(&frame) {
                    return true;
                }
            }
        }
    }
}

/// Forwards updates until either side stops. Returns why it stopped and how
/// many messages made it to the client.
async fn forward(socket: &mut WebSocket, mut updates: UpdateStream) -> (RelayError, u64) {
    let mut forwarded = 0;
    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(payload) => {
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        return (RelayError::ClientGone, forwarded);
                    }
                    forwarded += 1;
                }
                None => return (RelayError::StreamEnded, forwarded),
            },
            inbound = socket.recv() => {
                if ends_session(&inbound) {
                    return (RelayError::ClientGone, forwarded);
                }
            }
        }
    }
}

/// Inbound frames are ignored except for those that end the connection.
fn ends_session(inbound: &Option<Result<Message, axum::Error>>) -> bool {
    !matches!(inbound, Some(Ok(message)) if !matches!(message, Message::Close(_)))
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn frames(messages: Vec<Message>) -> impl Stream<Item = Result<Message, axum::Error>> + Unpin {
        tokio_stream::iter(messages.into_iter().map(Ok)).chain(tokio_stream::pending())
    }

    #[tokio::test]
    async fn chatter_does_not_cut_the_backoff_short() {
        let chatter = (0..50)
            .map(|i| Message::Text(format!("ping {i}").into()))
            .collect();
        let mut inbound = frames(chatter);

        let started = Instant::now();
        let left = sit_out(Duration::from_millis(100), &mut inbound).await;

        assert!(!left);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn close_during_backoff_ends_the_wait() {
        let mut inbound = frames(vec![
            Message::Text("ping".into()),
            Message::Close(None),
        ]);

        let started = Instant::now();
        assert!(sit_out(Duration::from_secs(30), &mut inbound).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn only_close_or_disconnect_ends_a_session() {
        assert!(ends_session(&None));
        assert!(ends_session(&Some(Ok(Message::Close(None)))));
        assert!(!ends_session(&Some(Ok(Message::Text("ping".into())))));
        assert!(!ends_session(&Some(Ok(Message::Ping(Default::default())))));
    }
}

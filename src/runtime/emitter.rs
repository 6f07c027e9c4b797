//! Owned handle on the client's event stream
//!
//! The emitter is the only writer to a request's SSE body. Consuming it with
//! [`Emitter::close`] sends the terminal frame; dropping it without closing
//! (a panic unwinding through the runtime) still ends the stream with an
//! `error` frame.

use crate::events::StreamEvent;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Client disconnected")]
    Disconnected,
}

pub struct Emitter {
    tx: Option<mpsc::Sender<String>>,
    request_id: String,
    frames_sent: usize,
}

impl Emitter {
    pub fn new(tx: mpsc::Sender<String>, request_id: impl Into<String>) -> Self {
        Self {
            tx: Some(tx),
            request_id: request_id.into(),
            frames_sent: 0,
        }
    }

    /// Send one non-terminal event. Any failure is fatal for the request.
    pub async fn send(&mut self, event: &StreamEvent) -> Result<(), EmitError> {
        debug_assert!(!event.is_terminal(), "terminal events go through close()");
        let tx = self.tx.as_ref().ok_or(EmitError::Disconnected)?;
        let payload = serde_json::to_string(event)?;
        tx.send(payload)
            .await
            .map_err(|_| EmitError::Disconnected)?;
        self.frames_sent += 1;
        Ok(())
    }

    /// Send the terminal event and release the stream
    pub async fn close(mut self, terminal: StreamEvent) {
        debug_assert!(terminal.is_terminal());
        let Some(tx) = self.tx.take() else {
            return;
        };

        let payload = match serde_json::to_string(&terminal) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(request_id = %self.request_id, error = %e, "Failed to serialize terminal event");
                return;
            }
        };

        if tx.send(payload).await.is_err() {
            tracing::debug!(request_id = %self.request_id, "Client gone before terminal event");
        } else {
            tracing::debug!(
                request_id = %self.request_id,
                frames = self.frames_sent + 1,
                "Event stream closed"
            );
        }
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::warn!(request_id = %self.request_id, "Emitter dropped without close");
            if let Ok(payload) = serde_json::to_string(&StreamEvent::error(
                "Internal error: the response ended unexpectedly",
            )) {
                if let Err(e) = tx.try_send(payload) {
                    tracing::warn!(
                        request_id = %self.request_id,
                        error = %e,
                        "Could not deliver fallback error frame"
                    );
                }
            }
        }
    }
}

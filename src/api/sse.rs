//! Server-Sent Events support

use async_stream::stream;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

/// Stream the runtime's serialized events as `data:` frames.
///
/// The body owns `guard`, so the request's cancel token fires as soon as the
/// client stops reading and the body is dropped.
pub fn sse_response(mut rx: mpsc::Receiver<String>, guard: DropGuard) -> Response {
    let frames = stream! {
        let _guard = guard;
        while let Some(payload) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().data(payload));
        }
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(frames),
    )
        .into_response()
}

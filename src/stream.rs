//! C8: the stream façade and HTTP response builder. Wraps the engine's
//! shared output channel as an async iterable of chunks or of
//! already-serialized protocol text, and can wrap either in a
//! framework-agnostic streaming HTTP response.

use std::pin::Pin;

use async_stream::stream;
use bytes::Bytes;
use futures_util::Stream;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::chunk::UiChunk;
use crate::protocol::ProtocolVersion;

/// An async iterable that can be consumed exactly like any other `Stream`.
pub type AsyncIterableStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// The live output of one translation request: the typed chunk stream plus
/// the means to cancel it early.
pub struct AdapterStream {
    rx: UnboundedReceiver<UiChunk>,
    cancel: CancellationToken,
    message_id: String,
}

impl AdapterStream {
    pub(crate) fn new(
        rx: UnboundedReceiver<UiChunk>,
        cancel: CancellationToken,
        message_id: String,
    ) -> Self {
        Self {
            rx,
            cancel,
            message_id,
        }
    }

    /// Cancels the driving engine. Idempotent: cancelling twice is a no-op,
    /// matching the idempotent-close testable property — the second call
    /// just finds the token already cancelled.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Exposes the output as typed chunks.
    pub fn into_chunks(self) -> AsyncIterableStream<UiChunk> {
        let mut rx = self.rx;
        Box::pin(stream! {
            while let Some(chunk) = rx.recv().await {
                yield chunk;
            }
        })
    }

    /// Exposes the output as already-serialized protocol text. For v5 this
    /// includes the terminal `[DONE]` frame; v4 simply ends when the
    /// channel closes.
    pub fn into_protocol(self, version: ProtocolVersion) -> AsyncIterableStream<String> {
        let mut rx = self.rx;
        let message_id = self.message_id;
        Box::pin(stream! {
            while let Some(chunk) = rx.recv().await {
                if let Some(line) = version.serialize(&chunk, &message_id) {
                    yield line;
                }
            }
            if let Some(terminator) = version.terminator() {
                yield terminator.to_string();
            }
        })
    }
}

/// A framework-agnostic streaming HTTP response: status, headers, and a
/// byte stream body. Behind the `axum` feature this also implements
/// `axum::response::IntoResponse`.
pub struct StreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: AsyncIterableStream<Bytes>,
}

impl StreamResponse {
    /// Builds a response for `stream` serialized under `version`. Caller-
    /// supplied `extra_headers` win over the protocol's defaults.
    pub fn build(
        stream: AdapterStream,
        version: ProtocolVersion,
        extra_headers: HeaderMap,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static(version.content_type()),
        );
        for (name, value) in version.extra_headers() {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        for (name, value) in extra_headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let text_stream = stream.into_protocol(version);
        let body: AsyncIterableStream<Bytes> = Box::pin(async_stream::stream! {
            let mut text_stream = text_stream;
            use futures_util::StreamExt;
            while let Some(line) = text_stream.next().await {
                yield Bytes::from(line.into_bytes());
            }
        });

        Self {
            status: StatusCode::OK,
            headers,
            body,
        }
    }

    /// Renders this into an `http::Response` whose body is the byte
    /// stream, for callers that want the plain `http` crate vocabulary
    /// without pulling in a specific web framework.
    pub fn into_http_response(self) -> Response<AsyncIterableStream<Bytes>> {
        let mut builder = Response::builder().status(self.status);
        if let Some(headers_mut) = builder.headers_mut() {
            *headers_mut = self.headers;
        }
        builder
            .body(self.body)
            .expect("status and headers were validated above")
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for StreamResponse {
    fn into_response(self) -> axum::response::Response {
        use futures_util::StreamExt;

        let status = self.status;
        let headers = self.headers;
        let body = axum::body::Body::from_stream(self.body.map(Ok::<_, std::io::Error>));

        let mut response = axum::response::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

//! Streaming protocol adapter between an agent/LLM orchestration runtime
//! and the AI SDK data-stream wire protocol consumed by browser chat UIs.
//!
//! The crate translates a heterogeneous stream of upstream events — raw
//! text tokens, message-chunk objects, or lifecycle events from a chain
//! executor (`on_chat_model_start`, `on_tool_end`, and friends) — into a
//! single ordered stream of typed [`UiChunk`]s, and renders those chunks
//! under either the v4 (custom-prefix) or v5 (SSE) wire dialect.
//!
//! # Translating a stream
//!
//! ```ignore
//! use agent_ui_stream::{EngineOptions, TranslationEngine, Callbacks, CallbackDispatcher, ProtocolVersion};
//! use futures_util::stream;
//! use serde_json::json;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! let (tx, rx) = mpsc::unbounded_channel();
//! let dispatcher = CallbackDispatcher::new(Callbacks::default(), "message-1");
//! let (engine, _emit) = TranslationEngine::new(EngineOptions::default(), tx, dispatcher);
//!
//! let upstream = stream::iter(vec![Ok(json!("Hello")), Ok(json!(" world"))]);
//! tokio::spawn(engine.run(upstream, CancellationToken::new()));
//!
//! // rx now yields UiChunk::Start, UiChunk::StartStep, UiChunk::TextStart, ...
//! ```
//!
//! # Architecture
//!
//! - [`chunk`] — the `UiChunk` tagged union and its `Usage`/`FinishReason` payloads (C1).
//! - [`message`] — the aggregated `Message` built incrementally for `on_finish` (C1).
//! - [`upstream`] — the three accepted upstream event shapes (C2 input).
//! - [`normalize`] — classifies upstream events into a canonical record (C2).
//! - [`delta`] — cumulative-vs-incremental text delta computation (C3).
//! - [`lifecycle`] — the step/segment/tool-call state machine (C4).
//! - [`engine`] — drives normalization, delta computation, and the lifecycle tracker (C5).
//! - [`emit`] — the manual emission channel and its ambient context (C6).
//! - [`protocol`] — the v4/v5 wire-format serializers (C7).
//! - [`stream`] — the stream façade and HTTP response builder (C8).
//! - [`callbacks`] — observer hooks and incremental message assembly (C9).

pub mod callbacks;
pub mod chunk;
pub mod delta;
pub mod emit;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod normalize;
pub mod protocol;
pub mod stream;
pub mod upstream;

pub use callbacks::{CallbackDispatcher, Callbacks};
pub use chunk::{FinishReason, UiChunk, Usage};
pub use emit::EmitHandle;
pub use engine::{EngineOptions, TranslationEngine};
pub use error::{AdapterError, Result};
pub use message::{Message, MessagePart};
pub use protocol::ProtocolVersion;
pub use stream::{AdapterStream, AsyncIterableStream, StreamResponse};

//! C5: the translation engine. Drives an upstream event source through
//! normalization (C2), delta computation (C3), and the lifecycle tracker
//! (C4), emitting the resulting chunks on the shared output channel and
//! notifying the callback dispatcher (C9) along the way.

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::callbacks::CallbackDispatcher;
use crate::chunk::UiChunk;
use crate::delta::DeltaComputer;
use crate::emit::EmitHandle;
use crate::error::AdapterError;
use crate::lifecycle::LifecycleTracker;
use crate::message::FinishOptions;
use crate::normalize::{self, NormalizedEvent};
use crate::upstream::UpstreamEvent;

/// Construction options, mirroring the settings-struct idiom the teacher
/// uses for its builder APIs.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Overrides the generated message id.
    pub message_id: Option<String>,
    /// When false, `start`/`start-step`/`finish-step`/`finish` become the
    /// caller's responsibility via manual emission.
    pub auto_events: bool,
    /// When false, the output stays open after upstream exhaustion until
    /// the caller explicitly closes it.
    pub auto_close: bool,
    /// When true, `spawn` installs the manual-emission handle as the
    /// ambient context (see [`crate::emit`]) for the duration of the
    /// driving task, so code downstream that never received an explicit
    /// handle can still reach [`crate::emit::current`].
    pub auto_context: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            message_id: None,
            auto_events: true,
            auto_close: true,
            auto_context: false,
        }
    }
}

/// Drives one request's translation from upstream events to UI chunks.
pub struct TranslationEngine {
    message_id: String,
    tracker: LifecycleTracker,
    delta: DeltaComputer,
    tx: UnboundedSender<UiChunk>,
    dispatcher: CallbackDispatcher,
    auto_close: bool,
}

impl TranslationEngine {
    /// Builds the engine and a manual-emission handle sharing the same
    /// output channel, so FIFO ordering between the two is structural
    /// rather than negotiated at runtime.
    pub fn new(
        options: EngineOptions,
        tx: UnboundedSender<UiChunk>,
        dispatcher: CallbackDispatcher,
    ) -> (Self, EmitHandle) {
        let message_id = options
            .message_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let tracker = LifecycleTracker::with_auto_events(message_id.clone(), options.auto_events);
        let emit_handle = EmitHandle::new(tx.clone());
        (
            Self {
                message_id,
                tracker,
                delta: DeltaComputer::new(),
                tx,
                dispatcher,
                auto_close: options.auto_close,
            },
            emit_handle,
        )
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Wires up a fresh output channel and cancellation token, spawns the
    /// engine as a background task driving `source`, and hands back the
    /// stream façade (C8) alongside a manual-emission handle (C6) sharing
    /// the same channel. This is the entry point most callers want; `new`
    /// plus a hand-rolled channel is for callers assembling the pieces
    /// themselves (e.g. tests).
    pub fn spawn<S>(
        options: EngineOptions,
        dispatcher: CallbackDispatcher,
        source: S,
    ) -> (crate::stream::AdapterStream, EmitHandle)
    where
        S: Stream<Item = Result<Value, AdapterError>> + Unpin + Send + 'static,
    {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let auto_context = options.auto_context;
        let (engine, emit_handle) = Self::new(options, tx, dispatcher);
        let message_id = engine.message_id.clone();
        let run_cancel = cancel.clone();
        if auto_context {
            let ambient_handle = emit_handle.clone();
            tokio::spawn(crate::emit::with_emit_handle(ambient_handle, || {
                engine.run(source, run_cancel)
            }));
        } else {
            tokio::spawn(engine.run(source, run_cancel));
        }
        (
            crate::stream::AdapterStream::new(rx, cancel, message_id),
            emit_handle,
        )
    }

    async fn emit_all(&mut self, chunks: Vec<UiChunk>) {
        for chunk in chunks {
            self.dispatcher.on_chunk(&chunk).await;
            let _ = self.tx.send(chunk);
        }
    }

    /// Consumes `source` until it is exhausted or `cancel` fires,
    /// translating every item into chunks on the shared output channel.
    /// Each upstream item is raw JSON so this single entry point can serve
    /// any of the three input dialects in §4.1 without the caller picking
    /// one ahead of time.
    pub async fn run<S>(mut self, mut source: S, cancel: CancellationToken)
    where
        S: Stream<Item = Result<Value, AdapterError>> + Unpin,
    {
        self.dispatcher.on_start().await;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = source.next() => item,
            };

            match next {
                None => break,
                Some(Ok(value)) => self.handle_value(value).await,
                Some(Err(err)) => {
                    self.handle_upstream_error(&err).await;
                    self.finish().await;
                    return;
                }
            }
        }

        if self.auto_close {
            self.finish().await;
        }
    }

    async fn handle_value(&mut self, value: Value) {
        let event = match serde_json::from_value::<UpstreamEvent>(value) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("skipping malformed upstream event: {err}");
                return;
            }
        };

        let normalized = match normalize::normalize(event) {
            Ok(normalized) => normalized,
            Err(err) => {
                log::warn!("skipping malformed upstream event: {err}");
                return;
            }
        };

        self.handle_normalized(normalized).await;
    }

    async fn handle_normalized(&mut self, normalized: NormalizedEvent) {
        match normalized {
            NormalizedEvent::TextChunk {
                run_id,
                text,
                cumulative,
            } => {
                // Lifecycle-derived chunks may repeat the run's content so
                // far and need C3's prefix diff; raw tokens and message-chunk
                // text are already individual increments.
                let delta = if cumulative {
                    self.delta.compute(&run_id, &text)
                } else {
                    Some(text)
                };
                if let Some(delta) = delta {
                    if !delta.is_empty() {
                        let chunks = self.tracker.on_text_delta(&run_id, &delta);
                        self.emit_all(chunks).await;
                    }
                }
            }
            NormalizedEvent::LlmStart { run_id } => {
                self.delta.reset(&run_id);
                let chunks = self.tracker.on_llm_start(&run_id);
                self.emit_all(chunks).await;
            }
            NormalizedEvent::LlmEnd {
                run_id,
                usage,
                finish_reason,
                ..
            } => {
                if let Some(usage) = usage {
                    self.tracker.note_usage(usage);
                }
                if let Some(reason) = finish_reason {
                    self.tracker.note_finish_reason(reason);
                }
                let chunks = self.tracker.on_llm_end(&run_id);
                self.emit_all(chunks).await;
            }
            NormalizedEvent::ToolStart {
                run_id,
                tool_name,
                input,
            } => {
                let chunks = self.tracker.on_tool_start(&run_id, &tool_name, input);
                self.emit_all(chunks).await;
            }
            NormalizedEvent::ToolEnd { run_id, output } => {
                let chunks = self.tracker.on_tool_end(&run_id, output);
                self.emit_all(chunks).await;
            }
            NormalizedEvent::ChainStart { .. } | NormalizedEvent::ChainEnd { .. } => {
                let chunks = self.tracker.on_chain_boundary();
                self.emit_all(chunks).await;
            }
            NormalizedEvent::Ignored => {}
        }
    }

    /// The source iterator itself raised. Closes open scopes, surfaces the
    /// `error` chunk, and records the terminal finish reason, per §7's
    /// upstream-exception policy.
    async fn handle_upstream_error(&mut self, err: &AdapterError) {
        let mut chunks = self.tracker.close_open_scopes();
        if let Some(text) = err.as_error_text() {
            chunks.push(UiChunk::Error { error_text: text });
        }
        self.tracker.note_error();
        self.emit_all(chunks).await;
        self.dispatcher.on_error(err).await;
    }

    async fn finish(&mut self) {
        if self.tracker.is_finished() {
            return;
        }
        let chunks = self.tracker.close();
        self.emit_all(chunks).await;
        let options = FinishOptions {
            finish_reason: self.tracker.finish_reason(),
            usage: self.tracker.usage(),
        };
        self.dispatcher.on_finish(options).await;
    }
}

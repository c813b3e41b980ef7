//! C6: the manual emission channel. Lets application code push chunks
//! into the same output queue the translation engine writes to, with the
//! same FIFO ordering guarantee, and exposes a per-request ambient handle
//! so code that never received an explicit handle can still reach it.

use std::future::Future;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task_local;

use crate::chunk::{FinishReason, UiChunk, Usage};

/// A cheaply cloneable handle onto the shared output queue. Manual
/// emission does not pass through the lifecycle tracker — maintaining the
/// balance invariants of §3 while using it is the caller's contract.
#[derive(Clone)]
pub struct EmitHandle {
    tx: UnboundedSender<UiChunk>,
}

impl EmitHandle {
    pub(crate) fn new(tx: UnboundedSender<UiChunk>) -> Self {
        Self { tx }
    }

    /// Pushes a chunk onto the shared queue. Silently dropped if the
    /// consumer has already gone away — there is nothing a caller could do
    /// about a closed receiver besides observe it, and the engine's own
    /// sends have the identical silently-dropped behavior on the same
    /// channel.
    fn send(&self, chunk: UiChunk) {
        let _ = self.tx.send(chunk);
    }

    pub fn emit_start(&self, message_id: impl Into<String>) {
        self.send(UiChunk::Start {
            message_id: message_id.into(),
        });
    }

    pub fn emit_start_step(&self) {
        self.send(UiChunk::StartStep);
    }

    pub fn emit_text_start(&self, id: impl Into<String>) {
        self.send(UiChunk::TextStart { id: id.into() });
    }

    pub fn emit_text_delta(&self, id: impl Into<String>, delta: impl Into<String>) {
        self.send(UiChunk::TextDelta {
            id: id.into(),
            delta: delta.into(),
        });
    }

    pub fn emit_text_end(&self, id: impl Into<String>) {
        self.send(UiChunk::TextEnd { id: id.into() });
    }

    pub fn emit_tool_input_start(
        &self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) {
        self.send(UiChunk::ToolInputStart {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
        });
    }

    pub fn emit_tool_input_delta(
        &self,
        tool_call_id: impl Into<String>,
        input_text_delta: impl Into<String>,
    ) {
        self.send(UiChunk::ToolInputDelta {
            tool_call_id: tool_call_id.into(),
            input_text_delta: input_text_delta.into(),
        });
    }

    pub fn emit_tool_input_available(
        &self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: Value,
    ) {
        self.send(UiChunk::ToolInputAvailable {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            input,
        });
    }

    pub fn emit_tool_output_available(&self, tool_call_id: impl Into<String>, output: Value) {
        self.send(UiChunk::ToolOutputAvailable {
            tool_call_id: tool_call_id.into(),
            output,
        });
    }

    pub fn emit_finish_step(&self) {
        self.send(UiChunk::FinishStep);
    }

    pub fn emit_finish(&self, finish_reason: FinishReason, usage: Option<Usage>) {
        self.send(UiChunk::Finish {
            finish_reason,
            usage,
        });
    }

    pub fn emit_error(&self, error_text: impl Into<String>) {
        self.send(UiChunk::Error {
            error_text: error_text.into(),
        });
    }

    pub fn emit_data(&self, data: Value) {
        self.send(UiChunk::Data { data });
    }

    pub fn emit_file(&self, media_type: impl Into<String>, data: Value) {
        self.send(UiChunk::File {
            media_type: media_type.into(),
            data,
        });
    }
}

task_local! {
    static CURRENT_EMIT_HANDLE: EmitHandle;
}

/// Runs `body` with `handle` bound as the ambient emit handle for the
/// duration of the future, scoped to this task the way `tokio::task_local!`
/// scopes any other per-task value. Concurrent requests driven on separate
/// tasks never observe each other's handle.
pub async fn with_emit_handle<F, Fut, T>(handle: EmitHandle, body: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    CURRENT_EMIT_HANDLE.scope(handle, body()).await
}

/// The ambient emit handle for the current task, if one has been bound via
/// [`with_emit_handle`].
pub fn current() -> Option<EmitHandle> {
    CURRENT_EMIT_HANDLE.try_with(|handle| handle.clone()).ok()
}

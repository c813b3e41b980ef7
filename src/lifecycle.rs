//! C4: the lifecycle state machine. Owns every open step, text segment,
//! and tool call for one request, and is the only thing allowed to emit
//! `start`/`start-step`/`finish-step`/`finish` chunks.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::chunk::{FinishReason, UiChunk, Usage};

#[derive(Debug)]
struct TextSegment {
    id: String,
}

#[derive(Debug)]
struct OpenToolCall {
    tool_call_id: String,
}

/// Per-request lifecycle state. Not `Clone` or `Send` by itself — it is
/// meant to be owned exclusively by the single task driving the
/// translation engine (see §5's single-writer discipline).
#[derive(Debug)]
pub struct LifecycleTracker {
    message_id: String,
    message_open: bool,
    current_step: Option<usize>,
    next_step_index: usize,
    open_text_segments: BTreeMap<String, TextSegment>,
    open_tool_calls: BTreeMap<String, OpenToolCall>,
    finish_reason: FinishReason,
    usage: Option<Usage>,
    finished: bool,
    /// When false, the envelope chunks (`start`, `start-step`, `finish-step`,
    /// `finish`) are the caller's responsibility via manual emission; the
    /// tracker still updates its bookkeeping but suppresses those four
    /// chunk types.
    auto_events: bool,
}

impl LifecycleTracker {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self::with_auto_events(message_id, true)
    }

    pub fn with_auto_events(message_id: impl Into<String>, auto_events: bool) -> Self {
        Self {
            message_id: message_id.into(),
            message_open: false,
            current_step: None,
            next_step_index: 0,
            open_text_segments: BTreeMap::new(),
            open_tool_calls: BTreeMap::new(),
            finish_reason: FinishReason::Stop,
            usage: None,
            finished: false,
            auto_events,
        }
    }

    fn ensure_message_open(&mut self, out: &mut Vec<UiChunk>) {
        if !self.message_open {
            self.message_open = true;
            if self.auto_events {
                out.push(UiChunk::Start {
                    message_id: self.message_id.clone(),
                });
            }
        }
    }

    fn ensure_step_open(&mut self, out: &mut Vec<UiChunk>) {
        if self.current_step.is_none() {
            self.current_step = Some(self.next_step_index);
            self.next_step_index += 1;
            if self.auto_events {
                out.push(UiChunk::StartStep);
            }
        }
    }

    fn close_step_if_idle(&mut self, out: &mut Vec<UiChunk>) {
        if self.current_step.is_some()
            && self.open_tool_calls.is_empty()
            && self.open_text_segments.is_empty()
        {
            self.current_step = None;
            if self.auto_events {
                out.push(UiChunk::FinishStep);
            }
        }
    }

    /// Handles an incremental text delta already computed by the delta
    /// computer. No-op if `delta` is empty.
    pub fn on_text_delta(&mut self, run_id: &str, delta: &str) -> Vec<UiChunk> {
        if delta.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.ensure_message_open(&mut out);
        self.ensure_step_open(&mut out);
        if !self.open_text_segments.contains_key(run_id) {
            self.open_text_segments.insert(
                run_id.to_string(),
                TextSegment {
                    id: run_id.to_string(),
                },
            );
            out.push(UiChunk::TextStart {
                id: run_id.to_string(),
            });
        }
        out.push(UiChunk::TextDelta {
            id: run_id.to_string(),
            delta: delta.to_string(),
        });
        out
    }

    /// `on_chat_model_start` / `on_llm_start`. The delta computer resets
    /// its own accumulator; the tracker has nothing to do until text
    /// actually arrives.
    pub fn on_llm_start(&mut self, _run_id: &str) -> Vec<UiChunk> {
        Vec::new()
    }

    /// `on_chat_model_end` / `on_llm_end`. Closes the text segment but
    /// leaves the step open: per §4.3's ordering rule a tool call started
    /// right after this text shares the same step, so step closure is
    /// deferred to `on_tool_end` (or the terminal `close()` for a turn that
    /// never calls a tool).
    pub fn on_llm_end(&mut self, run_id: &str) -> Vec<UiChunk> {
        let mut out = Vec::new();
        if self.open_text_segments.remove(run_id).is_some() {
            out.push(UiChunk::TextEnd {
                id: run_id.to_string(),
            });
        }
        out
    }

    pub fn on_tool_start(&mut self, run_id: &str, tool_name: &str, input: Value) -> Vec<UiChunk> {
        let mut out = Vec::new();
        self.ensure_message_open(&mut out);
        self.ensure_step_open(&mut out);
        if self.open_text_segments.remove(run_id).is_some() {
            out.push(UiChunk::TextEnd {
                id: run_id.to_string(),
            });
        }
        let tool_call_id = run_id.to_string();
        out.push(UiChunk::ToolInputStart {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool_name.to_string(),
        });
        out.push(UiChunk::ToolInputDelta {
            tool_call_id: tool_call_id.clone(),
            input_text_delta: input.to_string(),
        });
        out.push(UiChunk::ToolInputAvailable {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool_name.to_string(),
            input,
        });
        self.finish_reason = self.finish_reason.combine(FinishReason::ToolCalls);
        self.open_tool_calls
            .insert(run_id.to_string(), OpenToolCall { tool_call_id });
        out
    }

    pub fn on_tool_end(&mut self, run_id: &str, output: Value) -> Vec<UiChunk> {
        let mut out = Vec::new();
        if let Some(tool) = self.open_tool_calls.remove(run_id) {
            out.push(UiChunk::ToolOutputAvailable {
                tool_call_id: tool.tool_call_id,
                output,
            });
        }
        self.close_step_if_idle(&mut out);
        out
    }

    /// `on_chain_start` / `on_chain_end` are classified but carry no chunk
    /// of their own; chain-end's only effect is that it must never
    /// double-emit a `finish-step` the model-run events already closed
    /// (see the idempotent `close_step_if_idle` check above).
    pub fn on_chain_boundary(&mut self) -> Vec<UiChunk> {
        Vec::new()
    }

    /// Folds a reported finish reason into the running precedence.
    pub fn note_finish_reason(&mut self, reason: FinishReason) {
        self.finish_reason = self.finish_reason.combine(reason);
    }

    pub fn note_usage(&mut self, usage: Usage) {
        match &mut self.usage {
            Some(existing) => existing.accumulate(&usage),
            None => self.usage = Some(usage),
        }
    }

    /// Closes every still-open text segment and step without emitting the
    /// terminal `finish` — used on the error path, where an `error` chunk
    /// must appear between the closed scopes and the final `finish`.
    pub fn close_open_scopes(&mut self) -> Vec<UiChunk> {
        let mut out = Vec::new();
        self.ensure_message_open(&mut out);
        let open_ids: Vec<String> = self.open_text_segments.keys().cloned().collect();
        for id in open_ids {
            self.open_text_segments.remove(&id);
            out.push(UiChunk::TextEnd { id });
        }
        if self.current_step.is_some() {
            self.current_step = None;
            if self.auto_events {
                out.push(UiChunk::FinishStep);
            }
        }
        out
    }

    /// Emits the terminal `finish` chunk. Safe to call more than once:
    /// subsequent calls are a no-op, matching the idempotent-close
    /// testable property.
    pub fn push_finish(&mut self) -> Vec<UiChunk> {
        if self.finished {
            return Vec::new();
        }
        let mut out = Vec::new();
        if self.auto_events {
            out.push(UiChunk::Finish {
                finish_reason: self.finish_reason,
                usage: self.usage.clone(),
            });
        }
        self.finished = true;
        out
    }

    /// Closes every still-open scope and emits the terminal `finish`.
    pub fn close(&mut self) -> Vec<UiChunk> {
        if self.finished {
            return Vec::new();
        }
        let mut out = self.close_open_scopes();
        out.extend(self.push_finish());
        out
    }

    pub fn finish_reason(&self) -> FinishReason {
        self.finish_reason
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage.clone()
    }

    /// Records an error and forces the finish reason, but does not itself
    /// emit the `error` chunk — the engine does that from the
    /// [`crate::error::AdapterError`] directly, keeping error-text
    /// formatting in one place.
    pub fn note_error(&mut self) {
        self.finish_reason = FinishReason::Error;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn types(chunks: &[UiChunk]) -> Vec<&'static str> {
        chunks.iter().map(UiChunk::type_name).collect()
    }

    #[test]
    fn single_text_run_balances_start_and_end() {
        let mut tracker = LifecycleTracker::new("m1");
        let mut all = Vec::new();
        all.extend(tracker.on_text_delta("r1", "Hi"));
        all.extend(tracker.on_text_delta("r1", " there"));
        all.extend(tracker.on_llm_end("r1"));
        all.extend(tracker.close());

        assert_eq!(
            types(&all),
            vec![
                "start",
                "start-step",
                "text-start",
                "text-delta",
                "text-delta",
                "text-end",
                "finish-step",
                "finish",
            ]
        );
    }

    #[test]
    fn tool_call_shares_the_step_of_the_text_that_preceded_it() {
        let mut tracker = LifecycleTracker::new("m1");
        let mut all = Vec::new();
        all.extend(tracker.on_text_delta("llm1", "Calling"));
        all.extend(tracker.on_llm_end("llm1"));
        all.extend(tracker.on_tool_start("tool1", "get_weather", json!({"city": "Tokyo"})));
        all.extend(tracker.on_tool_end("tool1", json!("Sunny")));
        all.extend(tracker.on_text_delta("llm2", "It is sunny."));
        all.extend(tracker.on_llm_end("llm2"));
        all.extend(tracker.close());

        assert_eq!(
            types(&all),
            vec![
                "start",
                "start-step",
                "text-start",
                "text-delta",
                "text-end",
                "tool-input-start",
                "tool-input-delta",
                "tool-input-available",
                "tool-output-available",
                "finish-step",
                "start-step",
                "text-start",
                "text-delta",
                "text-end",
                "finish-step",
                "finish",
            ]
        );
    }

    #[test]
    fn closing_twice_is_idempotent() {
        let mut tracker = LifecycleTracker::new("m1");
        tracker.on_text_delta("r1", "hi");
        let first = tracker.close();
        let second = tracker.close();
        assert!(!first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn tool_start_sets_tool_calls_finish_reason() {
        let mut tracker = LifecycleTracker::new("m1");
        tracker.on_tool_start("t1", "search", json!("q"));
        tracker.on_tool_end("t1", json!("result"));
        let chunks = tracker.close();
        match chunks.last().unwrap() {
            UiChunk::Finish { finish_reason, .. } => {
                assert_eq!(*finish_reason, FinishReason::ToolCalls);
            }
            other => panic!("unexpected last chunk {other:?}"),
        }
    }

    #[test]
    fn error_path_closes_scopes_before_finish() {
        let mut tracker = LifecycleTracker::new("m1");
        let mut all = Vec::new();
        all.extend(tracker.on_text_delta("r1", "Partial"));
        all.extend(tracker.close_open_scopes());
        all.push(UiChunk::Error {
            error_text: "boom".to_string(),
        });
        tracker.note_error();
        all.extend(tracker.push_finish());

        assert_eq!(
            types(&all),
            vec![
                "start",
                "start-step",
                "text-start",
                "text-delta",
                "text-end",
                "finish-step",
                "error",
                "finish",
            ]
        );
        match all.last().unwrap() {
            UiChunk::Finish { finish_reason, .. } => assert_eq!(*finish_reason, FinishReason::Error),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn auto_events_false_suppresses_envelope_chunks() {
        let mut tracker = LifecycleTracker::with_auto_events("m1", false);
        let mut all = Vec::new();
        all.extend(tracker.on_text_delta("r1", "hi"));
        all.extend(tracker.close());
        assert_eq!(types(&all), vec!["text-start", "text-delta", "text-end"]);
    }

    #[test]
    fn chain_boundary_emits_nothing() {
        let mut tracker = LifecycleTracker::new("m1");
        assert!(tracker.on_chain_boundary().is_empty());
    }
}

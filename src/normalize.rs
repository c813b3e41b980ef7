//! C2: classifies a raw [`UpstreamEvent`] into a canonical record the
//! translation engine can drive the lifecycle tracker and delta computer
//! with.

use serde_json::Value;

use crate::chunk::{FinishReason, Usage};
use crate::error::AdapterError;
use crate::upstream::{LifecycleEvent, LifecycleKind, UpstreamEvent};

pub const ANONYMOUS_RUN_ID: &str = "__anonymous__";
const UNKNOWN_TOOL_NAME: &str = "unknown_tool";

/// A normalized event, independent of which of the three upstream dialects
/// produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    TextChunk {
        run_id: String,
        text: String,
        /// Whether `text` is the cumulative content-so-far for `run_id`
        /// (LangChain-style message chunks) or already an individual
        /// increment (a raw token stream). Only the former needs C3's
        /// prefix-diff treatment; the latter is emitted as-is.
        cumulative: bool,
    },
    LlmStart {
        run_id: String,
    },
    LlmEnd {
        run_id: String,
        output_text: Option<String>,
        /// Token accounting, if the terminal message carried a
        /// `usage_metadata` block (the shape LangChain attaches to the
        /// final `AIMessage` of a run).
        usage: Option<Usage>,
        /// A provider-reported finish reason (e.g. a truncation signal),
        /// if the terminal message carried `response_metadata.finish_reason`.
        finish_reason: Option<FinishReason>,
    },
    ToolStart {
        run_id: String,
        tool_name: String,
        input: Value,
    },
    ToolEnd {
        run_id: String,
        output: Value,
    },
    ChainStart {
        run_id: String,
    },
    ChainEnd {
        run_id: String,
    },
    /// Recognized but not independently actionable (e.g. a bare chain
    /// event without a text or tool payload).
    Ignored,
}

/// Classifies one upstream item. Malformed shapes are reported as an
/// [`AdapterError::MalformedInput`] rather than panicking; callers are
/// expected to log and skip them (see engine.rs).
pub fn normalize(event: UpstreamEvent) -> Result<NormalizedEvent, AdapterError> {
    match event {
        UpstreamEvent::PlainText(text) => Ok(NormalizedEvent::TextChunk {
            run_id: ANONYMOUS_RUN_ID.to_string(),
            text,
            cumulative: false,
        }),
        UpstreamEvent::MessageChunk(chunk) => {
            let text = chunk.content.concat_text();
            Ok(NormalizedEvent::TextChunk {
                run_id: ANONYMOUS_RUN_ID.to_string(),
                text,
                cumulative: false,
            })
        }
        UpstreamEvent::Lifecycle(event) => normalize_lifecycle(event),
    }
}

fn normalize_lifecycle(event: LifecycleEvent) -> Result<NormalizedEvent, AdapterError> {
    let Some(kind) = LifecycleKind::parse(&event.event) else {
        return Ok(NormalizedEvent::Ignored);
    };

    if kind.is_stream_start() {
        return Ok(NormalizedEvent::LlmStart { run_id: event.run_id });
    }

    if kind.is_stream_chunk() {
        let text = event
            .data
            .chunk
            .as_ref()
            .map(extract_chunk_text)
            .unwrap_or_default();
        return Ok(NormalizedEvent::TextChunk {
            run_id: event.run_id,
            text,
            cumulative: true,
        });
    }

    if kind.is_stream_end() {
        let output_text = event.data.output.as_ref().map(extract_chunk_text);
        let usage = event.data.output.as_ref().and_then(extract_usage);
        let finish_reason = event.data.output.as_ref().and_then(extract_finish_reason);
        return Ok(NormalizedEvent::LlmEnd {
            run_id: event.run_id,
            output_text,
            usage,
            finish_reason,
        });
    }

    match kind {
        LifecycleKind::ToolStart => {
            let tool_name = resolve_tool_name(&event);
            let input = event.data.input.clone().unwrap_or(Value::Null);
            Ok(NormalizedEvent::ToolStart {
                run_id: event.run_id,
                tool_name,
                input,
            })
        }
        LifecycleKind::ToolEnd => Ok(NormalizedEvent::ToolEnd {
            run_id: event.run_id,
            output: event.data.output.clone().unwrap_or(Value::Null),
        }),
        LifecycleKind::ChainStart => Ok(NormalizedEvent::ChainStart { run_id: event.run_id }),
        LifecycleKind::ChainEnd => Ok(NormalizedEvent::ChainEnd { run_id: event.run_id }),
        _ => unreachable!("stream start/chunk/end handled above"),
    }
}

/// Extracts text from a `chunk`/`output` payload, which may be a bare
/// string or an object carrying a `content` field (the shape LangChain
/// message objects serialize to).
fn extract_chunk_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Pulls token accounting off a terminal message's `usage_metadata` block
/// (`{ input_tokens, output_tokens, total_tokens }`), the shape LangChain
/// attaches to the `AIMessage` delivered on `on_chat_model_end`/`on_llm_end`.
/// Returns `None` if the payload carries no recognizable usage at all.
fn extract_usage(output: &Value) -> Option<Usage> {
    let metadata = output.get("usage_metadata")?.as_object()?;
    let usage = Usage {
        prompt_tokens: metadata.get("input_tokens").and_then(Value::as_u64),
        completion_tokens: metadata.get("output_tokens").and_then(Value::as_u64),
        total_tokens: metadata.get("total_tokens").and_then(Value::as_u64),
    };
    if usage.prompt_tokens.is_none() && usage.completion_tokens.is_none() && usage.total_tokens.is_none() {
        None
    } else {
        Some(usage)
    }
}

/// Pulls a provider-reported finish reason off a terminal message's
/// `response_metadata.finish_reason` field, when present. Every recognized
/// value is mapped and folded into the engine's running finish reason via
/// [`FinishReason::combine`], so a truncation signal here can only raise the
/// precedence already established by tool calls, never downgrade it.
fn extract_finish_reason(output: &Value) -> Option<FinishReason> {
    let reason = output
        .get("response_metadata")?
        .get("finish_reason")?
        .as_str()?;
    Some(match reason {
        "length" | "max_tokens" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        "stop" | "end_turn" => FinishReason::Stop,
        _ => FinishReason::Unknown,
    })
}

/// Resolves a tool's display name via the fallback chain described for the
/// upstream normalizer: event root, then `data.name`, `serialized.name`,
/// `serialized.kwargs.name`, `metadata.name`, finally a sentinel.
fn resolve_tool_name(event: &LifecycleEvent) -> String {
    if let Some(name) = &event.name {
        return name.clone();
    }
    if let Some(name) = event
        .data
        .input
        .as_ref()
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
    {
        return name.to_string();
    }
    if let Some(serialized) = &event.data.serialized {
        if let Some(name) = serialized.get("name").and_then(Value::as_str) {
            return name.to_string();
        }
        if let Some(name) = serialized
            .get("kwargs")
            .and_then(|v| v.get("name"))
            .and_then(Value::as_str)
        {
            return name.to_string();
        }
    }
    if let Some(name) = event
        .metadata
        .as_ref()
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
    {
        return name.to_string();
    }
    UNKNOWN_TOOL_NAME.to_string()
}

//! The final aggregated assistant message, built incrementally by the
//! callback dispatcher as chunks flow through it and delivered whole to
//! `on_finish`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chunk::FinishReason;

/// One visible piece of the assembled message, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        id: String,
        text: String,
    },
    ToolInvocation {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        step: usize,
        args: Value,
        state: ToolInvocationState,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    StepBoundary {
        step: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    Call,
    Result,
}

/// The final assistant message assembled from a completed (or errored)
/// stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: "assistant".to_string(),
            created_at,
            content: String::new(),
            parts: Vec::new(),
        }
    }

    /// Appends `delta` to the text part with the given `id`, opening a new
    /// part if this is the first delta seen for it.
    pub fn append_text(&mut self, id: &str, delta: &str) {
        if let Some(MessagePart::Text { text, .. }) = self
            .parts
            .iter_mut()
            .find(|p| matches!(p, MessagePart::Text { id: pid, .. } if pid == id))
        {
            text.push_str(delta);
        } else {
            self.parts.push(MessagePart::Text {
                id: id.to_string(),
                text: delta.to_string(),
            });
        }
        self.content.push_str(delta);
    }

    pub fn open_tool_call(
        &mut self,
        tool_call_id: &str,
        tool_name: &str,
        step: usize,
        args: Value,
    ) {
        self.parts.push(MessagePart::ToolInvocation {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            step,
            args,
            state: ToolInvocationState::Call,
            result: None,
        });
    }

    /// Resolves a previously opened tool call in place.
    pub fn resolve_tool_call(&mut self, tool_call_id: &str, output: Value) {
        if let Some(MessagePart::ToolInvocation { state, result, .. }) =
            self.parts.iter_mut().find(|p| {
                matches!(p, MessagePart::ToolInvocation { tool_call_id: id, .. } if id == tool_call_id)
            })
        {
            *state = ToolInvocationState::Result;
            *result = Some(output);
        }
    }

    pub fn push_step_boundary(&mut self, step: usize) {
        self.parts.push(MessagePart::StepBoundary { step });
    }
}

/// Extra context delivered to `on_finish` alongside the assembled message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishOptions {
    pub finish_reason: FinishReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<crate::chunk::Usage>,
}

//! The UI chunk model: a tagged union of the events the client-facing
//! stream can carry, independent of which wire dialect eventually
//! serializes it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token accounting reported by the upstream model, when available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(rename = "promptTokens", skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(rename = "completionTokens", skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(rename = "totalTokens", skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Usage {
    /// Folds another usage report into this one, summing each present field.
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens = add_optional(self.prompt_tokens, other.prompt_tokens);
        self.completion_tokens = add_optional(self.completion_tokens, other.completion_tokens);
        self.total_tokens = add_optional(self.total_tokens, other.total_tokens);
    }
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (Some(x), Some(y)) => Some(x + y),
    }
}

/// Why a message stopped. Precedence when more than one applies:
/// `Error` > `Length` > `ToolCalls` > `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    #[default]
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Error,
    Unknown,
}

impl FinishReason {
    fn rank(self) -> u8 {
        match self {
            FinishReason::Error => 4,
            FinishReason::Length => 3,
            FinishReason::ToolCalls => 2,
            FinishReason::Stop => 1,
            FinishReason::ContentFilter | FinishReason::Unknown => 0,
        }
    }

    /// Combines two candidate finish reasons per the precedence rule.
    pub fn combine(self, other: FinishReason) -> FinishReason {
        if other.rank() >= self.rank() {
            other
        } else {
            self
        }
    }
}

/// One element of the output stream. Serializes as a tagged union with
/// discriminator field `type`, matching the wire shape of both the v4 and
/// v5 protocol dialects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiChunk {
    Start {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    StartStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ToolInputStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
    },
    ToolInputDelta {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "inputTextDelta")]
        input_text_delta: String,
    },
    ToolInputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: Value,
    },
    ToolOutputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        output: Value,
    },
    FinishStep,
    Finish {
        #[serde(rename = "finishReason")]
        finish_reason: FinishReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    Error {
        #[serde(rename = "errorText")]
        error_text: String,
    },
    Data {
        data: Value,
    },
    File {
        #[serde(rename = "mediaType")]
        media_type: String,
        data: Value,
    },
}

impl UiChunk {
    /// The discriminator string this chunk serializes its `type` field as.
    pub fn type_name(&self) -> &'static str {
        match self {
            UiChunk::Start { .. } => "start",
            UiChunk::StartStep => "start-step",
            UiChunk::TextStart { .. } => "text-start",
            UiChunk::TextDelta { .. } => "text-delta",
            UiChunk::TextEnd { .. } => "text-end",
            UiChunk::ToolInputStart { .. } => "tool-input-start",
            UiChunk::ToolInputDelta { .. } => "tool-input-delta",
            UiChunk::ToolInputAvailable { .. } => "tool-input-available",
            UiChunk::ToolOutputAvailable { .. } => "tool-output-available",
            UiChunk::FinishStep => "finish-step",
            UiChunk::Finish { .. } => "finish",
            UiChunk::Error { .. } => "error",
            UiChunk::Data { .. } => "data",
            UiChunk::File { .. } => "file",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            UiChunk::TextStart { .. } | UiChunk::TextDelta { .. } | UiChunk::TextEnd { .. }
        )
    }

    pub fn is_tool(&self) -> bool {
        matches!(
            self,
            UiChunk::ToolInputStart { .. }
                | UiChunk::ToolInputDelta { .. }
                | UiChunk::ToolInputAvailable { .. }
                | UiChunk::ToolOutputAvailable { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UiChunk::Finish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_delta_serializes_with_kebab_type() {
        let chunk = UiChunk::TextDelta {
            id: "seg1".into(),
            delta: "hi".into(),
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["type"], "text-delta");
        assert_eq!(value["id"], "seg1");
        assert_eq!(value["delta"], "hi");
    }

    #[test]
    fn finish_omits_usage_when_absent() {
        let chunk = UiChunk::Finish {
            finish_reason: FinishReason::Stop,
            usage: None,
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["finishReason"], "stop");
        assert!(value.get("usage").is_none());
    }

    #[test]
    fn finish_reason_precedence_prefers_error() {
        let combined = FinishReason::Stop
            .combine(FinishReason::ToolCalls)
            .combine(FinishReason::Error)
            .combine(FinishReason::Length);
        assert_eq!(combined, FinishReason::Error);
    }

    #[test]
    fn finish_reason_precedence_length_over_tool_calls() {
        let combined = FinishReason::ToolCalls.combine(FinishReason::Length);
        assert_eq!(combined, FinishReason::Length);
    }

    #[test]
    fn usage_accumulates_across_runs() {
        let mut total = Usage {
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
            total_tokens: Some(15),
        };
        total.accumulate(&Usage {
            prompt_tokens: Some(3),
            completion_tokens: None,
            total_tokens: Some(3),
        });
        assert_eq!(total.prompt_tokens, Some(13));
        assert_eq!(total.completion_tokens, Some(5));
        assert_eq!(total.total_tokens, Some(18));
    }

    #[test]
    fn tool_input_available_round_trips() {
        let chunk = UiChunk::ToolInputAvailable {
            tool_call_id: "t1".into(),
            tool_name: "get_weather".into(),
            input: json!({"city": "Tokyo"}),
        };
        let value = serde_json::to_value(&chunk).unwrap();
        let back: UiChunk = serde_json::from_value(value).unwrap();
        assert_eq!(chunk, back);
    }
}

//! Shapes of the events accepted on the upstream channel, before
//! normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single upstream item. Three dialects share the same channel: a bare
/// string, a message-chunk-like object, or a lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpstreamEvent {
    PlainText(String),
    MessageChunk(MessageChunk),
    Lifecycle(LifecycleEvent),
}

/// An object carrying a `content` field that is either a bare string or a
/// list of typed segments (only the text among them is extracted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageChunk {
    pub content: ContentValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    Text(String),
    Segments(Vec<ContentSegment>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSegment {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(flatten)]
    pub rest: Value,
}

impl ContentValue {
    /// Concatenates whatever text this content carries, ignoring any
    /// non-text segments (tool-call metadata arrives via lifecycle events,
    /// not here).
    pub fn concat_text(&self) -> String {
        match self {
            ContentValue::Text(s) => s.clone(),
            ContentValue::Segments(segments) => segments
                .iter()
                .filter_map(|s| s.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// A lifecycle / tracing event, the richest of the three upstream shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event: String,
    #[serde(rename = "run_id")]
    pub run_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: LifecycleData,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub tags: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleData {
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub chunk: Option<Value>,
    #[serde(default)]
    pub serialized: Option<Value>,
}

/// The recognized `event` values. Anything else is ignored by the
/// normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    ChatModelStart,
    ChatModelStream,
    ChatModelEnd,
    LlmStart,
    LlmStream,
    LlmEnd,
    ToolStart,
    ToolEnd,
    ChainStart,
    ChainEnd,
}

impl LifecycleKind {
    pub fn parse(event: &str) -> Option<Self> {
        match event {
            "on_chat_model_start" => Some(Self::ChatModelStart),
            "on_chat_model_stream" => Some(Self::ChatModelStream),
            "on_chat_model_end" => Some(Self::ChatModelEnd),
            "on_llm_start" => Some(Self::LlmStart),
            "on_llm_stream" => Some(Self::LlmStream),
            "on_llm_end" => Some(Self::LlmEnd),
            "on_tool_start" => Some(Self::ToolStart),
            "on_tool_end" => Some(Self::ToolEnd),
            "on_chain_start" => Some(Self::ChainStart),
            "on_chain_end" => Some(Self::ChainEnd),
            _ => None,
        }
    }

    pub fn is_stream_start(self) -> bool {
        matches!(self, Self::ChatModelStart | Self::LlmStart)
    }

    pub fn is_stream_chunk(self) -> bool {
        matches!(self, Self::ChatModelStream | Self::LlmStream)
    }

    pub fn is_stream_end(self) -> bool {
        matches!(self, Self::ChatModelEnd | Self::LlmEnd)
    }
}

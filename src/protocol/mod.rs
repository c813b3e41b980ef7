//! C7: renders a [`UiChunk`](crate::chunk::UiChunk) under either wire
//! dialect the client-facing data-stream protocol supports.

pub mod v4;
pub mod v5;

use crate::chunk::UiChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Custom-prefix lines (`<prefix>:<json>\n`).
    V4,
    /// Server-sent events (`data: <json>\n\n`).
    V5,
}

impl ProtocolVersion {
    pub fn content_type(self) -> &'static str {
        match self {
            ProtocolVersion::V4 => "text/plain; charset=utf-8",
            ProtocolVersion::V5 => "text/event-stream",
        }
    }

    /// Headers beyond `Content-Type` this dialect expects on the response.
    pub fn extra_headers(self) -> Vec<(&'static str, &'static str)> {
        match self {
            ProtocolVersion::V4 => vec![("x-vercel-ai-data-stream", "v1")],
            ProtocolVersion::V5 => vec![("cache-control", "no-cache"), ("connection", "keep-alive")],
        }
    }

    /// Serializes one chunk. `message_id` is needed even for chunks that
    /// don't carry it themselves: v4's `start-step` line repeats it on
    /// every step.
    pub fn serialize(self, chunk: &UiChunk, message_id: &str) -> Option<String> {
        match self {
            ProtocolVersion::V4 => v4::serialize(chunk, message_id),
            ProtocolVersion::V5 => Some(v5::serialize(chunk)),
        }
    }

    /// The sentinel a consumer should see once the stream is done, if any.
    pub fn terminator(self) -> Option<&'static str> {
        match self {
            ProtocolVersion::V4 => None,
            ProtocolVersion::V5 => Some(v5::DONE_MARKER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_has_no_terminator_v5_does() {
        assert_eq!(ProtocolVersion::V4.terminator(), None);
        assert_eq!(ProtocolVersion::V5.terminator(), Some("data: [DONE]\n\n"));
    }

    #[test]
    fn content_types_match_each_dialect() {
        assert_eq!(ProtocolVersion::V4.content_type(), "text/plain; charset=utf-8");
        assert_eq!(ProtocolVersion::V5.content_type(), "text/event-stream");
    }
}

//! The v5 "SSE" dialect: each chunk is its own `data: <json>\n\n` frame,
//! with the JSON equal to the tagged-union chunk verbatim.

use crate::chunk::UiChunk;

pub const DONE_MARKER: &str = "data: [DONE]\n\n";

pub fn serialize(chunk: &UiChunk) -> String {
    let json = serde_json::to_string(chunk).expect("UiChunk always serializes");
    format!("data: {json}\n\n")
}

//! The v4 "custom prefix" dialect: one `<prefix>:<json>\n` line per chunk.
//!
//! `start`, `text-start`/`text-end`, and `tool-input-delta` have no v4
//! line of their own — v4 opens the message implicitly on the first
//! content line, and a text segment's boundaries are implied by
//! surrounding `0:` lines rather than marked explicitly.

use serde_json::json;

use crate::chunk::UiChunk;

pub fn serialize(chunk: &UiChunk, message_id: &str) -> Option<String> {
    let (prefix, payload) = match chunk {
        UiChunk::Start { .. } => return None,
        UiChunk::StartStep => ('f', json!({ "messageId": message_id })),
        UiChunk::TextStart { .. } | UiChunk::TextEnd { .. } => return None,
        UiChunk::TextDelta { delta, .. } => ('0', json!(delta)),
        UiChunk::Data { data } => ('2', json!([data])),
        UiChunk::File { media_type, data } => {
            ('2', json!([{ "mediaType": media_type, "data": data }]))
        }
        UiChunk::Error { error_text } => ('3', json!(error_text)),
        UiChunk::ToolInputStart {
            tool_call_id,
            tool_name,
        } => (
            'b',
            json!({ "toolCallId": tool_call_id, "toolName": tool_name }),
        ),
        UiChunk::ToolInputDelta { .. } => return None,
        UiChunk::ToolInputAvailable {
            tool_call_id,
            tool_name,
            input,
        } => (
            '9',
            json!({ "toolCallId": tool_call_id, "toolName": tool_name, "args": input }),
        ),
        UiChunk::ToolOutputAvailable {
            tool_call_id,
            output,
        } => (
            'a',
            json!({ "toolCallId": tool_call_id, "result": output }),
        ),
        // The step's own finish reason/usage are not yet decided mid-stream;
        // v4 still requires the fields on every `e:` line, so a provisional
        // "stop"/empty-usage placeholder is used until the terminal `d:`
        // line carries the authoritative values.
        UiChunk::FinishStep => (
            'e',
            json!({ "finishReason": "stop", "usage": {}, "isContinued": false }),
        ),
        UiChunk::Finish {
            finish_reason,
            usage,
        } => (
            'd',
            json!({ "finishReason": finish_reason, "usage": usage.clone().unwrap_or_default() }),
        ),
    };
    Some(format!("{prefix}:{payload}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::FinishReason;

    #[test]
    fn start_has_no_v4_line() {
        assert_eq!(
            serialize(
                &UiChunk::Start {
                    message_id: "m1".into()
                },
                "m1"
            ),
            None
        );
    }

    #[test]
    fn start_step_carries_message_id() {
        let line = serialize(&UiChunk::StartStep, "m1").unwrap();
        assert_eq!(line, "f:{\"messageId\":\"m1\"}\n");
    }

    #[test]
    fn text_delta_is_prefix_zero() {
        let line = serialize(
            &UiChunk::TextDelta {
                id: "seg1".into(),
                delta: "Hello".into(),
            },
            "m1",
        )
        .unwrap();
        assert_eq!(line, "0:\"Hello\"\n");
    }

    #[test]
    fn finish_is_prefix_d_with_finish_reason() {
        let line = serialize(
            &UiChunk::Finish {
                finish_reason: FinishReason::Stop,
                usage: None,
            },
            "m1",
        )
        .unwrap();
        assert_eq!(line, "d:{\"finishReason\":\"stop\",\"usage\":{}}\n");
    }

    #[test]
    fn tool_input_available_uses_args_key_not_input() {
        let line = serialize(
            &UiChunk::ToolInputAvailable {
                tool_call_id: "t1".into(),
                tool_name: "get_weather".into(),
                input: serde_json::json!({"city": "Tokyo"}),
            },
            "m1",
        )
        .unwrap();
        assert!(line.starts_with("9:"));
        assert!(line.contains("\"args\":{\"city\":\"Tokyo\"}"));
    }

    #[test]
    fn scenario_two_full_line_sequence() {
        let chunks = vec![
            UiChunk::Start {
                message_id: "m1".into(),
            },
            UiChunk::StartStep,
            UiChunk::TextStart { id: "seg".into() },
            UiChunk::TextDelta {
                id: "seg".into(),
                delta: "Hello".into(),
            },
            UiChunk::TextDelta {
                id: "seg".into(),
                delta: " ".into(),
            },
            UiChunk::TextDelta {
                id: "seg".into(),
                delta: "world".into(),
            },
            UiChunk::TextEnd { id: "seg".into() },
            UiChunk::FinishStep,
            UiChunk::Finish {
                finish_reason: FinishReason::Stop,
                usage: None,
            },
        ];
        let rendered: String = chunks
            .iter()
            .filter_map(|c| serialize(c, "m1"))
            .collect();
        assert_eq!(
            rendered,
            "f:{\"messageId\":\"m1\"}\n\
             0:\"Hello\"\n\
             0:\" \"\n\
             0:\"world\"\n\
             e:{\"finishReason\":\"stop\",\"isContinued\":false,\"usage\":{}}\n\
             d:{\"finishReason\":\"stop\",\"usage\":{}}\n"
        );
    }
}

//! C9: observer hooks invoked as the engine translates chunks, and the
//! incremental [`Message`] assembly that feeds the `on_finish` hook.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::chunk::UiChunk;
use crate::error::AdapterError;
use crate::message::{FinishOptions, Message};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub type OnStart = Arc<dyn Fn() -> BoxFuture + Send + Sync>;
pub type OnText = Arc<dyn Fn(&str) -> BoxFuture + Send + Sync>;
pub type OnToolCall = Arc<dyn Fn(&str, &str, &Value) -> BoxFuture + Send + Sync>;
pub type OnToolResult = Arc<dyn Fn(&str, &Value) -> BoxFuture + Send + Sync>;
pub type OnStepStart = Arc<dyn Fn(usize) -> BoxFuture + Send + Sync>;
pub type OnStepFinish = Arc<dyn Fn(usize) -> BoxFuture + Send + Sync>;
pub type OnError = Arc<dyn Fn(&AdapterError) -> BoxFuture + Send + Sync>;
pub type OnFinish = Arc<dyn Fn(Message, FinishOptions) -> BoxFuture + Send + Sync>;

/// Optional observer hooks. Every field defaults to `None`; the dispatcher
/// skips hooks that were never set.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_start: Option<OnStart>,
    pub on_text: Option<OnText>,
    pub on_tool_call: Option<OnToolCall>,
    pub on_tool_result: Option<OnToolResult>,
    pub on_step_start: Option<OnStepStart>,
    pub on_step_finish: Option<OnStepFinish>,
    pub on_error: Option<OnError>,
    pub on_finish: Option<OnFinish>,
}

/// Drives the callbacks for one request and incrementally assembles the
/// final [`Message`] as chunks are observed via [`CallbackDispatcher::on_chunk`].
pub struct CallbackDispatcher {
    callbacks: Callbacks,
    message: Message,
    current_step: usize,
}

impl CallbackDispatcher {
    pub fn new(callbacks: Callbacks, message_id: impl Into<String>) -> Self {
        Self {
            callbacks,
            message: Message::new(message_id, now()),
            current_step: 0,
        }
    }

    pub async fn on_start(&self) {
        if let Some(hook) = &self.callbacks.on_start {
            hook().await;
        }
    }

    /// Invoked once per chunk produced by the translation engine, in
    /// emission order, to keep the assembled message and the text/tool
    /// hooks in sync with the stream.
    pub async fn on_chunk(&mut self, chunk: &UiChunk) {
        match chunk {
            UiChunk::StartStep => {
                self.message.push_step_boundary(self.current_step);
                if let Some(hook) = &self.callbacks.on_step_start {
                    hook(self.current_step).await;
                }
            }
            UiChunk::FinishStep => {
                if let Some(hook) = &self.callbacks.on_step_finish {
                    hook(self.current_step).await;
                }
                self.current_step += 1;
            }
            UiChunk::TextDelta { id, delta } => {
                self.message.append_text(id, delta);
                if let Some(hook) = &self.callbacks.on_text {
                    hook(delta).await;
                }
            }
            UiChunk::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                self.message
                    .open_tool_call(tool_call_id, tool_name, self.current_step, input.clone());
                if let Some(hook) = &self.callbacks.on_tool_call {
                    hook(tool_call_id, tool_name, input).await;
                }
            }
            UiChunk::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                self.message.resolve_tool_call(tool_call_id, output.clone());
                if let Some(hook) = &self.callbacks.on_tool_result {
                    hook(tool_call_id, output).await;
                }
            }
            _ => {}
        }
    }

    /// Forwards an error to `on_error`. Exceptions a hook itself raises are
    /// not modeled in Rust (a panic would unwind regardless), so unlike the
    /// originating runtime this dispatcher does not attempt to further
    /// catch hook failures here.
    pub async fn on_error(&self, err: &AdapterError) {
        if let Some(hook) = &self.callbacks.on_error {
            hook(err).await;
        }
    }

    pub async fn on_finish(&mut self, options: FinishOptions) {
        if let Some(hook) = &self.callbacks.on_finish {
            hook(self.message.clone(), options).await;
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }
}

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::FinishReason;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn noop_callbacks() -> Callbacks {
        Callbacks::default()
    }

    #[tokio::test]
    async fn text_delta_updates_message_and_invokes_hook() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let callbacks = Callbacks {
            on_text: Some(Arc::new(move |_delta: &str| {
                let seen = seen2.clone();
                Box::pin(async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
            })),
            ..noop_callbacks()
        };
        let mut dispatcher = CallbackDispatcher::new(callbacks, "m1");
        dispatcher
            .on_chunk(&UiChunk::TextDelta {
                id: "seg1".into(),
                delta: "hi".into(),
            })
            .await;

        assert_eq!(dispatcher.message().content, "hi");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_step_invokes_on_step_start_with_the_current_index() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let callbacks = Callbacks {
            on_step_start: Some(Arc::new(move |step: usize| {
                let seen = seen2.clone();
                Box::pin(async move {
                    seen.lock().unwrap().push(step);
                })
            })),
            ..noop_callbacks()
        };
        let mut dispatcher = CallbackDispatcher::new(callbacks, "m1");
        dispatcher.on_chunk(&UiChunk::StartStep).await;
        dispatcher.on_chunk(&UiChunk::FinishStep).await;
        dispatcher.on_chunk(&UiChunk::StartStep).await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn tool_call_then_result_transitions_message_part() {
        let mut dispatcher = CallbackDispatcher::new(noop_callbacks(), "m1");
        dispatcher
            .on_chunk(&UiChunk::ToolInputAvailable {
                tool_call_id: "t1".into(),
                tool_name: "get_weather".into(),
                input: serde_json::json!({"city": "Tokyo"}),
            })
            .await;
        dispatcher
            .on_chunk(&UiChunk::ToolOutputAvailable {
                tool_call_id: "t1".into(),
                output: serde_json::json!("Sunny"),
            })
            .await;

        assert_eq!(dispatcher.message().parts.len(), 1);
    }

    #[tokio::test]
    async fn on_finish_delivers_assembled_message() {
        let delivered = Arc::new(std::sync::Mutex::new(None));
        let delivered2 = delivered.clone();
        let callbacks = Callbacks {
            on_finish: Some(Arc::new(move |message: Message, _options: FinishOptions| {
                let delivered = delivered2.clone();
                Box::pin(async move {
                    *delivered.lock().unwrap() = Some(message);
                })
            })),
            ..noop_callbacks()
        };
        let mut dispatcher = CallbackDispatcher::new(callbacks, "m1");
        dispatcher
            .on_chunk(&UiChunk::TextDelta {
                id: "seg1".into(),
                delta: "done".into(),
            })
            .await;
        dispatcher
            .on_finish(FinishOptions {
                finish_reason: FinishReason::Stop,
                usage: None,
            })
            .await;

        let message = delivered.lock().unwrap().clone().unwrap();
        assert_eq!(message.content, "done");
    }
}

//! Language model boundary: the trait a model backend implements and the
//! per-call configuration chains hand to it. Concrete HTTP backends live
//! outside this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChainError, Result};
use crate::message::{Message, MessageRole};

/// Streaming sink invoked synchronously for each response chunk. Returning
/// an error must abort the in-flight model call.
pub type StreamFunc = Arc<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

/// The name and JSON-encoded arguments of a function the model asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A structured tool invocation request carried on a response choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "function")]
    pub function_call: Option<FunctionCall>,
}

/// One ranked response choice returned by a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentChoice {
    pub content: String,
    pub stop_reason: String,
    #[serde(default)]
    pub generation_info: HashMap<String, Value>,
    pub func_call: Option<FunctionCall>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl ContentChoice {
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// The response of a content generation call; may carry several choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentResponse {
    pub choices: Vec<ContentChoice>,
}

/// A function the model may be told it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Option<Value>,
}

/// A tool declaration passed to the model alongside the messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: Option<FunctionDefinition>,
}

/// Options for one model call. Every field has a default; `None` means the
/// caller did not ask to change it and the backend should use its own.
#[derive(Clone, Default)]
pub struct CallOptions {
    pub model: Option<String>,
    pub candidate_count: Option<usize>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub stop_words: Option<Vec<String>>,
    pub streaming_func: Option<StreamFunc>,
    pub top_k: Option<i32>,
    pub top_p: Option<f64>,
    pub seed: Option<i64>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub repetition_penalty: Option<f64>,
    pub json_mode: bool,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<Value>,
    pub metadata: Option<HashMap<String, Value>>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stop_words(mut self, stop_words: Vec<String>) -> Self {
        self.stop_words = Some(stop_words);
        self
    }

    pub fn with_streaming_func(mut self, func: StreamFunc) -> Self {
        self.streaming_func = Some(func);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Minimal abstraction over a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate_content(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<ContentResponse>;
}

/// Convenience wrapper for single-prompt, single-text-answer interactions.
pub async fn generate_from_single_prompt<M: LanguageModel + ?Sized>(
    model: &M,
    prompt: &str,
    options: &CallOptions,
) -> Result<String> {
    let messages = [Message::new(MessageRole::Human, prompt)];
    let response = model.generate_content(&messages, options).await?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ChainError::EmptyResponseFromModel)?;
    Ok(choice.content)
}

/// Scripted model for tests: hands out queued responses in order. When a
/// streaming sink is supplied the whole response is offered to it first and
/// a sink error aborts the call.
#[derive(Default)]
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn generate_content(
        &self,
        _messages: &[Message],
        options: &CallOptions,
    ) -> Result<ContentResponse> {
        let next = self
            .responses
            .lock()
            .map_err(|_| ChainError::LanguageModel("stub model lock poisoned".into()))?
            .pop_front()
            .ok_or_else(|| ChainError::LanguageModel("stub model has no scripted response".into()))?;

        if let Some(sink) = &options.streaming_func {
            sink(next.as_bytes())?;
        }

        Ok(ContentResponse {
            choices: vec![ContentChoice::from_text(next)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn single_prompt_returns_first_choice() {
        let model = StubModel::new(vec!["hello".into(), "unused".into()]);

        let reply = generate_from_single_prompt(&model, "hi", &CallOptions::new())
            .await
            .unwrap();

        assert_eq!(reply, "hello");
        assert_eq!(model.remaining(), 1);
    }

    #[tokio::test]
    async fn exhausted_script_is_a_model_error() {
        let model = StubModel::new(Vec::new());

        let err = generate_from_single_prompt(&model, "hi", &CallOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::LanguageModel(_)));
    }

    #[tokio::test]
    async fn streaming_sink_error_aborts_the_call() {
        let model = StubModel::new(vec!["chunk".into()]);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_by_sink = seen.clone();
        let options = CallOptions::new().with_streaming_func(Arc::new(move |_chunk| {
            seen_by_sink.fetch_add(1, Ordering::SeqCst);
            Err(ChainError::LanguageModel("sink refused chunk".into()))
        }));

        let err = generate_from_single_prompt(&model, "hi", &options)
            .await
            .unwrap_err();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(matches!(err, ChainError::LanguageModel(_)));
    }
}

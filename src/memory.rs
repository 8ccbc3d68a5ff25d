//! Memory carries state between successive chain calls: variables are
//! loaded into the input map before a call and the completed turn is
//! persisted afterwards. Storage backends live outside this crate; the
//! buffer here keeps everything in process memory.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{ChainError, Result};
use crate::message::Message;
use crate::schema::ChainValues;

#[async_trait]
pub trait Memory: Send + Sync {
    /// Names of the variables `load_variables` will produce.
    fn memory_variables(&self) -> Vec<String>;

    /// Extra input values for the upcoming call, given what the caller
    /// already supplied.
    async fn load_variables(&self, inputs: &ChainValues) -> Result<ChainValues>;

    /// Persist one completed turn.
    async fn save_context(&self, inputs: &ChainValues, outputs: &ChainValues) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Memory that remembers nothing. The default for chains that do not
/// opt into state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemory;

#[async_trait]
impl Memory for NoMemory {
    fn memory_variables(&self) -> Vec<String> {
        Vec::new()
    }

    async fn load_variables(&self, _inputs: &ChainValues) -> Result<ChainValues> {
        Ok(ChainValues::new())
    }

    async fn save_context(&self, _inputs: &ChainValues, _outputs: &ChainValues) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory ordered transcript of role-tagged messages.
#[derive(Debug, Clone, Default)]
pub struct ChatMessageHistory {
    messages: Vec<Message>,
}

impl ChatMessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn add_human_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::human(content));
    }

    pub fn add_ai_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::ai(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Render a transcript as prefixed plain text, one message per line.
pub fn buffer_as_string(messages: &[Message], human_prefix: &str, ai_prefix: &str) -> String {
    let mut lines = Vec::with_capacity(messages.len());
    for message in messages {
        let prefix = match message.role {
            crate::message::MessageRole::Human => human_prefix,
            crate::message::MessageRole::Ai => ai_prefix,
            other => other.as_prefix(),
        };
        lines.push(format!("{prefix}: {}", message.content));
    }
    lines.join("\n")
}

/// Conversation memory exposing the full transcript under a single
/// variable, either as a prefixed string or as structured messages.
pub struct ConversationBuffer {
    history: Mutex<ChatMessageHistory>,
    memory_key: String,
    human_prefix: String,
    ai_prefix: String,
    input_key: Option<String>,
    output_key: Option<String>,
    return_messages: bool,
}

impl Default for ConversationBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(ChatMessageHistory::new()),
            memory_key: "history".to_string(),
            human_prefix: "Human".to_string(),
            ai_prefix: "AI".to_string(),
            input_key: None,
            output_key: None,
            return_messages: false,
        }
    }

    pub fn with_memory_key(mut self, key: impl Into<String>) -> Self {
        self.memory_key = key.into();
        self
    }

    pub fn with_human_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.human_prefix = prefix.into();
        self
    }

    pub fn with_ai_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ai_prefix = prefix.into();
        self
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = Some(key.into());
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn returning_messages(mut self) -> Self {
        self.return_messages = true;
        self
    }

    pub fn with_history(mut self, history: ChatMessageHistory) -> Self {
        self.history = Mutex::new(history);
        self
    }

    /// Pick the value for this turn out of a value map: the pinned key if
    /// one was configured, otherwise the map's single entry.
    fn turn_value(values: &ChainValues, pinned: &Option<String>, side: &str) -> Result<String> {
        let value = match pinned {
            Some(key) => values
                .get(key)
                .ok_or_else(|| ChainError::Memory(format!("missing {side} key `{key}`")))?,
            None => {
                if values.len() != 1 {
                    return Err(ChainError::Memory(format!(
                        "ambiguous {side} values for buffer memory: expected one key, got {}",
                        values.len()
                    )));
                }
                values
                    .values()
                    .next()
                    .ok_or_else(|| ChainError::Memory(format!("no {side} values")))?
            }
        };
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(ChainError::Memory(format!(
                "{side} value for buffer memory is not a string: {other}"
            ))),
        }
    }
}

#[async_trait]
impl Memory for ConversationBuffer {
    fn memory_variables(&self) -> Vec<String> {
        vec![self.memory_key.clone()]
    }

    async fn load_variables(&self, _inputs: &ChainValues) -> Result<ChainValues> {
        let history = self.history.lock().await;
        let mut values = ChainValues::new();
        if self.return_messages {
            values.insert(
                self.memory_key.clone(),
                serde_json::to_value(history.messages())?,
            );
        } else {
            values.insert(
                self.memory_key.clone(),
                Value::String(buffer_as_string(
                    history.messages(),
                    &self.human_prefix,
                    &self.ai_prefix,
                )),
            );
        }
        Ok(values)
    }

    async fn save_context(&self, inputs: &ChainValues, outputs: &ChainValues) -> Result<()> {
        // The memory variable may echo back through the inputs; ignore it
        // when inferring which key holds this turn's user input.
        let mut turn_inputs = inputs.clone();
        turn_inputs.remove(&self.memory_key);

        let user_text = Self::turn_value(&turn_inputs, &self.input_key, "input")?;
        let ai_text = Self::turn_value(outputs, &self.output_key, "output")?;

        let mut history = self.history.lock().await;
        history.add_human_message(user_text);
        history.add_ai_message(ai_text);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.history.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> ChainValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn buffer_round_trips_a_turn_as_text() {
        let memory = ConversationBuffer::new();

        memory
            .save_context(
                &values(&[("input", json!("hi there"))]),
                &values(&[("output", json!("hello!"))]),
            )
            .await
            .unwrap();

        let loaded = memory.load_variables(&ChainValues::new()).await.unwrap();
        assert_eq!(loaded["history"], json!("Human: hi there\nAI: hello!"));
    }

    #[tokio::test]
    async fn buffer_can_return_structured_messages() {
        let memory = ConversationBuffer::new().returning_messages();

        memory
            .save_context(
                &values(&[("input", json!("q"))]),
                &values(&[("output", json!("a"))]),
            )
            .await
            .unwrap();

        let loaded = memory.load_variables(&ChainValues::new()).await.unwrap();
        let messages = loaded["history"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "human");
        assert_eq!(messages[1]["content"], "a");
    }

    #[tokio::test]
    async fn ambiguous_inputs_need_a_pinned_key() {
        let memory = ConversationBuffer::new();
        let inputs = values(&[("a", json!("x")), ("b", json!("y"))]);
        let outputs = values(&[("output", json!("z"))]);

        let err = memory.save_context(&inputs, &outputs).await.unwrap_err();
        assert!(matches!(err, ChainError::Memory(_)));

        let pinned = ConversationBuffer::new().with_input_key("a");
        pinned.save_context(&inputs, &outputs).await.unwrap();
        let loaded = pinned.load_variables(&ChainValues::new()).await.unwrap();
        assert_eq!(loaded["history"], json!("Human: x\nAI: z"));
    }

    #[tokio::test]
    async fn custom_prefixes_show_up_in_the_transcript() {
        let memory = ConversationBuffer::new()
            .with_human_prefix("User")
            .with_ai_prefix("Assistant");

        memory
            .save_context(
                &values(&[("input", json!("ping"))]),
                &values(&[("output", json!("pong"))]),
            )
            .await
            .unwrap();

        let loaded = memory.load_variables(&ChainValues::new()).await.unwrap();
        assert_eq!(loaded["history"], json!("User: ping\nAssistant: pong"));
    }

    #[tokio::test]
    async fn clear_empties_the_transcript() {
        let memory = ConversationBuffer::new();
        memory
            .save_context(
                &values(&[("input", json!("x"))]),
                &values(&[("output", json!("y"))]),
            )
            .await
            .unwrap();

        memory.clear().await.unwrap();

        let loaded = memory.load_variables(&ChainValues::new()).await.unwrap();
        assert_eq!(loaded["history"], json!(""));
    }
}

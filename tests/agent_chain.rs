//! End-to-end: a stub-model-backed agent driven by the executor through
//! the full chain pipeline, with conversation memory persisting turns.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use chainloop::{
    chain, generate_from_single_prompt, Agent, AgentAction, AgentDecision, AgentFinish,
    AgentStep, ChainCallOptions, ChainError, ChainValues, ConversationBuffer, Executor,
    LanguageModel, Memory, Result, StubModel, Tool, TracingHandler, INTERMEDIATE_STEPS_KEY,
};

/// Install a subscriber so `TracingHandler` output lands in the captured
/// test log. Safe to call from every test; only the first wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal planning strategy over a raw model: the model answers either
/// `ACT <tool> <input>` or `FINAL <answer>`; anything else is unparsable.
struct LineAgent<M> {
    model: M,
    tools: Vec<Arc<dyn Tool>>,
}

#[async_trait]
impl<M: LanguageModel> Agent for LineAgent<M> {
    async fn plan(
        &self,
        _steps: &[AgentStep],
        inputs: &HashMap<String, String>,
    ) -> Result<AgentDecision> {
        let prompt = inputs.get("input").cloned().unwrap_or_default();
        let reply =
            generate_from_single_prompt(&self.model, &prompt, &Default::default()).await?;

        if let Some(answer) = reply.strip_prefix("FINAL ") {
            let mut values = ChainValues::new();
            values.insert("output".into(), json!(answer));
            return Ok(AgentDecision::Finish(AgentFinish::new(values, reply.clone())));
        }
        if let Some(rest) = reply.strip_prefix("ACT ") {
            if let Some((tool, input)) = rest.split_once(' ') {
                return Ok(AgentDecision::Act(vec![AgentAction::new(
                    tool,
                    input,
                    reply.clone(),
                )]));
            }
        }
        Err(ChainError::UnableToParseOutput(reply))
    }

    fn input_keys(&self) -> Vec<String> {
        vec!["input".into()]
    }

    fn output_keys(&self) -> Vec<String> {
        vec!["output".into()]
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }
}

struct ReverseTool;

#[async_trait]
impl Tool for ReverseTool {
    fn name(&self) -> &str {
        "Reverse"
    }

    fn description(&self) -> &str {
        "Reverses the characters of its input"
    }

    async fn call(&self, input: &str) -> Result<String> {
        Ok(input.chars().rev().collect())
    }
}

#[tokio::test]
async fn agent_runs_through_the_pipeline_and_memory_keeps_the_turn() {
    init_tracing();
    let model = StubModel::new(vec![
        "ACT reverse stressed".to_string(),
        "FINAL desserts".to_string(),
    ]);
    let agent = Arc::new(LineAgent {
        model,
        tools: vec![Arc::new(ReverseTool)],
    });
    let memory: Arc<ConversationBuffer> = Arc::new(ConversationBuffer::new());
    let executor = Executor::new(agent)
        .with_memory(memory.clone())
        .with_callbacks(Arc::new(TracingHandler));

    let answer = chain::run(&executor, "reverse the word stressed", &ChainCallOptions::new())
        .await
        .unwrap();

    assert_eq!(answer, "desserts");

    let loaded = memory.load_variables(&ChainValues::new()).await.unwrap();
    assert_eq!(
        loaded["history"],
        json!("Human: reverse the word stressed\nAI: desserts")
    );
}

#[tokio::test]
async fn intermediate_steps_are_exposed_when_asked_for() {
    init_tracing();
    let model = StubModel::new(vec![
        "ACT reverse abc".to_string(),
        "FINAL cba".to_string(),
    ]);
    let agent = Arc::new(LineAgent {
        model,
        tools: vec![Arc::new(ReverseTool)],
    });
    let executor = Executor::new(agent).with_return_intermediate_steps();

    let mut inputs = ChainValues::new();
    inputs.insert("input".into(), json!("reverse abc"));
    let outputs = chain::call(&executor, &inputs, &ChainCallOptions::new())
        .await
        .unwrap();

    assert_eq!(outputs["output"], json!("cba"));
    let steps = outputs[INTERMEDIATE_STEPS_KEY].as_array().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0]["action"]["tool"], json!("reverse"));
    assert_eq!(steps[0]["observation"], json!("cba"));
}

#[tokio::test]
async fn unparsable_model_output_aborts_without_a_parser_handler() {
    init_tracing();
    let model = StubModel::new(vec!["complete nonsense".to_string()]);
    let agent = Arc::new(LineAgent {
        model,
        tools: vec![Arc::new(ReverseTool)],
    });
    let executor = Executor::new(agent);

    let err = chain::run(&executor, "anything", &ChainCallOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ChainError::UnableToParseOutput(_)));
}

//! The bounded plan/act/observe loop. An [`Executor`] wraps an [`Agent`]
//! and its tools and is itself a [`Chain`], so it is invoked through the
//! same pipeline as everything else.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::Agent;
use crate::callbacks::Handler;
use crate::chain::Chain;
use crate::error::{ChainError, Result};
use crate::memory::{Memory, NoMemory};
use crate::options::ChainCallOptions;
use crate::schema::{AgentDecision, AgentFinish, AgentStep, ChainValues};
use crate::tool::{name_to_tool, Tool};

/// Iteration budget an executor starts with unless overridden.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Output key the step history is folded under when the caller asked for
/// intermediate steps.
pub const INTERMEDIATE_STEPS_KEY: &str = "intermediateSteps";

/// Recovery policy for planning output the agent could not parse. Without
/// one, an unparsable plan aborts the call; with one, the error text (as
/// formatted) becomes an observation the model sees next iteration.
pub struct ParserErrorHandler {
    formatter: Option<Box<dyn Fn(&str) -> String + Send + Sync>>,
}

impl Default for ParserErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserErrorHandler {
    pub fn new() -> Self {
        Self { formatter: None }
    }

    pub fn with_formatter(formatter: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            formatter: Some(Box::new(formatter)),
        }
    }

    fn format(&self, text: &str) -> String {
        match &self.formatter {
            Some(formatter) => formatter(text),
            None => text.to_string(),
        }
    }
}

/// Drives an agent until it finishes, errors out, or exhausts its
/// iteration budget. One invocation owns its step history exclusively;
/// independent invocations of the same executor may run concurrently.
pub struct Executor {
    agent: Arc<dyn Agent>,
    memory: Arc<dyn Memory>,
    callbacks: Option<Arc<dyn Handler>>,
    max_iterations: usize,
    return_intermediate_steps: bool,
    error_handler: Option<ParserErrorHandler>,
}

impl Executor {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            memory: Arc::new(NoMemory),
            callbacks: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            return_intermediate_steps: false,
            error_handler: None,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_callbacks(mut self, handler: Arc<dyn Handler>) -> Self {
        self.callbacks = Some(handler);
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations.max(1);
        self
    }

    pub fn with_return_intermediate_steps(mut self) -> Self {
        self.return_intermediate_steps = true;
        self
    }

    pub fn with_parser_error_handler(mut self, handler: ParserErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// One planning cycle. Returns the final output map once the agent
    /// declares a finish, `None` while the loop should keep going.
    async fn iterate(
        &self,
        steps: &mut Vec<AgentStep>,
        tools: &Option<HashMap<String, Arc<dyn Tool>>>,
        inputs: &HashMap<String, String>,
    ) -> Result<Option<ChainValues>> {
        let decision = match self.agent.plan(steps, inputs).await {
            Ok(decision) => decision,
            Err(ChainError::UnableToParseOutput(detail)) => {
                let Some(handler) = &self.error_handler else {
                    return Err(ChainError::UnableToParseOutput(detail));
                };
                let text = ChainError::UnableToParseOutput(detail).to_string();
                steps.push(AgentStep::observation_only(handler.format(&text)));
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match decision {
            AgentDecision::Finish(finish) => {
                if let Some(handler) = &self.callbacks {
                    handler.handle_agent_finish(&finish).await;
                }
                Ok(Some(self.finish_return(finish, steps)))
            }
            AgentDecision::Act(actions) if actions.is_empty() => Err(ChainError::AgentNoDecision),
            AgentDecision::Act(actions) => {
                for action in actions {
                    self.perform(steps, tools, action).await?;
                }
                Ok(None)
            }
        }
    }

    async fn perform(
        &self,
        steps: &mut Vec<AgentStep>,
        tools: &Option<HashMap<String, Arc<dyn Tool>>>,
        action: crate::schema::AgentAction,
    ) -> Result<()> {
        if let Some(handler) = &self.callbacks {
            handler.handle_agent_action(&action).await;
        }

        let tool = tools
            .as_ref()
            .and_then(|table| table.get(&action.tool.to_uppercase()))
            .cloned();

        // A hallucinated tool name is a reasoning mistake the model can
        // correct next iteration, so it becomes an observation instead of
        // aborting the run. A found-but-failing tool is an environment
        // fault and stays fatal.
        let Some(tool) = tool else {
            let observation = format!("{} is not a valid tool, try another one", action.tool);
            steps.push(AgentStep::new(action, observation));
            return Ok(());
        };

        match tool.call(&action.tool_input).await {
            Ok(observation) => {
                steps.push(AgentStep::new(action, observation));
                Ok(())
            }
            Err(err) => Err(ChainError::ToolExecution {
                tool: action.tool,
                steps: steps.clone(),
                source: Box::new(err),
            }),
        }
    }

    fn finish_return(&self, mut finish: AgentFinish, steps: &[AgentStep]) -> ChainValues {
        if self.return_intermediate_steps {
            let steps_value = serde_json::to_value(steps).unwrap_or(Value::Null);
            finish
                .return_values
                .insert(INTERMEDIATE_STEPS_KEY.to_string(), steps_value);
        }
        finish.return_values
    }
}

#[async_trait]
impl Chain for Executor {
    async fn call(
        &self,
        inputs: &ChainValues,
        _options: &ChainCallOptions,
    ) -> Result<ChainValues> {
        let inputs = inputs_to_string(inputs)?;
        let tools = name_to_tool(&self.agent.tools());

        let mut steps: Vec<AgentStep> = Vec::new();
        for _ in 0..self.max_iterations {
            if let Some(outputs) = self.iterate(&mut steps, &tools, &inputs).await? {
                return Ok(outputs);
            }
        }

        // Budget exhausted without a finish. Observers get a synthetic
        // finish carrying the marker; the caller gets a distinguished
        // error alongside whatever return map exists.
        if let Some(handler) = &self.callbacks {
            let mut marker = ChainValues::new();
            marker.insert(
                "output".to_string(),
                Value::String(ChainError::NotFinished {
                    outputs: ChainValues::new(),
                }
                .to_string()),
            );
            handler
                .handle_agent_finish(&AgentFinish::new(marker, ""))
                .await;
        }

        Err(ChainError::NotFinished {
            outputs: self.finish_return(AgentFinish::default(), &steps),
        })
    }

    fn input_keys(&self) -> Vec<String> {
        self.agent.input_keys()
    }

    fn output_keys(&self) -> Vec<String> {
        self.agent.output_keys()
    }

    fn memory(&self) -> Arc<dyn Memory> {
        Arc::clone(&self.memory)
    }

    fn callback_handler(&self) -> Option<Arc<dyn Handler>> {
        self.callbacks.clone()
    }
}

fn inputs_to_string(input_values: &ChainValues) -> Result<HashMap<String, String>> {
    let mut inputs = HashMap::with_capacity(input_values.len());
    for (key, value) in input_values {
        let Value::String(text) = value else {
            return Err(ChainError::ExecutorInputNotString(key.clone()));
        };
        inputs.insert(key.clone(), text.clone());
    }
    Ok(inputs)
}

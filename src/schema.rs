//! Shared value and step types flowing between chains, agents and tools.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The input and output currency of every chain call.
pub type ChainValues = HashMap<String, Value>;

/// A single decision by an agent to invoke a tool. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
    pub log: String,
}

impl AgentAction {
    pub fn new(
        tool: impl Into<String>,
        tool_input: impl Into<String>,
        log: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            tool_input: tool_input.into(),
            log: log.into(),
        }
    }
}

/// One executed action and what came back from it. A step without an
/// action records a recovered planning failure as a bare observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub action: Option<AgentAction>,
    pub observation: String,
}

impl AgentStep {
    pub fn new(action: AgentAction, observation: impl Into<String>) -> Self {
        Self {
            action: Some(action),
            observation: observation.into(),
        }
    }

    pub fn observation_only(observation: impl Into<String>) -> Self {
        Self {
            action: None,
            observation: observation.into(),
        }
    }
}

/// Terminal output of planning. Once produced the loop is over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentFinish {
    pub return_values: ChainValues,
    pub log: String,
}

impl AgentFinish {
    pub fn new(return_values: ChainValues, log: impl Into<String>) -> Self {
        Self {
            return_values,
            log: log.into(),
        }
    }
}

/// The outcome of one planning cycle: either further actions or a finish.
/// `Act` with an empty vector violates the planning contract and is
/// rejected by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    Act(Vec<AgentAction>),
    Finish(AgentFinish),
}

use thiserror::Error;

use crate::schema::{AgentStep, ChainValues};

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid input values: missing key `{0}`")]
    MissingInputKey(String),

    /// A declared output key was absent from the chain body's result. The
    /// partial map the body did compute rides along for callers that want
    /// whatever came back.
    #[error("invalid output values: missing key `{key}`")]
    MissingOutputKey { key: String, outputs: ChainValues },

    #[error("input to executor was not a string: `{0}`")]
    ExecutorInputNotString(String),

    #[error("run not supported in chain with more than one expected input")]
    MultipleInputsInRun,

    #[error("run not supported in chain with more than one expected output")]
    MultipleOutputsInRun,

    #[error("run not supported in chain that returns a value that is not a string")]
    WrongOutputTypeInRun,

    #[error("unable to parse agent output: {0}")]
    UnableToParseOutput(String),

    #[error("no actions or finish was returned by the agent")]
    AgentNoDecision,

    /// The executor exhausted its iteration budget. The return map
    /// accumulated so far rides along so callers can still inspect it.
    #[error("agent not finished before max iterations")]
    NotFinished { outputs: ChainValues },

    /// A registered tool was found and invoked, but its call failed. Steps
    /// taken strictly before the failing action are preserved.
    #[error("tool `{tool}` failed: {source}")]
    ToolExecution {
        tool: String,
        steps: Vec<AgentStep>,
        #[source]
        source: Box<ChainError>,
    },

    #[error("tool error: {0}")]
    Tool(String),

    /// The chain itself succeeded but persisting the turn to memory did
    /// not. The valid outputs are carried so callers may still use them.
    #[error("saving chain outputs to memory failed: {source}")]
    MemorySave {
        outputs: ChainValues,
        #[source]
        source: Box<ChainError>,
    },

    #[error("memory error: {0}")]
    Memory(String),

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("empty response from model")]
    EmptyResponseFromModel,

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

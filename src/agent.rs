use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{AgentDecision, AgentStep};
use crate::tool::Tool;

/// A planning strategy: given the steps taken so far and the caller's
/// string inputs, decide on the next tool actions or declare a final
/// answer. Concrete strategies (ReAct-style prompt agents, function-calling
/// agents) are separate types behind this trait.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn plan(
        &self,
        steps: &[AgentStep],
        inputs: &HashMap<String, String>,
    ) -> Result<AgentDecision>;

    fn input_keys(&self) -> Vec<String>;

    fn output_keys(&self) -> Vec<String>;

    /// The tools this agent may ask for. Borrowed by the executor for the
    /// duration of one call.
    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}

//! Lifecycle observers. A handler receives chain and agent events for
//! logging or tracing; every method defaults to a no-op so implementers
//! only override what they care about.

use async_trait::async_trait;

use crate::error::ChainError;
use crate::schema::{AgentAction, AgentFinish, ChainValues};

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle_chain_start(&self, _inputs: &ChainValues) {}

    async fn handle_chain_end(&self, _outputs: &ChainValues) {}

    async fn handle_chain_error(&self, _err: &ChainError) {}

    async fn handle_agent_action(&self, _action: &AgentAction) {}

    async fn handle_agent_finish(&self, _finish: &AgentFinish) {}
}

/// Logs every lifecycle event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHandler;

#[async_trait]
impl Handler for TracingHandler {
    async fn handle_chain_start(&self, inputs: &ChainValues) {
        tracing::debug!(keys = ?inputs.keys().collect::<Vec<_>>(), "chain start");
    }

    async fn handle_chain_end(&self, outputs: &ChainValues) {
        tracing::debug!(keys = ?outputs.keys().collect::<Vec<_>>(), "chain end");
    }

    async fn handle_chain_error(&self, err: &ChainError) {
        tracing::error!(error = %err, "chain error");
    }

    async fn handle_agent_action(&self, action: &AgentAction) {
        tracing::debug!(tool = %action.tool, input = %action.tool_input, "agent action");
    }

    async fn handle_agent_finish(&self, finish: &AgentFinish) {
        tracing::debug!(keys = ?finish.return_values.keys().collect::<Vec<_>>(), "agent finish");
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// An external capability an agent can invoke by name with a single string
/// argument. Names are matched case-insensitively at dispatch time.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, input: &str) -> Result<String>;
}

/// Build the dispatch table for one executor call, keyed by upper-cased
/// name. An empty tool set yields `None` so "no tools" and "no match" look
/// the same downstream. On a name collision the later tool wins; enforce
/// uniqueness at registration time if that matters to you.
pub fn name_to_tool(tools: &[Arc<dyn Tool>]) -> Option<HashMap<String, Arc<dyn Tool>>> {
    if tools.is_empty() {
        return None;
    }

    let mut by_name = HashMap::with_capacity(tools.len());
    for tool in tools {
        by_name.insert(tool.name().to_uppercase(), Arc::clone(tool));
    }
    Some(by_name)
}

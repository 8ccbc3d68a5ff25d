//! The uniform invocation pipeline every chain is driven through: memory
//! hydration, input/output key validation, lifecycle callbacks and memory
//! persistence all happen here, not in individual chains.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::callbacks::Handler;
use crate::error::{ChainError, Result};
use crate::memory::{Memory, NoMemory};
use crate::options::ChainCallOptions;
use crate::schema::ChainValues;

/// A unit of work invocable through [`call`]. `call` here is the chain's
/// own logic; use the free functions [`call`], [`run`] or [`predict`] to
/// invoke it, so memory and validation are handled.
#[async_trait]
pub trait Chain: Send + Sync {
    async fn call(&self, inputs: &ChainValues, options: &ChainCallOptions)
        -> Result<ChainValues>;

    fn input_keys(&self) -> Vec<String>;

    fn output_keys(&self) -> Vec<String>;

    fn memory(&self) -> Arc<dyn Memory> {
        Arc::new(NoMemory)
    }

    fn callback_handler(&self) -> Option<Arc<dyn Handler>> {
        None
    }
}

/// Invoke a chain with the full pipeline. The caller's input map is never
/// mutated; memory-loaded variables fill gaps but never override keys the
/// caller supplied explicitly.
pub async fn call<C: Chain + ?Sized>(
    chain: &C,
    input_values: &ChainValues,
    options: &ChainCallOptions,
) -> Result<ChainValues> {
    let memory = chain.memory();

    let mut full_values = input_values.clone();
    let loaded = memory.load_variables(input_values).await?;
    for (key, value) in loaded {
        full_values.entry(key).or_insert(value);
    }

    // An explicit handler on the options takes precedence over the chain's.
    let handler = options
        .callback_handler
        .clone()
        .or_else(|| chain.callback_handler());

    if let Some(handler) = &handler {
        handler.handle_chain_start(input_values).await;
    }

    let output_values = match call_chain(chain, &full_values, options).await {
        Ok(outputs) => outputs,
        Err(err) => {
            if let Some(handler) = &handler {
                handler.handle_chain_error(&err).await;
            }
            return Err(err);
        }
    };

    if let Some(handler) = &handler {
        handler.handle_chain_end(&output_values).await;
    }

    if let Err(err) = memory.save_context(input_values, &output_values).await {
        return Err(ChainError::MemorySave {
            outputs: output_values,
            source: Box::new(err),
        });
    }

    Ok(output_values)
}

async fn call_chain<C: Chain + ?Sized>(
    chain: &C,
    full_values: &ChainValues,
    options: &ChainCallOptions,
) -> Result<ChainValues> {
    validate_inputs(chain, full_values)?;
    let outputs = chain.call(full_values, options).await?;
    if let Some(key) = missing_output_key(chain, &outputs) {
        return Err(ChainError::MissingOutputKey { key, outputs });
    }
    Ok(outputs)
}

fn validate_inputs<C: Chain + ?Sized>(chain: &C, values: &ChainValues) -> Result<()> {
    for key in chain.input_keys() {
        if !values.contains_key(&key) {
            return Err(ChainError::MissingInputKey(key));
        }
    }
    Ok(())
}

fn missing_output_key<C: Chain + ?Sized>(chain: &C, values: &ChainValues) -> Option<String> {
    chain
        .output_keys()
        .into_iter()
        .find(|key| !values.contains_key(key))
}

/// Invoke a chain that takes one input and produces one string output.
/// Input keys already satisfiable from memory do not count; exactly one
/// must remain for the caller to fill.
pub async fn run<C: Chain + ?Sized>(
    chain: &C,
    input: impl Into<Value>,
    options: &ChainCallOptions,
) -> Result<String> {
    let memory_keys = chain.memory().memory_variables();
    let needed: Vec<String> = chain
        .input_keys()
        .into_iter()
        .filter(|key| !memory_keys.contains(key))
        .collect();
    if needed.len() != 1 {
        return Err(ChainError::MultipleInputsInRun);
    }

    let output_keys = chain.output_keys();
    if output_keys.len() != 1 {
        return Err(ChainError::MultipleOutputsInRun);
    }

    let mut input_values = ChainValues::new();
    input_values.insert(needed[0].clone(), input.into());

    let output_values = call(chain, &input_values, options).await?;
    single_string_output(&output_values, &output_keys[0])
}

/// Invoke a chain with a full input map but extract its single string
/// output directly.
pub async fn predict<C: Chain + ?Sized>(
    chain: &C,
    input_values: &ChainValues,
    options: &ChainCallOptions,
) -> Result<String> {
    let output_keys = chain.output_keys();
    if output_keys.len() != 1 {
        return Err(ChainError::MultipleOutputsInRun);
    }

    let output_values = call(chain, input_values, options).await?;
    single_string_output(&output_values, &output_keys[0])
}

fn single_string_output(values: &ChainValues, key: &str) -> Result<String> {
    match values.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(ChainError::WrongOutputTypeInRun),
    }
}

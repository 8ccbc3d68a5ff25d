//! Per-invocation configuration for chain calls. An immutable snapshot:
//! setters consume and return the options, apply left-to-right, and the
//! last write wins. `None` means "leave the backend default alone".

use std::sync::Arc;

use crate::callbacks::Handler;
use crate::llm::{CallOptions, StreamFunc};

#[derive(Clone, Default)]
pub struct ChainCallOptions {
    pub model: Option<String>,
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
    pub callback_handler: Option<Arc<dyn Handler>>,
}

impl ChainCallOptions {
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

    pub fn with_top_k(mut self, top_k: i32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_min_length(mut self, min_length: u32) -> Self {
        self.min_length = Some(min_length);
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_repetition_penalty(mut self, penalty: f64) -> Self {
        self.repetition_penalty = Some(penalty);
        self
    }

    pub fn with_callback_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.callback_handler = Some(handler);
        self
    }

    /// Translate the explicitly-set fields into model call options. Unset
    /// fields stay unset so backends keep their own defaults.
    pub fn to_call_options(&self) -> CallOptions {
        CallOptions {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop_words: self.stop_words.clone(),
            streaming_func: self.streaming_func.clone(),
            top_k: self.top_k,
            top_p: self.top_p,
            seed: self.seed,
            min_length: self.min_length,
            max_length: self.max_length,
            repetition_penalty: self.repetition_penalty,
            ..CallOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_for_overlapping_fields() {
        let options = ChainCallOptions::new()
            .with_model("small")
            .with_temperature(0.2)
            .with_model("large");

        assert_eq!(options.model.as_deref(), Some("large"));
        assert_eq!(options.temperature, Some(0.2));
    }

    #[test]
    fn only_set_fields_reach_the_model_options() {
        let options = ChainCallOptions::new()
            .with_stop_words(vec!["Observation:".into()])
            .with_top_k(40);

        let call_options = options.to_call_options();

        assert_eq!(call_options.stop_words, Some(vec!["Observation:".to_string()]));
        assert_eq!(call_options.top_k, Some(40));
        assert_eq!(call_options.model, None);
        assert_eq!(call_options.temperature, None);
        assert!(call_options.tools.is_empty());
    }
}

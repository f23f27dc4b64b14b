use anyhow::Result;
use std::collections::HashMap;
use tiktoken_rs::{get_bpe_from_model, CoreBPE};
use tracing::debug;

/// Counts how many tokens a piece of text takes up for a given model
pub trait TokenCount: Send + Sync {
    fn count_tokens(&self, text: &str, model: &str) -> usize;
}

const DEFAULT_MODELS: [&str; 2] = ["gpt-4o", "gpt-4"];

/// Token counter backed by the BPE tables the OpenAI models use
pub struct TokenCounter {
    encodings: HashMap<String, CoreBPE>,
    fallback: CoreBPE,
}

impl TokenCounter {
    pub fn new() -> Result<Self> {
        let mut counter = TokenCounter {
            encodings: HashMap::new(),
            fallback: tiktoken_rs::o200k_base()?,
        };
        for model in DEFAULT_MODELS {
            counter.add_model(model)?;
        }
        Ok(counter)
    }

    /// Load the encoding for `model`. Fails for models tiktoken does not know.
    pub fn add_model(&mut self, model: &str) -> Result<()> {
        if !self.encodings.contains_key(model) {
            let bpe = get_bpe_from_model(model)?;
            self.encodings.insert(model.to_string(), bpe);
        }
        Ok(())
    }

    fn encoding_for(&self, model: &str) -> &CoreBPE {
        self.encodings.get(model).unwrap_or_else(|| {
            debug!(model, "no encoding loaded for model, using o200k_base");
            &self.fallback
        })
    }
}

impl TokenCount for TokenCounter {
    fn count_tokens(&self, text: &str, model: &str) -> usize {
        self.encoding_for(model)
            .encode_with_special_tokens(text)
            .len()
    }
}

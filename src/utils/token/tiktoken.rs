use anyhow::Result;
pub use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};
use log::warn;

use crate::utils::token::CountToken;

/// Counter using the Tiktoken tokenizer.
#[derive(Clone)]
#[readonly::make]
pub struct Tiktoken {
    /// The model name the tokenizer was requested for. read-only.
    #[readonly]
    pub model: String,
    /// The tokenizer. read-only.
    #[readonly]
    pub bpe: CoreBPE,
}

impl Tiktoken {
    /// Create a new Tiktoken counter for a model.
    ///
    /// Models unknown to tiktoken fall back to the `cl100k_base` encoding.
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let bpe = match get_bpe_from_model(model.as_str()) {
            Ok(bpe) => bpe,
            Err(_) => {
                warn!("No tokenizer found for {}, using cl100k_base", model);
                cl100k_base()?
            }
        };
        Ok(Tiktoken {
            model,
            bpe,
        })
    }
}

impl CountToken for Tiktoken {
    fn count_token(&self, string: &str) -> usize {
        self.bpe.encode_with_special_tokens(string).len()
    }
}

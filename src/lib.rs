//! # promptchain
//!
//! Retrying prompt chains over any text generator, in Rust
//!
//! **Note: `promptchain` is a WIP, so the APIs are subject to change.**
//!
//! ## Usage
//! `promptchain` is not released on crates.io. To use it, add a path or git dependency in `Cargo.toml`
//! ```toml
//! promptchain = { path = "../promptchain" }
//! ```
//!
//! Default features are `openai`, which brings [an OpenAI generator](crate::utils::llm::openai), and
//! `terminal_printing`, which brings [markdown reports](crate::utils::printing) of chain runs.
//!
//! ## Concepts and Design
//! Like the prompts it sends, the APIs are meant to be explicit and flat: a chain is a list of templates, a
//! generator is a function from prompt to reply, and a run returns everything that happened as plain data.
//!
//! ### Prompt Template and Placeholder
//!
//! A template looks like
//!
//! ```text
//! Summarize the following for {{audience}}: {{input}}
//! ```
//!
//! `{{audience}}` and `{{input}}` are placeholders. The name can be any string without line breaks. A
//! [`PromptTemplate`](crate::prompt::PromptTemplate) is completed through a
//! [`PartialPrompt`](crate::prompt::PartialPrompt) or in one go by
//! [`PromptTemplate::render`](crate::prompt::PromptTemplate::render).
//!
//! ### Generator
//!
//! Anything that implements [`Generate`](crate::utils::llm::Generate): takes a complete prompt, returns a reply or an
//! error. Plain closures `Fn(&str) -> anyhow::Result<String>` are generators, which makes chains easy to test offline.
//!
//! ### Chain
//!
//! A [`ChainExecutor`](crate::chain::ChainExecutor) runs
//! * sequential chains of [`Step`](crate::chain::Step)s, each step's output feeding the next, with
//!   [validators](crate::validators) and retries with exponential backoff, and
//! * parallel chains of named templates over one document, on a bounded worker pool, with an optional synthesis.
//!
//! Outcomes carry per-step results, attempt history and timing metrics. Nothing is kept in the executor between runs.
//!
//! ### Post-processing
//!
//! Replies can be mined for [JSON](crate::utils::postprocess::json) or [voted on](crate::utils::postprocess::voting).
//! [Exemplars](crate::exemplars) put all of the above together.
//!
//! ## License
//!
//! `promptchain` is free under Apache license.
//!
//! ## Attribution
//! * `tiktoken-rs`: In [crate::utils::token::tiktoken], we wrap the `tiktoken-rs` crate for token counting.


pub mod prompt;
pub mod chain;
pub mod decomposition;
pub mod validators;
pub mod utils;
pub mod exemplars;

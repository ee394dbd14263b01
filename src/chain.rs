//! # Chain
//!
//! A chain runs templated steps against a text generator.
//!
//! * A **sequential** chain feeds each step's output into the next step's `{{input}}`. Every output is checked by the
//!   step's validators, and a failed check or a generator error is retried with exponential backoff. A step that
//!   runs out of attempts ends the run; the steps completed before it are kept in the outcome.
//! * A **parallel** chain renders named templates against one shared `{{document}}` on a bounded pool of worker
//!   threads. Tasks fail independently. Successful outputs can be combined by a synthesis template through
//!   `{{analysis_results}}` and `{{original_document}}`.
//! * A **decomposed** run executes a [TaskDecomposer](crate::decomposition::TaskDecomposer) wave by wave on the
//!   same pool. Each task sees the results of the tasks it depends on.
//!
//! Runs never return an error; every failure is described in the returned outcome.
//!
//! ```
//! use anyhow::Result;
//! use promptchain::chain::{ChainConfig, ChainExecutor, Step};
//!
//! let echo = |prompt: &str| -> Result<String> { Ok(format!("OUT:{}", prompt)) };
//! let executor = ChainExecutor::new(&echo, ChainConfig::default());
//! let steps = vec![Step::new("{{input}}"), Step::new("{{input}}")];
//! let outcome = executor.run_sequential(&steps, "X");
//! assert!(outcome.success);
//! assert_eq!(outcome.final_output.as_deref(), Some("OUT:OUT:X"));
//! ```

mod config;
mod decomposed;
pub mod errors;
mod metrics;
mod outcome;
mod parallel;
mod sequential;
mod step;

pub use config::ChainConfig;
pub use decomposed::{DecompositionOutcome, DEPENDENCY_RESULTS_PLACEHOLDER, OBJECTIVE_PLACEHOLDER, SUBTASK_TEMPLATE};
pub use metrics::{MetricsSummary, PerformanceMetrics, StepTiming};
pub use outcome::{AttemptRecord, ChainOutcome, ParallelMetrics, ParallelOutcome, StepResult, Synthesis, TaskResult, ValidationResult};
pub use parallel::{ANALYSIS_RESULTS_PLACEHOLDER, DOCUMENT_PLACEHOLDER, ORIGINAL_DOCUMENT_PLACEHOLDER};
pub use step::{Step, Validator, INPUT_PLACEHOLDER};

use crate::utils::llm::Generate;

/// Runs chains against a borrowed text generator.
///
/// Each run builds its own metrics and history and returns them in its outcome, so one executor can serve any
/// number of runs, including concurrent ones.
pub struct ChainExecutor<'g, G: ?Sized> {
    generator: &'g G,
    config: ChainConfig,
}

impl<'g, G: Generate + ?Sized> ChainExecutor<'g, G> {
    pub fn new(generator: &'g G, config: ChainConfig) -> Self {
        Self {
            generator,
            config,
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn generator(&self) -> &'g G {
        self.generator
    }
}

use std::thread::sleep;
use std::time::Instant;
use chrono::Local;
use log::{info, warn};

use crate::chain::errors::{FailureCause, StepFailure};
use crate::chain::metrics::PerformanceMetrics;
use crate::chain::outcome::{AttemptRecord, ChainOutcome, StepResult, ValidationResult};
use crate::chain::step::Step;
use crate::chain::ChainExecutor;
use crate::utils::llm::Generate;

/// State owned by a single sequential run.
#[derive(Default)]
struct RunContext {
    metrics: PerformanceMetrics,
    history: Vec<AttemptRecord>,
    results: Vec<StepResult>,
}

impl RunContext {
    fn fail(mut self, failure: StepFailure) -> ChainOutcome {
        self.metrics.end_execution();
        warn!("{}", failure);
        ChainOutcome::failed(self.results, failure, self.metrics.summary(), self.history)
    }
}

impl<'g, G: Generate + ?Sized> ChainExecutor<'g, G> {
    /// Run `steps` in order, starting from `initial_input`.
    ///
    /// Stops at the first step that fails all of its `max_retries + 1` attempts.
    pub fn run_sequential(&self, steps: &[Step], initial_input: &str) -> ChainOutcome {
        let mut context = RunContext::default();
        context.metrics.start_execution();
        let mut current_input = initial_input.to_string();
        info!("Starting sequential chain with {} steps", steps.len());

        for (index, step) in steps.iter().enumerate() {
            let step_number = index + 1;
            let step_start = Instant::now();

            let mut retry_count = 0;
            let (output, validations) = loop {
                context.history.push(AttemptRecord {
                    step: step_number,
                    attempt: retry_count,
                    timestamp: Local::now(),
                    input: current_input.clone(),
                });
                info!("Executing step {} (attempt {})", step_number, retry_count + 1);

                match self.attempt(step, &current_input) {
                    Ok(success) => break success,
                    Err(cause) => {
                        retry_count += 1;
                        warn!("Step {} failed (attempt {}): {}", step_number, retry_count, cause);
                        if retry_count > self.config.max_retries {
                            return context.fail(StepFailure { step: step_number, attempts: retry_count, cause });
                        }
                        sleep(self.config.backoff(retry_count));
                    }
                }
            };

            let step_duration = step_start.elapsed();
            context.metrics.record_step_timing(step_number, step_duration);
            info!("Step {} completed successfully in {:.3}s", step_number, step_duration.as_secs_f64());
            let input = std::mem::replace(&mut current_input, output.clone());
            context.results.push(StepResult::new(step_number, input, output, validations, step_duration, retry_count));
        }

        context.metrics.end_execution();
        let metrics = context.metrics.summary();
        info!("Chain completed successfully in {:.3}s", metrics.total_execution_time.as_secs_f64());
        ChainOutcome::succeeded(context.results, current_input, metrics, context.history)
    }

    /// Render, generate once and run every validator on the raw output.
    fn attempt(&self, step: &Step, input: &str) -> Result<(String, Vec<ValidationResult>), FailureCause> {
        let prompt = step.render(input)
            .map_err(|e| FailureCause::Render(e.to_string()))?;
        let output = self.generator.generate(&prompt)
            .map_err(|e| FailureCause::Generation(e.to_string()))?;
        let validations: Vec<ValidationResult> = step.validators()
            .iter()
            .map(|validator| ValidationResult {
                validator: validator.name().to_string(),
                passed: validator.check(&output),
            })
            .collect();
        let failed_validators: Vec<String> = validations.iter()
            .filter(|v| !v.passed)
            .map(|v| v.validator.clone())
            .collect();
        if failed_validators.is_empty() {
            Ok((output, validations))
        } else {
            Err(FailureCause::Validation { failed_validators })
        }
    }
}

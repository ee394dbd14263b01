//! Plain data returned by chain runs. Nothing here is mutated after a run hands it back.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::chain::errors::StepFailure;
use crate::chain::metrics::MetricsSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub validator: String,
    pub passed: bool,
}

/// A successfully completed sequential step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[readonly::make]
pub struct StepResult {
    /// 1-indexed position in the chain
    pub step: usize,
    /// Text the step's template was rendered with
    pub input: String,
    pub output: String,
    pub validations: Vec<ValidationResult>,
    /// Time from the first attempt to success, including backoff waits
    pub execution_time: Duration,
    pub retry_count: u32,
    /// Output length in characters
    pub output_length: usize,
}

impl StepResult {
    pub(crate) fn new(step: usize, input: String, output: String, validations: Vec<ValidationResult>,
                      execution_time: Duration, retry_count: u32) -> Self {
        let output_length = output.chars().count();
        Self {
            step,
            input,
            output,
            validations,
            execution_time,
            retry_count,
            output_length,
        }
    }
}

/// One attempt at one step, in the order attempts were made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub step: usize,
    /// 0 for the first attempt
    pub attempt: u32,
    pub timestamp: DateTime<Local>,
    pub input: String,
}

/// Result of a sequential run.
#[derive(Debug, Clone, Serialize)]
#[readonly::make]
pub struct ChainOutcome {
    pub success: bool,
    /// Every completed step, or the steps completed before the failing one
    pub results: Vec<StepResult>,
    pub final_output: Option<String>,
    pub metrics: MetricsSummary,
    pub history: Vec<AttemptRecord>,
    pub error: Option<StepFailure>,
}

impl ChainOutcome {
    pub(crate) fn succeeded(results: Vec<StepResult>, final_output: String, metrics: MetricsSummary, history: Vec<AttemptRecord>) -> Self {
        Self {
            success: true,
            results,
            final_output: Some(final_output),
            metrics,
            history,
            error: None,
        }
    }

    pub(crate) fn failed(results: Vec<StepResult>, failure: StepFailure, metrics: MetricsSummary, history: Vec<AttemptRecord>) -> Self {
        Self {
            success: false,
            results,
            final_output: None,
            metrics,
            history,
            error: Some(failure),
        }
    }

    /// Output of a completed step, 1-indexed.
    pub fn output_of(&self, step: usize) -> Option<&str> {
        self.results.iter().find(|r| r.step == step).map(|r| r.output.as_str())
    }
}

/// Outcome of one parallel task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[readonly::make]
pub struct TaskResult {
    pub name: String,
    /// Generated text, or `Error: {message}` when the task failed
    pub result: String,
    pub success: bool,
    pub execution_time: Duration,
    pub output_length: usize,
    pub error: Option<String>,
}

impl TaskResult {
    pub(crate) fn succeeded(name: String, output: String, execution_time: Duration) -> Self {
        let output_length = output.chars().count();
        Self {
            name,
            result: output,
            success: true,
            execution_time,
            output_length,
            error: None,
        }
    }

    pub(crate) fn failed(name: String, error: String, execution_time: Duration) -> Self {
        let result = format!("Error: {}", error);
        Self {
            output_length: result.chars().count(),
            name,
            result,
            success: false,
            execution_time,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Synthesis {
    /// No synthesis template was supplied
    NotRequested,
    /// Every task failed, so there was nothing to synthesize and no call was made
    NoInputAvailable,
    Completed(String),
    Failed(String),
}

impl Synthesis {
    pub fn text(&self) -> Option<&str> {
        match self {
            Synthesis::Completed(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_attempted(&self) -> bool {
        matches!(self, Synthesis::Completed(_) | Synthesis::Failed(_))
    }
}

impl fmt::Display for Synthesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Synthesis::NotRequested => write!(f, "Synthesis not requested"),
            Synthesis::NoInputAvailable => write!(f, "Synthesis skipped: no input available"),
            Synthesis::Completed(text) => write!(f, "{}", text),
            Synthesis::Failed(message) => write!(f, "Synthesis failed: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParallelMetrics {
    pub total_execution_time: Duration,
    pub max_workers_used: usize,
    /// `None` when no task ran
    pub average_execution_time: Option<Duration>,
    pub fastest_execution: Option<Duration>,
    pub slowest_execution: Option<Duration>,
}

impl ParallelMetrics {
    pub(crate) fn from_tasks<'a>(tasks: impl Iterator<Item=&'a TaskResult> + Clone, total_execution_time: Duration, max_workers_used: usize) -> Self {
        let count = tasks.clone().count();
        let average_execution_time = if count == 0 {
            None
        } else {
            let total: Duration = tasks.clone().map(|t| t.execution_time).sum();
            Some(total / count as u32)
        };
        Self {
            total_execution_time,
            max_workers_used,
            average_execution_time,
            fastest_execution: tasks.clone().map(|t| t.execution_time).min(),
            slowest_execution: tasks.map(|t| t.execution_time).max(),
        }
    }
}

/// Result of a parallel run. Keys of `tasks` are exactly the submitted task names.
#[derive(Debug, Clone, Serialize)]
#[readonly::make]
pub struct ParallelOutcome {
    pub tasks: BTreeMap<String, TaskResult>,
    pub successful_count: usize,
    pub failed_count: usize,
    pub synthesis: Synthesis,
    pub metrics: ParallelMetrics,
}

impl ParallelOutcome {
    pub(crate) fn new(tasks: BTreeMap<String, TaskResult>, synthesis: Synthesis, metrics: ParallelMetrics) -> Self {
        let successful_count = tasks.values().filter(|t| t.success).count();
        Self {
            failed_count: tasks.len() - successful_count,
            successful_count,
            tasks,
            synthesis,
            metrics,
        }
    }

    /// Result text of a task, which is the error text for failed tasks.
    pub fn result_of(&self, name: &str) -> Option<&str> {
        self.tasks.get(name).map(|t| t.result.as_str())
    }

    pub fn successful(&self) -> impl Iterator<Item=&TaskResult> {
        self.tasks.values().filter(|t| t.success)
    }
}

#[cfg(test)]
mod test_outcome {
    use std::collections::BTreeMap;
    use std::time::Duration;
    use super::{ParallelMetrics, ParallelOutcome, Synthesis, TaskResult};

    #[test]
    fn test_failed_task_result_text() {
        let failed = TaskResult::failed("risk".to_string(), "timeout".to_string(), Duration::ZERO);
        assert_eq!(failed.result, "Error: timeout");
        assert_eq!(failed.error.as_deref(), Some("timeout"));
        assert!(!failed.success);
    }

    #[test]
    fn test_counts_and_metrics() {
        let tasks = BTreeMap::from([
            ("a".to_string(), TaskResult::succeeded("a".to_string(), "ok".to_string(), Duration::from_millis(10))),
            ("b".to_string(), TaskResult::failed("b".to_string(), "boom".to_string(), Duration::from_millis(30))),
        ]);
        let metrics = ParallelMetrics::from_tasks(tasks.values(), Duration::from_millis(31), 2);
        assert_eq!(metrics.average_execution_time, Some(Duration::from_millis(20)));
        assert_eq!(metrics.fastest_execution, Some(Duration::from_millis(10)));
        assert_eq!(metrics.slowest_execution, Some(Duration::from_millis(30)));

        let outcome = ParallelOutcome::new(tasks, Synthesis::NotRequested, metrics);
        assert_eq!(outcome.successful_count, 1);
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.successful().count(), 1);
        assert_eq!(outcome.result_of("b"), Some("Error: boom"));
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = ParallelMetrics::from_tasks(std::iter::empty(), Duration::ZERO, 0);
        assert_eq!(metrics.average_execution_time, None);
        assert_eq!(metrics.fastest_execution, None);
    }

    #[test]
    fn test_synthesis_display() {
        assert_eq!(Synthesis::NoInputAvailable.to_string(), "Synthesis skipped: no input available");
        assert_eq!(Synthesis::Failed("quota".to_string()).to_string(), "Synthesis failed: quota");
        assert_eq!(Synthesis::Completed("sum".to_string()).text(), Some("sum"));
        assert!(!Synthesis::NotRequested.is_attempted());
    }
}

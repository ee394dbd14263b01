use std::collections::BTreeMap;
use std::time::Instant;
use log::{info, warn};
use serde::Serialize;

use crate::chain::outcome::{ParallelMetrics, TaskResult};
use crate::chain::ChainExecutor;
use crate::decomposition::errors::InvalidDecomposition;
use crate::decomposition::{Task, TaskDecomposer, TaskSummary};
use crate::prompt::PromptTemplate;
use crate::utils::llm::Generate;

/// Placeholder of a subtask template receiving the overall objective.
pub const OBJECTIVE_PLACEHOLDER: &str = "objective";
/// Placeholder of a subtask template receiving the labelled results of the task's dependencies, or `None`.
pub const DEPENDENCY_RESULTS_PLACEHOLDER: &str = "dependency_results";

pub const SUBTASK_TEMPLATE: &str = "Objective: {{objective}}

Subtask: {{title}}
{{description}}

Results of the subtasks this one builds on:
{{dependency_results}}

Complete this subtask:";

/// Result of running a [TaskDecomposer] wave by wave.
#[derive(Debug, Clone, Serialize)]
#[readonly::make]
pub struct DecompositionOutcome {
    /// Every task completed, so nothing failed or was blocked
    pub success: bool,
    /// Task ids of each wave, in the order the waves ran
    pub waves: Vec<Vec<String>>,
    /// Every task that ran, by id
    pub tasks: BTreeMap<String, TaskResult>,
    /// Tasks that never ran because a dependency did not complete
    pub blocked: Vec<String>,
    pub summary: TaskSummary,
    /// `max_workers_used` is the largest pool of any wave
    pub metrics: ParallelMetrics,
}

impl DecompositionOutcome {
    pub fn result_of(&self, id: &str) -> Option<&str> {
        self.tasks.get(id).map(|t| t.result.as_str())
    }
}

impl<'g, G: Generate + Sync + ?Sized> ChainExecutor<'g, G> {
    /// Run the decomposition with [SUBTASK_TEMPLATE].
    pub fn run_decomposition(&self, decomposer: &mut TaskDecomposer, objective: &str) -> Result<DecompositionOutcome, InvalidDecomposition> {
        self.run_decomposition_with(decomposer, objective, SUBTASK_TEMPLATE)
    }

    /// Run every ready task of `decomposer` as one parallel wave, record the results into it and repeat until no
    /// task is ready. Pending tasks left over are marked blocked.
    ///
    /// `template` receives `{{objective}}`, `{{title}}`, `{{description}}` and `{{dependency_results}}`. A
    /// decomposition with unknown dependencies or a cycle is rejected before anything runs.
    pub fn run_decomposition_with(&self, decomposer: &mut TaskDecomposer, objective: &str,
                                  template: &str) -> Result<DecompositionOutcome, InvalidDecomposition> {
        let report = decomposer.validate_dependencies();
        if !report.is_valid {
            return Err(InvalidDecomposition { issues: report.issues });
        }
        let start = Instant::now();
        let mut waves = Vec::new();
        let mut tasks = BTreeMap::new();
        let mut peak_workers = 0;
        loop {
            let jobs: Vec<(String, Result<String, String>)> = decomposer.ready_tasks()
                .into_iter()
                .map(|task| (task.id.clone(), subtask_prompt(template, objective, task, decomposer)))
                .collect();
            if jobs.is_empty() {
                break;
            }
            for (id, _) in &jobs {
                decomposer.mark_in_progress(id)?;
            }
            let workers = self.config.workers_for(jobs.len());
            peak_workers = peak_workers.max(workers);
            info!("Running wave {} with {} tasks on {} workers", waves.len() + 1, jobs.len(), workers);

            let results = self.run_pool(&jobs, workers);
            for result in results.values() {
                match &result.error {
                    None => decomposer.mark_completed(&result.name, Some(result.result.clone()))?,
                    Some(error) => decomposer.mark_failed(&result.name, error.as_str())?,
                }
            }
            waves.push(jobs.into_iter().map(|(id, _)| id).collect());
            tasks.extend(results);
        }

        let blocked = decomposer.block_pending();
        if !blocked.is_empty() {
            warn!("Blocked by failed dependencies: {}", blocked.join(", "));
        }
        let summary = decomposer.summary();
        let metrics = ParallelMetrics::from_tasks(tasks.values(), start.elapsed(), peak_workers);
        Ok(DecompositionOutcome {
            success: blocked.is_empty() && tasks.values().all(|t: &TaskResult| t.success),
            waves,
            tasks,
            blocked,
            summary,
            metrics,
        })
    }
}

fn subtask_prompt(template: &str, objective: &str, task: &Task, decomposer: &TaskDecomposer) -> Result<String, String> {
    let dependency_results = task.dependencies.iter()
        .filter_map(|dep| decomposer.task(dep))
        .map(|dep| format!("{}:\n{}", dep.title, dep.result.as_deref().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n\n");
    let dependency_results = if dependency_results.is_empty() { "None".to_string() } else { dependency_results };
    PromptTemplate::new(template)
        .render(&[
            (OBJECTIVE_PLACEHOLDER, objective),
            ("title", task.title.as_str()),
            ("description", task.description.as_str()),
            (DEPENDENCY_RESULTS_PLACEHOLDER, dependency_results.as_str()),
        ])
        .map_err(|e| e.to_string())
}

//! # Task Decomposition
//!
//! A [TaskDecomposer] holds subtasks of a larger objective and the dependencies between them. Tasks whose
//! dependencies are all completed are *ready*; [ChainExecutor::run_decomposition](crate::chain::ChainExecutor::run_decomposition)
//! runs each set of ready tasks as one parallel wave until nothing is left to run.
//!
//! ```
//! use promptchain::decomposition::{create_parallel_decomposition, TaskStatus};
//!
//! let mut decomposer = create_parallel_decomposition(&["Assess cost", "Assess risk"], Some("Recommend"));
//! let ready: Vec<&str> = decomposer.ready_tasks().iter().map(|t| t.id.as_str()).collect();
//! assert_eq!(ready, vec!["parallel_task_1", "parallel_task_2"]);
//!
//! decomposer.mark_completed("parallel_task_1", Some("cheap".to_string())).unwrap();
//! decomposer.mark_completed("parallel_task_2", None).unwrap();
//! assert_eq!(decomposer.ready_tasks()[0].id, "final_task");
//! assert_eq!(decomposer.task("parallel_task_1").unwrap().status, TaskStatus::Completed);
//! ```

use std::collections::HashSet;
use serde::Serialize;

use crate::decomposition::errors::{CircularDependency, UnknownTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    /// A dependency failed or never ran, so the task cannot run
    Blocked,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Blocked,
        TaskStatus::Failed,
    ];
}

/// A subtask. Only its [TaskDecomposer] changes its status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[readonly::make]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Ids of the tasks this one builds on
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRef {
    fn of(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            error: task.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub total_tasks: usize,
    /// Every status with its task count, in [TaskStatus::ALL] order
    pub status_counts: Vec<(TaskStatus, usize)>,
    /// Completed share of all tasks, 0 without tasks
    pub completion_rate: f64,
    pub completed_tasks: Vec<TaskRef>,
    pub failed_tasks: Vec<TaskRef>,
    pub ready_tasks: Vec<TaskRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

/// Subtasks in insertion order with their dependencies.
#[derive(Debug, Clone, Default)]
pub struct TaskDecomposer {
    tasks: Vec<Task>,
}

impl TaskDecomposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pending task. A task with the same id is replaced in place.
    pub fn add_task(&mut self, id: impl Into<String>, title: impl Into<String>, description: impl Into<String>,
                    dependencies: Vec<String>) -> &Task {
        let task = Task {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            dependencies,
            status: TaskStatus::Pending,
            result: None,
            error: None,
        };
        let index = match self.tasks.iter().position(|t| t.id == task.id) {
            Some(index) => {
                self.tasks[index] = task;
                index
            }
            None => {
                self.tasks.push(task);
                self.tasks.len() - 1
            }
        };
        &self.tasks[index]
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn task_mut(&mut self, id: &str) -> Result<&mut Task, UnknownTask> {
        self.tasks.iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| UnknownTask { task_id: id.to_string() })
    }

    fn is_completed(&self, id: &str) -> bool {
        self.task(id).map_or(false, |t| t.status == TaskStatus::Completed)
    }

    /// Pending tasks whose dependencies are all completed. A dependency on an unknown task is never met.
    pub fn ready_tasks(&self) -> Vec<&Task> {
        self.tasks.iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| t.dependencies.iter().all(|dep| self.is_completed(dep)))
            .collect()
    }

    pub fn mark_in_progress(&mut self, id: &str) -> Result<(), UnknownTask> {
        self.task_mut(id)?.status = TaskStatus::InProgress;
        Ok(())
    }

    pub fn mark_completed(&mut self, id: &str, result: Option<String>) -> Result<(), UnknownTask> {
        let task = self.task_mut(id)?;
        task.status = TaskStatus::Completed;
        task.result = result;
        Ok(())
    }

    pub fn mark_failed(&mut self, id: &str, error: impl Into<String>) -> Result<(), UnknownTask> {
        let task = self.task_mut(id)?;
        task.status = TaskStatus::Failed;
        task.error = Some(error.into());
        Ok(())
    }

    /// Mark every still pending task as blocked. Returns their ids.
    pub fn block_pending(&mut self) -> Vec<String> {
        self.tasks.iter_mut()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| {
                t.status = TaskStatus::Blocked;
                t.id.clone()
            })
            .collect()
    }

    /// Task ids ordered so every task comes after its known dependencies. Ties keep insertion order.
    pub fn execution_order(&self) -> Result<Vec<String>, CircularDependency> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            self.visit(&task.id, &mut visiting, &mut visited, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(&'a self, id: &'a str, visiting: &mut HashSet<&'a str>, visited: &mut HashSet<&'a str>,
                 order: &mut Vec<String>) -> Result<(), CircularDependency> {
        if visited.contains(id) {
            return Ok(());
        }
        if !visiting.insert(id) {
            return Err(CircularDependency { task_id: id.to_string() });
        }
        if let Some(task) = self.task(id) {
            for dep in &task.dependencies {
                if self.task(dep).is_some() {
                    self.visit(dep, visiting, visited, order)?;
                }
            }
        }
        visiting.remove(id);
        visited.insert(id);
        order.push(id.to_string());
        Ok(())
    }

    /// Unknown dependencies and dependency cycles.
    pub fn validate_dependencies(&self) -> DependencyReport {
        let mut issues: Vec<String> = self.tasks.iter()
            .flat_map(|task| task.dependencies.iter()
                .filter(|dep| self.task(dep).is_none())
                .map(move |dep| format!("Task '{}' depends on non-existent task '{}'", task.id, dep)))
            .collect();
        if let Err(cycle) = self.execution_order() {
            issues.push(cycle.to_string());
        }
        DependencyReport { is_valid: issues.is_empty(), issues }
    }

    pub fn summary(&self) -> TaskSummary {
        let status_counts = TaskStatus::ALL.iter()
            .map(|status| (*status, self.tasks.iter().filter(|t| t.status == *status).count()))
            .collect();
        let with_status = |status: TaskStatus| -> Vec<TaskRef> {
            self.tasks.iter().filter(|t| t.status == status).map(TaskRef::of).collect()
        };
        let completed_tasks = with_status(TaskStatus::Completed);
        let completion_rate = if self.tasks.is_empty() {
            0.0
        } else {
            completed_tasks.len() as f64 / self.tasks.len() as f64
        };
        TaskSummary {
            total_tasks: self.tasks.len(),
            status_counts,
            completion_rate,
            completed_tasks,
            failed_tasks: with_status(TaskStatus::Failed),
            ready_tasks: self.ready_tasks().into_iter().map(TaskRef::of).collect(),
        }
    }
}

/// Subtasks `task_1..task_n`, each depending on the one before.
pub fn create_simple_decomposition(subtasks: &[&str]) -> TaskDecomposer {
    let mut decomposer = TaskDecomposer::new();
    for (i, description) in subtasks.iter().enumerate() {
        let dependencies = if i == 0 { Vec::new() } else { vec![format!("task_{}", i)] };
        decomposer.add_task(format!("task_{}", i + 1), format!("Step {}", i + 1), *description, dependencies);
    }
    decomposer
}

/// Independent subtasks `parallel_task_1..n`, plus a `final_task` depending on all of them when given.
pub fn create_parallel_decomposition(parallel_tasks: &[&str], final_task: Option<&str>) -> TaskDecomposer {
    let mut decomposer = TaskDecomposer::new();
    let mut parallel_ids = Vec::with_capacity(parallel_tasks.len());
    for (i, description) in parallel_tasks.iter().enumerate() {
        let id = format!("parallel_task_{}", i + 1);
        decomposer.add_task(id.as_str(), format!("Parallel Step {}", i + 1), *description, Vec::new());
        parallel_ids.push(id);
    }
    if let Some(final_task) = final_task {
        decomposer.add_task("final_task", "Final Integration", final_task, parallel_ids);
    }
    decomposer
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionKind {
    Simple,
    Sequential,
    Parallel,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplexityAnalysis {
    pub complexity: ComplexityLevel,
    pub decomposition: DecompositionKind,
    /// Between 2 and 8, one per twenty words
    pub estimated_subtasks: usize,
    pub word_count: usize,
}

const HIGH_COMPLEXITY_WORDS: [&str; 7] = ["analyze", "research", "compare", "evaluate", "design", "plan", "strategy"];
const MEDIUM_COMPLEXITY_WORDS: [&str; 5] = ["create", "write", "implement", "develop", "build"];
const SEQUENTIAL_WORDS: [&str; 6] = ["first", "then", "next", "after", "finally", "step"];
const PARALLEL_WORDS: [&str; 4] = ["simultaneously", "parallel", "concurrent", "meanwhile"];

/// Keyword heuristics suggesting how to decompose a task description.
pub fn analyze_task_complexity(description: &str) -> ComplexityAnalysis {
    let lowered = description.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|word| lowered.contains(word));
    let complexity = if mentions(&HIGH_COMPLEXITY_WORDS) {
        ComplexityLevel::High
    } else if mentions(&MEDIUM_COMPLEXITY_WORDS) {
        ComplexityLevel::Medium
    } else {
        ComplexityLevel::Low
    };
    let decomposition = match (mentions(&SEQUENTIAL_WORDS), mentions(&PARALLEL_WORDS)) {
        (true, true) => DecompositionKind::Mixed,
        (true, false) => DecompositionKind::Sequential,
        (false, true) => DecompositionKind::Parallel,
        (false, false) => DecompositionKind::Simple,
    };
    let word_count = description.split_whitespace().count();
    ComplexityAnalysis {
        complexity,
        decomposition,
        estimated_subtasks: (word_count / 20).clamp(2, 8),
        word_count,
    }
}

pub mod errors {
    use std::error::Error;
    use std::fmt;
    use std::fmt::Formatter;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct UnknownTask {
        pub task_id: String,
    }

    impl fmt::Display for UnknownTask {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "UnknownTask: no task with id '{}'", self.task_id)
        }
    }

    impl Error for UnknownTask {}

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct CircularDependency {
        /// The task reached again while its own dependencies were being visited
        pub task_id: String,
    }

    impl fmt::Display for CircularDependency {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "Circular dependency detected involving task {}", self.task_id)
        }
    }

    impl Error for CircularDependency {}

    /// A decomposition that cannot be run as given.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct InvalidDecomposition {
        pub issues: Vec<String>,
    }

    impl fmt::Display for InvalidDecomposition {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "InvalidDecomposition: {}", self.issues.join("; "))
        }
    }

    impl Error for InvalidDecomposition {}

    impl From<UnknownTask> for InvalidDecomposition {
        fn from(e: UnknownTask) -> Self {
            Self { issues: vec![e.to_string()] }
        }
    }
}

#[cfg(test)]
mod test_decomposition {
    use super::*;

    fn owned(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_execution_order_puts_dependencies_first() {
        let mut decomposer = TaskDecomposer::new();
        decomposer.add_task("report", "Report", "write it up", owned(&["analysis", "data"]));
        decomposer.add_task("analysis", "Analysis", "crunch", owned(&["data"]));
        decomposer.add_task("data", "Data", "collect", Vec::new());
        decomposer.add_task("notes", "Notes", "independent", Vec::new());

        assert_eq!(decomposer.execution_order().unwrap(), owned(&["data", "analysis", "report", "notes"]));
    }

    #[test]
    fn test_cycle_detected() {
        let mut decomposer = TaskDecomposer::new();
        decomposer.add_task("a", "A", "", owned(&["c"]));
        decomposer.add_task("b", "B", "", owned(&["a"]));
        decomposer.add_task("c", "C", "", owned(&["b"]));

        let err = decomposer.execution_order().unwrap_err();
        assert_eq!(err.task_id, "a");
        let report = decomposer.validate_dependencies();
        assert!(!report.is_valid);
        assert_eq!(report.issues, vec!["Circular dependency detected involving task a".to_string()]);
        assert!(decomposer.ready_tasks().is_empty());
    }

    #[test]
    fn test_unknown_dependency() {
        let mut decomposer = TaskDecomposer::new();
        decomposer.add_task("a", "A", "", owned(&["ghost"]));
        decomposer.add_task("b", "B", "", Vec::new());

        let report = decomposer.validate_dependencies();
        assert_eq!(report.issues, vec!["Task 'a' depends on non-existent task 'ghost'".to_string()]);
        // unknown dependencies are skipped when ordering, but never met when running
        assert_eq!(decomposer.execution_order().unwrap(), owned(&["a", "b"]));
        let ready: Vec<&str> = decomposer.ready_tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ready, vec!["b"]);
    }

    #[test]
    fn test_status_transitions_and_summary() {
        let mut decomposer = create_simple_decomposition(&["outline", "draft", "edit"]);
        assert_eq!(decomposer.task("task_2").unwrap().dependencies, owned(&["task_1"]));

        decomposer.mark_in_progress("task_1").unwrap();
        assert!(decomposer.ready_tasks().is_empty());
        decomposer.mark_completed("task_1", Some("outline done".to_string())).unwrap();
        decomposer.mark_failed("task_2", "model refused").unwrap();
        assert_eq!(decomposer.mark_completed("task_9", None).unwrap_err().task_id, "task_9");
        assert_eq!(decomposer.block_pending(), owned(&["task_3"]));

        let summary = decomposer.summary();
        assert_eq!(summary.total_tasks, 3);
        assert!((summary.completion_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.status_counts[2], (TaskStatus::Completed, 1));
        assert_eq!(summary.status_counts[3], (TaskStatus::Blocked, 1));
        assert_eq!(summary.failed_tasks[0].error.as_deref(), Some("model refused"));
        assert!(summary.ready_tasks.is_empty());
        assert_eq!(TaskDecomposer::new().summary().completion_rate, 0.0);
    }

    #[test]
    fn test_replacing_a_task_keeps_its_position() {
        let mut decomposer = create_parallel_decomposition(&["x", "y"], None);
        decomposer.add_task("parallel_task_1", "Redo", "x again", Vec::new());
        assert_eq!(decomposer.tasks()[0].title, "Redo");
        assert_eq!(decomposer.tasks().len(), 2);
    }

    #[test]
    fn test_analyze_task_complexity() {
        let analysis = analyze_task_complexity("First research the market, then write a plan");
        assert_eq!(analysis.complexity, ComplexityLevel::High);
        assert_eq!(analysis.decomposition, DecompositionKind::Sequential);
        assert_eq!(analysis.estimated_subtasks, 2);

        let analysis = analyze_task_complexity("List colours");
        assert_eq!(analysis.complexity, ComplexityLevel::Low);
        assert_eq!(analysis.decomposition, DecompositionKind::Simple);
    }
}

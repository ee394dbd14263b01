use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use log::{error, info, warn};

use crate::chain::outcome::{ParallelMetrics, ParallelOutcome, Synthesis, TaskResult};
use crate::chain::ChainExecutor;
use crate::prompt::PromptTemplate;
use crate::utils::llm::Generate;

/// Placeholder every parallel task template receives the shared document through.
pub const DOCUMENT_PLACEHOLDER: &str = "document";
/// Placeholder of a synthesis template receiving the labelled successful task outputs.
pub const ANALYSIS_RESULTS_PLACEHOLDER: &str = "analysis_results";
/// Placeholder of a synthesis template receiving the shared document.
pub const ORIGINAL_DOCUMENT_PLACEHOLDER: &str = "original_document";

impl<'g, G: Generate + Sync + ?Sized> ChainExecutor<'g, G> {
    /// Run every named template once against `document` on a bounded pool of worker threads, then optionally
    /// synthesize the successful outputs.
    ///
    /// Blocks until every task has finished. A task's error never affects its siblings. When the same name is
    /// given twice, the last template wins.
    pub fn run_parallel<N, T>(&self, templates: impl IntoIterator<Item=(N, T)>, document: &str,
                              synthesis_template: Option<&str>) -> ParallelOutcome
        where N: Into<String>,
              T: Into<String> {
        let start = Instant::now();
        let mut named: BTreeMap<String, String> = BTreeMap::new();
        for (name, template) in templates {
            let name = name.into();
            if named.insert(name.clone(), template.into()).is_some() {
                warn!("Task {} was given twice, keeping the last template", name);
            }
        }
        let tasks: Vec<(String, String)> = named.into_iter().collect();
        let workers = self.config.workers_for(tasks.len());
        info!("Starting parallel chain with {} tasks on {} workers", tasks.len(), workers);

        let jobs: Vec<(String, Result<String, String>)> = tasks.into_iter()
            .map(|(name, template)| {
                let prompt = PromptTemplate::new(template)
                    .render(&[(DOCUMENT_PLACEHOLDER, document)])
                    .map_err(|e| e.to_string());
                (name, prompt)
            })
            .collect();
        let results = self.run_pool(&jobs, workers);
        let synthesis = match synthesis_template {
            None => Synthesis::NotRequested,
            Some(template) => self.synthesize(template, &results, document),
        };
        let metrics = ParallelMetrics::from_tasks(results.values(), start.elapsed(), workers);
        ParallelOutcome::new(results, synthesis, metrics)
    }

    /// Workers pull the next unclaimed job until none are left. Results are merged only after every worker joined.
    ///
    /// A job whose prompt could not be rendered fails without reaching the generator.
    pub(super) fn run_pool(&self, jobs: &[(String, Result<String, String>)], workers: usize) -> BTreeMap<String, TaskResult> {
        let next_job = AtomicUsize::new(0);
        let (sender, receiver) = mpsc::channel::<TaskResult>();
        thread::scope(|scope| {
            for _ in 0..workers {
                let sender = sender.clone();
                let next_job = &next_job;
                scope.spawn(move || {
                    while let Some((name, prompt)) = jobs.get(next_job.fetch_add(1, Ordering::Relaxed)) {
                        if sender.send(self.run_task(name, prompt)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(sender);
        receiver.into_iter()
            .map(|result| (result.name.clone(), result))
            .collect()
    }

    fn run_task(&self, name: &str, prompt: &Result<String, String>) -> TaskResult {
        let task_start = Instant::now();
        info!("Starting parallel execution: {}", name);
        let output = match prompt {
            Ok(prompt) => self.generator.generate(prompt).map_err(|e| e.to_string()),
            Err(message) => Err(message.clone()),
        };
        let execution_time = task_start.elapsed();
        match output {
            Ok(output) => {
                info!("Completed {} in {:.3}s", name, execution_time.as_secs_f64());
                TaskResult::succeeded(name.to_string(), output, execution_time)
            }
            Err(e) => {
                error!("Failed {} in {:.3}s: {}", name, execution_time.as_secs_f64(), e);
                TaskResult::failed(name.to_string(), e, execution_time)
            }
        }
    }

    fn synthesize(&self, template: &str, results: &BTreeMap<String, TaskResult>, document: &str) -> Synthesis {
        let analysis_results = synthesis_input(results);
        if analysis_results.is_empty() {
            warn!("Skipping synthesis: no task succeeded");
            return Synthesis::NoInputAvailable;
        }
        let synthesized = PromptTemplate::new(template)
            .render(&[
                (ANALYSIS_RESULTS_PLACEHOLDER, analysis_results.as_str()),
                (ORIGINAL_DOCUMENT_PLACEHOLDER, document),
            ])
            .map_err(anyhow::Error::from)
            .and_then(|prompt| self.generator.generate(&prompt));
        match synthesized {
            Ok(text) => {
                info!("Synthesis completed successfully");
                Synthesis::Completed(text)
            }
            Err(e) => {
                error!("Synthesis failed: {}", e);
                Synthesis::Failed(e.to_string())
            }
        }
    }
}

/// Successful outputs labelled by their uppercased task name, separated by blank lines.
fn synthesis_input(results: &BTreeMap<String, TaskResult>) -> String {
    results.values()
        .filter(|r| r.success)
        .map(|r| format!("{}:\n{}", r.name.to_uppercase(), r.result))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod test_parallel {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use anyhow::{anyhow, Result};
    use parking_lot::Mutex;
    use crate::chain::{ChainConfig, ChainExecutor, Synthesis};

    fn mock(prompt: &str) -> Result<String> {
        if prompt.starts_with("fail") {
            Err(anyhow!("provider exploded"))
        } else {
            Ok(format!("done[{}]", prompt))
        }
    }

    #[test]
    fn test_failure_isolation() {
        let executor = ChainExecutor::new(&mock, ChainConfig::default());
        let outcome = executor.run_parallel([("a", "ok {{document}}"), ("b", "fail {{document}}")], "doc", None);

        assert_eq!(outcome.successful_count, 1);
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.result_of("a"), Some("done[ok doc]"));
        assert!(outcome.result_of("b").unwrap().contains("provider exploded"));
        assert_eq!(outcome.tasks["b"].error.as_deref(), Some("provider exploded"));
        assert_eq!(outcome.synthesis, Synthesis::NotRequested);
        assert_eq!(outcome.metrics.max_workers_used, 2);
    }

    #[test]
    fn test_names_preserved() {
        let executor = ChainExecutor::new(&mock, ChainConfig::default());
        let names = ["technical", "market", "risk", "fail_one", "implementation", "legal"];
        let templates: Vec<(String, String)> = names.iter()
            .map(|n| (n.to_string(), if n.starts_with("fail") { "fail".to_string() } else { format!("{} {{{{document}}}}", n) }))
            .collect();
        let outcome = executor.run_parallel(templates, "doc", None);

        let returned: HashSet<&str> = outcome.tasks.keys().map(String::as_str).collect();
        assert_eq!(returned, names.iter().copied().collect::<HashSet<&str>>());
        assert_eq!(outcome.successful_count + outcome.failed_count, names.len());
        assert_eq!(outcome.metrics.max_workers_used, 4);
        assert_eq!(outcome.result_of("risk"), Some("done[risk doc]"));
    }

    #[test]
    fn test_synthesis_over_successful_outputs() {
        let prompts = Mutex::new(Vec::new());
        let recording = |prompt: &str| -> Result<String> {
            prompts.lock().push(prompt.to_string());
            mock(prompt)
        };
        let executor = ChainExecutor::new(&recording, ChainConfig::default());
        let outcome = executor.run_parallel(
            [("alpha", "A {{document}}"), ("beta", "fail"), ("gamma", "G {{document}}")],
            "memo",
            Some("Combine:\n{{analysis_results}}\nSource: {{original_document}}"),
        );

        let expected_prompt = "Combine:\nALPHA:\ndone[A memo]\n\nGAMMA:\ndone[G memo]\nSource: memo";
        assert_eq!(outcome.synthesis, Synthesis::Completed(format!("done[{}]", expected_prompt)));
        assert_eq!(prompts.lock().len(), 4);
        assert_eq!(outcome.successful_count, 2);
    }

    #[test]
    fn test_synthesis_skipped_without_successes() {
        let calls = AtomicUsize::new(0);
        let down = |_: &str| -> Result<String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("down"))
        };
        let executor = ChainExecutor::new(&down, ChainConfig::default());
        let outcome = executor.run_parallel([("x", "{{document}}"), ("y", "{{document}}")], "d", Some("{{analysis_results}}"));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.synthesis, Synthesis::NoInputAvailable);
        assert_eq!(outcome.failed_count, 2);
    }

    #[test]
    fn test_synthesis_failure_keeps_task_results() {
        let executor = ChainExecutor::new(&mock, ChainConfig::default());
        let outcome = executor.run_parallel([("a", "ok {{document}}")], "d", Some("fail {{analysis_results}}"));

        assert_eq!(outcome.synthesis, Synthesis::Failed("provider exploded".to_string()));
        assert_eq!(outcome.successful_count, 1);
        assert_eq!(outcome.result_of("a"), Some("done[ok d]"));
    }

    #[test]
    fn test_worker_cap_bounds_concurrency() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let slow = |prompt: &str| -> Result<String> {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(prompt.to_string())
        };
        let executor = ChainExecutor::new(&slow, ChainConfig::default().with_max_workers(2));
        let templates: Vec<(String, &str)> = (0..6).map(|i| (format!("t{}", i), "{{document}}")).collect();
        let outcome = executor.run_parallel(templates, "d", None);

        assert_eq!(outcome.successful_count, 6);
        assert_eq!(outcome.metrics.max_workers_used, 2);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_no_tasks() {
        let executor = ChainExecutor::new(&mock, ChainConfig::default());
        let outcome = executor.run_parallel(Vec::<(String, String)>::new(), "d", Some("{{analysis_results}}"));

        assert!(outcome.tasks.is_empty());
        assert_eq!(outcome.metrics.max_workers_used, 0);
        assert_eq!(outcome.metrics.average_execution_time, None);
        assert_eq!(outcome.synthesis, Synthesis::NoInputAvailable);
    }
}

//! Self-consistency: solve the same problem along several reasoning paths at once, then vote on the final answer.

use log::{info, warn};

use crate::chain::{ChainConfig, ChainExecutor, ParallelOutcome};
use crate::utils::llm::Generate;
use crate::utils::postprocess::voting::{analyze_consistency, semantic_vote, ConsistencyReport, SemanticVote};

pub const DEFAULT_PATHS: usize = 3;
/// Filled per path before the problem is rendered into `{{document}}`
pub const PATH_NUMBER_PLACEHOLDER: &str = "{{path_number}}";

pub const REASONING_TEMPLATE: &str = "Solve this problem using approach #{{path_number}}. Use a unique reasoning method.

Problem: {{document}}

Approach {{path_number}} - Think about this differently than other approaches:
- If path 1: Work backwards from the final amount
- If path 2: Set up algebraic equations
- If path 3: Use step-by-step percentage calculations
- If path 4: Create a visualization or table approach

Show your reasoning and provide a clear final answer:";

#[derive(Debug, Clone)]
pub struct ConsistentAnswer {
    pub vote: SemanticVote,
    pub consistency: ConsistencyReport,
    /// Every path, including failed ones
    pub paths: ParallelOutcome,
}

impl ConsistentAnswer {
    pub fn answer(&self) -> &str {
        &self.vote.vote.winner
    }
}

pub struct SelfConsistency<'g, G: ?Sized> {
    executor: ChainExecutor<'g, G>,
    paths: usize,
    template: String,
}

impl<'g, G: Generate + Sync + ?Sized> SelfConsistency<'g, G> {
    pub fn new(generator: &'g G, config: ChainConfig) -> Self {
        Self {
            executor: ChainExecutor::new(generator, config),
            paths: DEFAULT_PATHS,
            template: REASONING_TEMPLATE.to_string(),
        }
    }

    pub fn with_paths(mut self, paths: usize) -> Self {
        self.paths = paths;
        self
    }

    /// Use another reasoning template. It receives the problem through `{{document}}` and may use `{{path_number}}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    fn path_templates(&self) -> Vec<(String, String)> {
        (1..=self.paths)
            .map(|n| (format!("path_{:02}", n), self.template.replace(PATH_NUMBER_PLACEHOLDER, &n.to_string())))
            .collect()
    }

    pub fn solve(&self, problem: &str) -> ConsistentAnswer {
        let paths = self.executor.run_parallel(self.path_templates(), problem, None);
        let responses: Vec<String> = paths.successful().map(|task| task.result.clone()).collect();
        if responses.len() < self.paths {
            warn!("{} of {} reasoning paths failed", self.paths - responses.len(), self.paths);
        }
        let vote = semantic_vote(&responses);
        let consistency = analyze_consistency(&responses);
        info!("{}", vote.vote.analysis);
        ConsistentAnswer { vote, consistency, paths }
    }
}

#[cfg(test)]
mod test_self_consistency {
    use anyhow::{anyhow, Result};
    use crate::chain::ChainConfig;
    use super::SelfConsistency;

    fn by_approach(prompt: &str) -> Result<String> {
        if prompt.contains("approach #1.") {
            Ok("Working backwards... Final answer: $120,000".to_string())
        } else if prompt.contains("approach #2.") {
            Ok("1.25 * 0.8 * x = 120000. The answer is $120,000".to_string())
        } else if prompt.contains("approach #3.") {
            Ok("Percentages compound. Final answer: $150,000".to_string())
        } else {
            Err(anyhow!("timeout"))
        }
    }

    #[test]
    fn test_vote_over_paths() {
        let solver = SelfConsistency::new(&by_approach, ChainConfig::default());
        let answer = solver.solve("What was the original profit?");

        assert_eq!(answer.paths.tasks.len(), 3);
        assert_eq!(answer.paths.successful_count, 3);
        assert_eq!(answer.answer(), "$120,000");
        assert_eq!(answer.vote.vote.vote_counts[0].1, 2);
        assert_eq!(answer.consistency.unique_answers, 2);
    }

    #[test]
    fn test_failed_paths_do_not_vote() {
        let answer = SelfConsistency::new(&by_approach, ChainConfig::default())
            .with_paths(5)
            .solve("problem");

        assert_eq!(answer.paths.failed_count, 2);
        assert_eq!(answer.vote.vote.total_responses, 3);
        assert!(answer.paths.tasks.contains_key("path_05"));
    }

    #[test]
    fn test_custom_template() {
        let answer = SelfConsistency::new(&|prompt: &str| -> Result<String> { Ok(format!("Answer: {}", prompt)) }, ChainConfig::default())
            .with_template("{{path_number}}+{{document}}")
            .with_paths(2)
            .solve("x");

        assert_eq!(answer.paths.result_of("path_02"), Some("Answer: 2+x"));
        assert_eq!(answer.consistency.unique_answers, 2);
    }
}

//! Route a query by its self-assessed complexity: simple queries get one direct answer, complex ones are decomposed.

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;

use crate::chain::{ChainConfig, ChainExecutor, Step};
use crate::prompt::PromptTemplate;
use crate::utils::llm::Generate;

pub const DEFAULT_COMPLEXITY: u32 = 5;
pub const DEFAULT_COMPLEXITY_THRESHOLD: u32 = 5;
pub const MAX_COMPLEXITY: u32 = 10;

const ASSESS_TEMPLATE: &str = "Rate the complexity of this query from 1-10 and explain briefly why:

Query: {{query}}

Complexity rating (start with number):";

const DIRECT_TEMPLATE: &str = "Provide a direct, comprehensive answer to: {{query}}";

const DECOMPOSE_TEMPLATE: &str = "Break down this complex query into 3-4 specific sub-questions:

Query: {{input}}

Sub-questions:";

const ANSWER_TEMPLATE: &str = "Answer each of the following sub-questions thoroughly:

Questions: {{input}}

Detailed answers:";

const SYNTHESIZE_TEMPLATE: &str = "Synthesize these detailed answers into a cohesive response to the original query:

Original query: {{query}}

Detailed answers: {{input}}

Comprehensive response:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    Direct,
    Decomposed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedAnswer {
    pub complexity: u32,
    pub route: Route,
    pub answer: String,
}

/// Leading run of digits of the rating reply, capped at [MAX_COMPLEXITY].
///
/// `"7/10 because..."` reads as 7 and `"3."` as 3.
pub fn parse_complexity(assessment: &str) -> Option<u32> {
    let digits: String = assessment.trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse::<u32>().map_or(MAX_COMPLEXITY, |rating| rating.min(MAX_COMPLEXITY)))
}

pub struct AdaptiveComplexityChain<'g, G: ?Sized> {
    executor: ChainExecutor<'g, G>,
    threshold: u32,
}

impl<'g, G: Generate + ?Sized> AdaptiveComplexityChain<'g, G> {
    pub fn new(generator: &'g G, config: ChainConfig) -> Self {
        Self {
            executor: ChainExecutor::new(generator, config),
            threshold: DEFAULT_COMPLEXITY_THRESHOLD,
        }
    }

    /// Queries rated at or below `threshold` are answered directly.
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn assess(&self, query: &str) -> Result<u32> {
        let prompt = PromptTemplate::new(ASSESS_TEMPLATE).render(&[("query", query)])?;
        let assessment = self.executor.generator().generate(&prompt)?;
        Ok(parse_complexity(&assessment).unwrap_or_else(|| {
            warn!("Could not read a complexity rating, assuming {}", DEFAULT_COMPLEXITY);
            DEFAULT_COMPLEXITY
        }))
    }

    pub fn answer(&self, query: &str) -> Result<RoutedAnswer> {
        let complexity = self.assess(query)?;
        if complexity <= self.threshold {
            info!("Complexity {} routed to a direct answer", complexity);
            let prompt = PromptTemplate::new(DIRECT_TEMPLATE).render(&[("query", query)])?;
            let answer = self.executor.generator().generate(&prompt)?;
            return Ok(RoutedAnswer { complexity, route: Route::Direct, answer });
        }

        info!("Complexity {} routed to decomposition", complexity);
        let steps = [
            Step::new(DECOMPOSE_TEMPLATE),
            Step::new(ANSWER_TEMPLATE),
            Step::new(SYNTHESIZE_TEMPLATE).with_variable("query", query),
        ];
        let outcome = self.executor.run_sequential(&steps, query);
        match (&outcome.final_output, &outcome.error) {
            (Some(answer), _) => Ok(RoutedAnswer { complexity, route: Route::Decomposed, answer: answer.clone() }),
            (None, Some(failure)) => Err(failure.clone().into()),
            (None, None) => Err(anyhow::anyhow!("Decomposition chain produced no output")),
        }
    }
}

#[cfg(test)]
mod test_adaptive {
    use std::time::Duration;
    use anyhow::{anyhow, Result};
    use parking_lot::Mutex;
    use crate::chain::ChainConfig;
    use super::*;

    fn quick() -> ChainConfig {
        ChainConfig::default().with_base_delay(Duration::ZERO)
    }

    #[test]
    fn test_parse_complexity() {
        assert_eq!(parse_complexity("7/10 because it spans domains"), Some(7));
        assert_eq!(parse_complexity("  3. Simple lookup"), Some(3));
        assert_eq!(parse_complexity("300"), Some(MAX_COMPLEXITY));
        assert_eq!(parse_complexity("99999999999999999999 out of 10"), Some(MAX_COMPLEXITY));
        assert_eq!(parse_complexity("Complexity: 8"), None);
        assert_eq!(parse_complexity(""), None);
    }

    #[test]
    fn test_simple_query_answered_directly() {
        let calls = Mutex::new(Vec::new());
        let generator = |prompt: &str| -> Result<String> {
            calls.lock().push(prompt.to_string());
            if prompt.starts_with("Rate") {
                Ok("2 - trivial".to_string())
            } else {
                Ok("Paris".to_string())
            }
        };
        let answer = AdaptiveComplexityChain::new(&generator, quick()).answer("Capital of France?").unwrap();

        assert_eq!(answer, RoutedAnswer { complexity: 2, route: Route::Direct, answer: "Paris".to_string() });
        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], "Provide a direct, comprehensive answer to: Capital of France?");
    }

    #[test]
    fn test_complex_query_decomposed() {
        let calls = Mutex::new(Vec::new());
        let generator = |prompt: &str| -> Result<String> {
            calls.lock().push(prompt.to_string());
            if prompt.starts_with("Rate") {
                Ok("9 many moving parts".to_string())
            } else if prompt.starts_with("Break down") {
                Ok("Q1? Q2?".to_string())
            } else if prompt.starts_with("Answer each") {
                Ok("A1. A2.".to_string())
            } else {
                Ok("Combined answer".to_string())
            }
        };
        let answer = AdaptiveComplexityChain::new(&generator, quick()).answer("Plan a {{city}} migration").unwrap();

        assert_eq!(answer.route, Route::Decomposed);
        assert_eq!(answer.complexity, 9);
        assert_eq!(answer.answer, "Combined answer");
        let calls = calls.lock();
        assert_eq!(calls.len(), 4);
        assert!(calls[3].contains("Original query: Plan a {{city}} migration"));
        assert!(calls[3].contains("Detailed answers: A1. A2."));
    }

    #[test]
    fn test_unreadable_rating_uses_default() {
        let generator = |prompt: &str| -> Result<String> {
            if prompt.starts_with("Rate") { Ok("hard to say".to_string()) } else { Ok("answer".to_string()) }
        };
        let chain = AdaptiveComplexityChain::new(&generator, quick());
        assert_eq!(chain.assess("q").unwrap(), DEFAULT_COMPLEXITY);
        assert_eq!(chain.answer("q").unwrap().route, Route::Direct);
        assert_eq!(chain.with_threshold(4).answer("q").unwrap().route, Route::Decomposed);
    }

    #[test]
    fn test_out_of_scale_rating_is_decomposed() {
        let generator = |prompt: &str| -> Result<String> {
            if prompt.starts_with("Rate") { Ok("300".to_string()) } else { Ok("answer".to_string()) }
        };
        let answer = AdaptiveComplexityChain::new(&generator, quick()).answer("q").unwrap();
        assert_eq!(answer.complexity, MAX_COMPLEXITY);
        assert_eq!(answer.route, Route::Decomposed);
    }

    #[test]
    fn test_errors_propagate() {
        let generator = |prompt: &str| -> Result<String> {
            if prompt.starts_with("Rate") { Ok("10".to_string()) } else { Err(anyhow!("rate limited")) }
        };
        let err = AdaptiveComplexityChain::new(&generator, quick().with_max_retries(0)).answer("q").unwrap_err();
        assert_eq!(err.to_string(), "Chain failed at step 1 after 1 attempts: generation error: rate limited");
    }
}

//! Three-stage content creation: outline, detailed draft, then a refinement pass for the audience.

use log::info;
use serde::Serialize;

use crate::chain::errors::StepFailure;
use crate::chain::{AttemptRecord, ChainConfig, ChainExecutor, Step, Validator};
use crate::utils::llm::Generate;

const OUTLINE_TEMPLATE: &str = "Research {{topic}} for {{audience}}. Create an outline with:
1. Key concepts to cover
2. 5 main sections
3. Supporting details for each section

Topic: {{topic}}
Audience: {{audience}}

Outline:";

const DETAIL_TEMPLATE: &str = "Using the following outline, write detailed content for a {{content_type}}.
Make each section comprehensive but accessible:

Outline: {{input}}

Detailed content:";

const REFINE_TEMPLATE: &str = "Review the following content for {{audience}}. Improve:
1. Clarity and readability
2. Flow between sections
3. Engagement level

Original content: {{input}}

Refined content:";

/// Every stage of a finished pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ContentDraft {
    pub outline: String,
    pub detailed_content: String,
    pub final_content: String,
    pub history: Vec<AttemptRecord>,
}

pub struct ContentPipeline<'g, G: ?Sized> {
    executor: ChainExecutor<'g, G>,
    final_validators: Vec<Validator>,
}

impl<'g, G: Generate + ?Sized> ContentPipeline<'g, G> {
    pub fn new(generator: &'g G, config: ChainConfig) -> Self {
        Self {
            executor: ChainExecutor::new(generator, config),
            final_validators: Vec::new(),
        }
    }

    /// Check the refined content, retrying the refinement when it is rejected.
    pub fn with_final_validator(mut self, validator: Validator) -> Self {
        self.final_validators.push(validator);
        self
    }

    fn steps(&self, topic: &str, audience: &str, content_type: &str) -> Vec<Step> {
        let refine = self.final_validators.iter()
            .cloned()
            .fold(Step::new(REFINE_TEMPLATE).with_variable("audience", audience), Step::with);
        vec![
            Step::new(OUTLINE_TEMPLATE)
                .with_variable("topic", topic)
                .with_variable("audience", audience),
            Step::new(DETAIL_TEMPLATE).with_variable("content_type", content_type),
            refine,
        ]
    }

    pub fn create(&self, topic: &str, audience: &str, content_type: &str) -> Result<ContentDraft, StepFailure> {
        info!("Creating {} about {} for {}", content_type, topic, audience);
        let outcome = self.executor.run_sequential(&self.steps(topic, audience, content_type), &format!("Topic: {}", topic));
        if let Some(failure) = &outcome.error {
            return Err(failure.clone());
        }
        let stage = |step: usize| outcome.output_of(step).unwrap_or_default().to_string();
        Ok(ContentDraft {
            outline: stage(1),
            detailed_content: stage(2),
            final_content: outcome.final_output.clone().unwrap_or_default(),
            history: outcome.history.clone(),
        })
    }
}

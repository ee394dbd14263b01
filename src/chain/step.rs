use std::fmt;
use std::sync::Arc;

use crate::prompt::errors::UnfilledPlaceholders;
use crate::prompt::PromptTemplate;

/// Placeholder a sequential step's template receives the current input through.
pub const INPUT_PLACEHOLDER: &str = "input";

/// A named predicate over a step's raw output.
#[derive(Clone)]
pub struct Validator {
    name: String,
    check: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl Validator {
    pub fn new(name: impl Into<String>, check: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn check(&self, output: &str) -> bool {
        (self.check)(output)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").field("name", &self.name).finish_non_exhaustive()
    }
}

/// One unit of a sequential chain: a template rendered with the current input, and the validators its output must pass.
#[derive(Debug, Clone)]
pub struct Step {
    template: PromptTemplate,
    variables: Vec<(String, String)>,
    validators: Vec<Validator>,
}

impl Step {
    /// Create a step from a template string. The current input is filled into `{{input}}`.
    pub fn new(template: impl Into<String>) -> Self {
        Self::from_template(PromptTemplate::new(template))
    }

    pub fn from_template(template: PromptTemplate) -> Self {
        Self {
            template,
            variables: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Fix the value of another placeholder of the template, such as a topic or audience.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }

    pub fn with_validator(mut self, name: impl Into<String>, check: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.validators.push(Validator::new(name, check));
        self
    }

    pub fn with(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Complete the template with the fixed variables and the current input.
    pub fn render(&self, input: &str) -> Result<String, UnfilledPlaceholders> {
        let mut values: Vec<(&str, &str)> = self.variables.iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        values.push((INPUT_PLACEHOLDER, input));
        self.template.render(&values)
    }
}

#[cfg(test)]
mod test_step {
    use super::Step;

    #[test]
    fn test_render_and_validators() {
        let step = Step::new("Summarize: {{input}}")
            .with_validator("non_empty", |s| !s.trim().is_empty())
            .with_validator("short", |s| s.len() < 10);
        assert_eq!(step.render("report").unwrap(), "Summarize: report");
        let names: Vec<&str> = step.validators().iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["non_empty", "short"]);
        assert!(step.validators()[0].check("x"));
        assert!(!step.validators()[1].check("this is far too long"));
    }

    #[test]
    fn test_render_fails_on_foreign_placeholder() {
        let step = Step::new("Write for {{audience}}: {{input}}");
        let err = step.render("x").unwrap_err();
        assert_eq!(err.unfilled_placeholders, vec!["audience".to_string()]);
    }

    #[test]
    fn test_variables() {
        let step = Step::new("Write for {{audience}}: {{input}}").with_variable("audience", "{{input}} fans");
        assert_eq!(step.render("rust").unwrap(), "Write for {{input}} fans: rust");
    }
}

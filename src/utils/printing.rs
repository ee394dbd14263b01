//! Markdown reports of chain outcomes, rendered to the terminal with termimad.

use termimad::MadSkin;

use crate::chain::{ChainOutcome, ParallelOutcome};

/// Renders chain reports with a termimad skin.
pub struct ReportPrinter {
    pub skin: MadSkin,
    /// Outputs longer than this many characters are cut in reports
    pub preview_chars: usize,
}

impl Default for ReportPrinter {
    fn default() -> Self {
        Self {
            skin: MadSkin::default(),
            preview_chars: 400,
        }
    }
}

impl ReportPrinter {
    pub fn print_sequential(&self, outcome: &ChainOutcome) {
        self.skin.print_text(&self.sequential_markdown(outcome));
    }

    pub fn print_parallel(&self, outcome: &ParallelOutcome) {
        self.skin.print_text(&self.parallel_markdown(outcome));
    }

    pub fn sequential_markdown(&self, outcome: &ChainOutcome) -> String {
        let status = if outcome.success { "succeeded" } else { "failed" };
        let rows: String = outcome.results.iter()
            .map(|result| {
                let validations = result.validations.iter()
                    .map(|v| format!("{} {}", v.validator, if v.passed { "✓" } else { "✗" }))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("|{}|{}|{:.3}|{}|{}|\n", result.step, result.retry_count, result.execution_time.as_secs_f64(),
                        result.output_length, validations)
            })
            .collect();
        let ending = match (&outcome.final_output, &outcome.error) {
            (Some(output), _) => format!("## Final output\n\n{}\n", self.preview(output)),
            (None, Some(failure)) => format!("## Error\n\n{}\n", failure),
            (None, None) => String::new(),
        };
        format!("# Sequential chain {}\n\n|step|retries|time (s)|length|validations|\n|-:|-:|-:|-:|:-|\n{}\n\
                 Total time: **{:.3}s**, average step: **{:.3}s**\n\n{}",
                status,
                rows,
                outcome.metrics.total_execution_time.as_secs_f64(),
                outcome.metrics.average_step_time.as_secs_f64(),
                ending)
    }

    pub fn parallel_markdown(&self, outcome: &ParallelOutcome) -> String {
        let rows: String = outcome.tasks.values()
            .map(|task| {
                let status = if task.success { "ok" } else { "failed" };
                format!("|{}|{}|{:.3}|{}|\n", task.name, status, task.execution_time.as_secs_f64(), task.output_length)
            })
            .collect();
        let sections: String = outcome.tasks.values()
            .map(|task| format!("## {}\n\n{}\n\n", task.name, self.preview(&task.result)))
            .collect();
        format!("# Parallel chain: {} succeeded, {} failed\n\n|task|status|time (s)|length|\n|:-|:-|-:|-:|\n{}\n\
                 Wall time: **{:.3}s** on {} workers\n\n{}## Synthesis\n\n{}\n",
                outcome.successful_count,
                outcome.failed_count,
                rows,
                outcome.metrics.total_execution_time.as_secs_f64(),
                outcome.metrics.max_workers_used,
                sections,
                self.preview(&outcome.synthesis.to_string()))
    }

    fn preview(&self, text: &str) -> String {
        match text.char_indices().nth(self.preview_chars) {
            Some((cut, _)) => format!("{}…", &text[..cut]),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod test_printing {
    use std::time::Duration;
    use anyhow::{anyhow, Result};
    use crate::chain::{ChainConfig, ChainExecutor, Step};
    use super::ReportPrinter;

    fn mock(prompt: &str) -> Result<String> {
        if prompt.contains("fail") {
            Err(anyhow!("quota exceeded"))
        } else {
            Ok(format!("OUT:{}", prompt))
        }
    }

    #[test]
    fn test_sequential_markdown() {
        let executor = ChainExecutor::new(&mock, ChainConfig::default().with_max_retries(0).with_base_delay(Duration::ZERO));
        let printer = ReportPrinter { preview_chars: 5, ..ReportPrinter::default() };

        let outcome = executor.run_sequential(&[Step::new("{{input}}").with_validator("any", |_| true)], "abcdef");
        let md = printer.sequential_markdown(&outcome);
        assert!(md.starts_with("# Sequential chain succeeded"));
        assert!(md.contains("|-:|-:|-:|-:|:-|\n|1|0|"));
        assert!(md.contains("any ✓|\n\nTotal time: **"));
        assert!(md.contains("OUT:a…"));

        let outcome = executor.run_sequential(&[Step::new("fail {{input}}")], "x");
        let md = printer.sequential_markdown(&outcome);
        assert!(md.contains("## Error\n\nChain failed at step 1 after 1 attempts"));
    }

    #[test]
    fn test_parallel_markdown() {
        let executor = ChainExecutor::new(&mock, ChainConfig::default());
        let outcome = executor.run_parallel([("ok", "{{document}}"), ("bad", "fail")], "doc", None);
        let md = ReportPrinter::default().parallel_markdown(&outcome);
        assert!(md.starts_with("# Parallel chain: 1 succeeded, 1 failed"));
        assert!(md.contains("|bad|failed|"));
        assert!(md.contains("Error: quota exceeded"));
        assert!(md.contains("|:-|:-|-:|-:|\n|bad|failed|"));
        assert!(md.contains("## ok\n\nOUT:doc\n\n## Synthesis\n\nSynthesis not requested\n"));
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use anyhow::{anyhow, Result};
use promptchain::chain::{ChainConfig, ChainExecutor, Step};
use promptchain::decomposition::{analyze_task_complexity, create_parallel_decomposition};
use promptchain::exemplars::self_consistency::SelfConsistency;
use promptchain::utils::printing::ReportPrinter;
use promptchain::validators::max_words;
use tracing_subscriber::EnvFilter;

/// A stand-in model that fails every third call.
fn flaky_model(calls: &AtomicUsize) -> impl Fn(&str) -> Result<String> + Sync + '_ {
    move |prompt: &str| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % 3 == 0 {
            return Err(anyhow!("simulated outage on call {}", call));
        }
        let words: Vec<&str> = prompt.split_whitespace().rev().take(12).collect();
        Ok(format!("Reply {}: {}. Final answer: {}", call, words.join(" "), call % 2))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promptchain=debug")))
        .init();

    let calls = AtomicUsize::new(0);
    let model = flaky_model(&calls);
    let executor = ChainExecutor::new(&model, ChainConfig::default().with_max_workers(2));
    let printer = ReportPrinter::default();

    let steps = [
        Step::new("Restate: {{input}}").with(max_words(40)),
        Step::new("Shorten: {{input}}"),
        Step::new("Conclude: {{input}}"),
    ];
    printer.print_sequential(&executor.run_sequential(&steps, "prompt chains retry failed steps with backoff"));

    let outcome = executor.run_parallel(
        [("first", "Read {{document}}"), ("second", "Reread {{document}}"), ("third", "Skim {{document}}")],
        "a short memo",
        Some("Merge:\n{{analysis_results}}"),
    );
    printer.print_parallel(&outcome);

    let objective = "Research two vendors in parallel, then plan the migration";
    println!("{}", serde_json::to_string_pretty(&analyze_task_complexity(objective))?);
    let mut decomposer = create_parallel_decomposition(&["Assess vendor A", "Assess vendor B"], Some("Pick one"));
    let decomposed = executor.run_decomposition(&mut decomposer, objective)?;
    println!("Waves: {:?}, blocked: {:?}", decomposed.waves, decomposed.blocked);
    println!("{}", serde_json::to_string_pretty(&decomposed.summary)?);

    let answer = SelfConsistency::new(&model, ChainConfig::default()).with_paths(5).solve("Is the count odd?");
    println!("{}\n{}", answer.vote.vote.analysis, answer.consistency.analysis);
    println!("Generator was called {} times", calls.load(Ordering::SeqCst));
    Ok(())
}

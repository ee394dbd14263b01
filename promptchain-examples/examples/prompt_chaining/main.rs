use std::sync::Arc;
use anyhow::Result;
use log::info;
use promptchain::chain::{ChainConfig, ChainExecutor, Step};
use promptchain::exemplars::adaptive::AdaptiveComplexityChain;
use promptchain::utils::cost::CostTracker;
use promptchain::utils::llm::openai::{GeneratorConfig, OpenAIGenerator};
use promptchain::utils::printing::ReportPrinter;
use promptchain::validators::{bullet_format, max_words};
use tracing_subscriber::EnvFilter;

const DOCUMENT: &str = r#"
Our company plans to migrate its on-premise order management system to a managed cloud platform over the next
18 months. The migration covers 40 services, two relational databases and a message queue. The budget is $2.4M.
The main concerns raised by the board are vendor lock-in, data residency for EU customers and the availability of
engineers familiar with the target platform. Expected benefits are a 30% reduction in operating cost and faster
release cycles."#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promptchain=info,prompt_chaining=info")))
        .init();

    let cost_tracker = Arc::new(CostTracker::new("prompt_chaining"));
    let generator = OpenAIGenerator::from_env(GeneratorConfig::default())?
        .with_system_message("You are a precise business analyst.")
        .with_technique("prompt_chaining")
        .with_cost_tracker(cost_tracker.clone());
    let executor = ChainExecutor::new(&generator, ChainConfig::default());
    let printer = ReportPrinter::default();

    info!("Running sequential analysis");
    let steps = [
        Step::new("Summarize the following document in at most 80 words:\n\n{{input}}\n\nSummary:")
            .with(max_words(100)),
        Step::new("List the key risks in this summary as bullet points starting with \"- \":\n\n{{input}}")
            .with(bullet_format()),
        Step::new("For each risk below, propose one concrete mitigation:\n\n{{input}}"),
    ];
    let outcome = executor.run_sequential(&steps, DOCUMENT);
    printer.print_sequential(&outcome);

    info!("Running parallel analysis");
    let analyses = [
        ("technical", "Assess the technical feasibility of this plan:\n\n{{document}}"),
        ("financial", "Assess the budget and expected savings of this plan:\n\n{{document}}"),
        ("risk", "Identify the three largest risks of this plan:\n\n{{document}}"),
    ];
    let synthesis = "Combine these analyses into an executive recommendation.\n\n{{analysis_results}}\n\nPlan:\n{{original_document}}";
    let outcome = executor.run_parallel(analyses, DOCUMENT, Some(synthesis));
    printer.print_parallel(&outcome);

    let routed = AdaptiveComplexityChain::new(&generator, ChainConfig::default())
        .answer("How should we sequence the migration of 40 services with two shared databases?")?;
    println!("Complexity {} ({:?}):\n{}\n", routed.complexity, routed.route, routed.answer);

    println!("{}", cost_tracker.export_json()?);
    Ok(())
}

//! `intention analyze`: one analysis in-process, result kept in the session.
use std::path::Path;

use anyhow::Context;
use intention_core::parse_repo_input;
use intention_engine::analysis::{PLAN_PREFIX, STAGE_PREFIX};
use intention_engine::{Analyzer, ProgressSink, ResponsesAnalyzer};

use crate::config::AppConfig;
use crate::workbench;

/// Prints progress lines to stdout, rendering stage and plan markers.
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn emit(&self, message: String) {
        println!("{}", render_progress(&message));
    }
}

pub fn render_progress(message: &str) -> String {
    if let Some(stage) = message.strip_prefix(STAGE_PREFIX) {
        return format!("== {stage} ==");
    }
    if let Some(plan) = message.strip_prefix(PLAN_PREFIX) {
        return format!("Plan:\n{plan}");
    }
    message.to_string()
}

pub async fn run(
    config: &AppConfig,
    repo: &str,
    branch: Option<&str>,
    session: &Path,
) -> anyhow::Result<()> {
    let repo_ref = parse_repo_input(repo)?.with_branch(branch);
    let analyzer = ResponsesAnalyzer::new(config.analysis_settings())
        .context("building analysis client")?;

    println!("Analyzing {}", repo_ref.url());
    let gherkin = analyzer.analyze(&repo_ref.url(), &ConsoleSink).await?;

    let mut bench = workbench::open(session)?;
    bench.remember_result(&repo_ref, &gherkin)?;
    println!("\n{gherkin}\n");
    println!(
        "Stored {} feature(s) in {}",
        bench.features().len(),
        session.display()
    );
    Ok(())
}

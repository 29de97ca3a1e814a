//! `intention workbench` subcommands over a file-backed session.
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use intention_core::splice::{JestConverter, StepId};
use intention_core::Workbench;
use intention_engine::{export_tests, export_tests_as, FileSessionStore};
use intention_logging::intention_info;

use crate::cli::WorkbenchAction;

pub fn open(session: &Path) -> anyhow::Result<Workbench<FileSessionStore>> {
    Workbench::open(Arc::new(JestConverter), FileSessionStore::new(session))
        .with_context(|| format!("opening session in {}", session.display()))
}

pub fn run(session: &Path, action: WorkbenchAction, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut bench = open(session)?;
    intention_info!("Workbench {:?} in {:?}", action, session);

    match action {
        WorkbenchAction::Load { file } => {
            let raw = read_text(&file)?;
            let features = bench.load_payload(&raw)?;
            writeln!(out, "Loaded {} feature(s)", features.len())?;
            for (index, stored) in features.iter().enumerate() {
                writeln!(out, "  [{index}] {}", stored.feature_title())?;
            }
        }
        WorkbenchAction::Features => {
            if bench.features().is_empty() {
                writeln!(out, "No features loaded")?;
            }
            for (index, stored) in bench.features().iter().enumerate() {
                let marker = if stored.tests().is_some() { "tests" } else { "-" };
                writeln!(out, "[{index}] {} ({marker})", stored.feature_title())?;
            }
        }
        WorkbenchAction::Edit { index, file } => {
            let text = read_text(&file)?;
            let stored = bench.update_feature(index, text.trim())?;
            writeln!(out, "Updated [{index}] {}", stored.feature_title())?;
        }
        WorkbenchAction::Generate { index } => {
            let code = bench.generate_tests(index)?;
            writeln!(out, "{code}")?;
        }
        WorkbenchAction::Steps { index } => {
            for step in bench.steps(index)? {
                let lock = if step.is_editable() { " " } else { "*" };
                let parent = step
                    .parent
                    .as_ref()
                    .map(|p| format!("  <- {}", p.title))
                    .unwrap_or_default();
                writeln!(out, "{:>4}{lock} {}{parent}", step.id.0, step.label())?;
            }
        }
        WorkbenchAction::Select { index, step } => {
            let selection = bench.select(index, StepId(step))?;
            writeln!(out, "{}", selection.step_text)?;
            if let Some(scenario) = &selection.scenario_text {
                writeln!(out, "\n--- scenario ---\n{scenario}")?;
            }
        }
        WorkbenchAction::Apply { index, step, file } => {
            let edited = read_text(&file)?;
            let report = bench.apply_edit(index, StepId(step), &edited)?;
            writeln!(out, "{}", report.test_code)?;
            if !report.refreshed.is_empty() {
                writeln!(out, "Refreshed features: {:?}", report.refreshed)?;
            }
            for failure in &report.failures {
                writeln!(
                    out,
                    "Feature [{}] {} kept its previous tests: {}",
                    failure.index, failure.title, failure.error
                )?;
            }
        }
        WorkbenchAction::Export { out: target } => {
            let summary = match target {
                Some(path) => {
                    let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
                        bail!("export target {} has no file name", path.display());
                    };
                    let dir = path
                        .parent()
                        .filter(|dir| !dir.as_os_str().is_empty())
                        .unwrap_or(Path::new("."));
                    export_tests_as(dir, filename, bench.features())?
                }
                None => export_tests(session, bench.features())?,
            };
            writeln!(
                out,
                "Exported {} feature(s) to {}",
                summary.feature_count,
                summary.output_path.display()
            )?;
        }
        WorkbenchAction::Clear => {
            bench.clear()?;
            writeln!(out, "Session cleared")?;
        }
    }
    Ok(())
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

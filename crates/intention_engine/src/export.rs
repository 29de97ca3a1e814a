use std::path::{Path, PathBuf};

use intention_core::{aggregate_tests, StoredTest};

use crate::persist::{AtomicFileWriter, PersistError};

pub const TESTS_FILENAME: &str = "generated-tests.spec.ts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Features that contributed a test block.
    pub feature_count: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no feature has generated tests yet")]
    NothingToExport,
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Write the aggregated test code of every feature to
/// `{dir}/generated-tests.spec.ts`.
pub fn export_tests(dir: &Path, tests: &[StoredTest]) -> Result<ExportSummary, ExportError> {
    export_tests_as(dir, TESTS_FILENAME, tests)
}

pub fn export_tests_as(
    dir: &Path,
    filename: &str,
    tests: &[StoredTest],
) -> Result<ExportSummary, ExportError> {
    let feature_count = tests
        .iter()
        .filter(|t| t.tests().is_some_and(|code| !code.trim().is_empty()))
        .count();
    if feature_count == 0 {
        return Err(ExportError::NothingToExport);
    }

    let mut content = aggregate_tests(tests);
    content.push('\n');
    let output_path = AtomicFileWriter::new(dir).write(filename, &content)?;
    Ok(ExportSummary {
        feature_count,
        output_path,
    })
}

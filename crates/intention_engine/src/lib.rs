//! Intention engine: analysis client, job registry and orchestration, and
//! file persistence for workbench sessions.
pub mod analysis;
mod export;
mod orchestrator;
mod persist;
mod registry;
mod session;

pub use analysis::{
    AnalysisError, AnalysisSettings, Analyzer, ProgressSink, ResponsesAnalyzer, Stage,
};
pub use export::{export_tests, export_tests_as, ExportError, ExportSummary, TESTS_FILENAME};
pub use orchestrator::{JobLogSink, Orchestrator};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use registry::{JobError, JobRegistry, RetentionPolicy, SubscriberId, Subscription};
pub use session::{FileSessionStore, SESSION_FILENAME};

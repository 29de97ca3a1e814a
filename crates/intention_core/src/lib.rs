//! Intention core: repository references, job records, Gherkin handling and
//! step-level splicing of generated tests. No IO.
pub mod gherkin;
mod job;
mod repo;
pub mod splice;
mod stored;
mod workbench;

pub use job::{JobEvent, JobId, JobRecord, JobStatus, TransitionError};
pub use repo::{parse_repo_input, InvalidRepoReference, RepoRef, DEFAULT_BRANCH};
pub use stored::{
    aggregate_tests, MemorySessionStore, ResultCache, SessionSnapshot, SessionStore, StoreError,
    StoredTest,
};
pub use workbench::{FeatureFailure, PropagationReport, Workbench, WorkbenchError};

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::gherkin::feature_title;
use crate::repo::RepoRef;

/// One feature of the working session and its generated tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTest {
    feature: String,
    feature_title: String,
    tests: Option<String>,
}

impl StoredTest {
    pub fn new(feature: impl Into<String>) -> Self {
        let feature = feature.into();
        Self {
            feature_title: feature_title(&feature),
            feature,
            tests: None,
        }
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn feature_title(&self) -> &str {
        &self.feature_title
    }

    pub fn tests(&self) -> Option<&str> {
        self.tests.as_deref()
    }

    /// Replace the feature text; the title follows it.
    pub fn set_feature(&mut self, feature: impl Into<String>) {
        self.feature = feature.into();
        self.feature_title = feature_title(&self.feature);
    }

    pub fn set_tests(&mut self, tests: Option<String>) {
        self.tests = tests;
    }
}

/// Last analysis result, so a session can be resumed without re-running it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCache {
    pub repo: String,
    pub branch: String,
    pub gherkin: String,
}

impl ResultCache {
    pub fn new(repo: &RepoRef, gherkin: impl Into<String>) -> Self {
        Self {
            repo: format!("{}/{}", repo.owner, repo.repo),
            branch: repo.branch.clone(),
            gherkin: gherkin.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub gherkin_payload: Option<String>,
    pub tests: Vec<StoredTest>,
    pub last_result: Option<ResultCache>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session data is corrupt: {0}")]
    Corrupt(String),
}

/// Narrow persistence contract for a working session.
pub trait SessionStore {
    /// An empty snapshot when nothing was stored yet.
    fn read_all(&self) -> Result<SessionSnapshot, StoreError>;
    fn write_all(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory store, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<SessionSnapshot>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn read_all(&self) -> Result<SessionSnapshot, StoreError> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }

    fn write_all(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))?;
        *guard = snapshot.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.write_all(&SessionSnapshot::default())
    }
}

impl<S: SessionStore + ?Sized> SessionStore for &S {
    fn read_all(&self) -> Result<SessionSnapshot, StoreError> {
        (**self).read_all()
    }

    fn write_all(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        (**self).write_all(snapshot)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// Generated test blocks of every feature, trimmed and separated by a blank
/// line. Features without tests are skipped.
pub fn aggregate_tests(tests: &[StoredTest]) -> String {
    tests
        .iter()
        .filter_map(StoredTest::tests)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

//! Multi-feature driver for the splice engine over a session store.
use std::sync::Arc;

use crate::gherkin::{sanitize_gherkin, split_features};
use crate::repo::RepoRef;
use crate::splice::{Selection, SpliceEngine, SpliceError, Step, StepId, TestConverter};
use crate::stored::{
    aggregate_tests, ResultCache, SessionSnapshot, SessionStore, StoreError, StoredTest,
};

#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error("feature {0} does not exist")]
    UnknownFeature(usize),
    #[error("feature {0} has no generated tests")]
    NoTests(usize),
    #[error(transparent)]
    Splice(#[from] SpliceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A feature that could not be refreshed after an edit elsewhere.
#[derive(Debug)]
pub struct FeatureFailure {
    pub index: usize,
    pub title: String,
    pub error: SpliceError,
}

/// Outcome of an edit and its propagation to the other features.
#[derive(Debug)]
pub struct PropagationReport {
    pub edited: usize,
    pub test_code: String,
    pub refreshed: Vec<usize>,
    pub failures: Vec<FeatureFailure>,
}

pub struct Workbench<S: SessionStore> {
    converter: Arc<dyn TestConverter>,
    store: S,
    session: SessionSnapshot,
    engines: Vec<Option<SpliceEngine>>,
}

impl<S: SessionStore> Workbench<S> {
    pub fn open(converter: Arc<dyn TestConverter>, store: S) -> Result<Self, WorkbenchError> {
        let session = store.read_all()?;
        let engines = session.tests.iter().map(|_| None).collect();
        Ok(Self {
            converter,
            store,
            session,
            engines,
        })
    }

    pub fn session(&self) -> &SessionSnapshot {
        &self.session
    }

    pub fn features(&self) -> &[StoredTest] {
        &self.session.tests
    }

    /// Replace the session's features with those found in `raw`.
    pub fn load_payload(&mut self, raw: &str) -> Result<&[StoredTest], WorkbenchError> {
        let cleaned = sanitize_gherkin(raw);
        self.session.tests = split_features(&cleaned)
            .into_iter()
            .map(StoredTest::new)
            .collect();
        self.session.gherkin_payload = Some(cleaned);
        self.engines = self.session.tests.iter().map(|_| None).collect();
        self.persist()?;
        Ok(&self.session.tests)
    }

    /// Cache an analysis result and load it as the session payload.
    pub fn remember_result(
        &mut self,
        repo: &RepoRef,
        gherkin: &str,
    ) -> Result<(), WorkbenchError> {
        self.session.last_result = Some(ResultCache::new(repo, gherkin));
        self.load_payload(gherkin)?;
        Ok(())
    }

    /// Edit a feature in place. Its tests are kept and follow the new text
    /// on the next edit or refresh.
    pub fn update_feature(
        &mut self,
        index: usize,
        text: &str,
    ) -> Result<&StoredTest, WorkbenchError> {
        let stored = self
            .session
            .tests
            .get_mut(index)
            .ok_or(WorkbenchError::UnknownFeature(index))?;
        stored.set_feature(text);
        self.engines[index] = None;
        self.persist()?;
        Ok(&self.session.tests[index])
    }

    /// (Re)generate the test code of one feature from its text alone.
    pub fn generate_tests(&mut self, index: usize) -> Result<&str, WorkbenchError> {
        let feature = self.stored(index)?.feature().to_string();
        let engine = SpliceEngine::generate(self.converter.clone(), &feature)?;
        self.session.tests[index].set_tests(Some(engine.test_code().to_string()));
        self.engines[index] = Some(engine);
        self.persist()?;
        Ok(self.session.tests[index].tests().unwrap_or_default())
    }

    pub fn steps(&mut self, index: usize) -> Result<&[Step], WorkbenchError> {
        Ok(self.engine(index)?.steps())
    }

    pub fn select(&mut self, index: usize, step: StepId) -> Result<Selection, WorkbenchError> {
        Ok(self.engine(index)?.select(step)?.clone())
    }

    /// Apply an edit to one step and refresh every other feature that has
    /// tests. A failure in the edited feature aborts before anything is
    /// persisted; failures elsewhere are reported per feature.
    pub fn apply_edit(
        &mut self,
        index: usize,
        step: StepId,
        edited: &str,
    ) -> Result<PropagationReport, WorkbenchError> {
        let engine = self.engine(index)?;
        engine.select(step)?;
        let test_code = engine.apply_edit(edited)?.to_string();
        self.session.tests[index].set_tests(Some(test_code.clone()));

        let mut report = PropagationReport {
            edited: index,
            test_code,
            refreshed: Vec::new(),
            failures: Vec::new(),
        };
        for other in 0..self.session.tests.len() {
            if other == index || self.session.tests[other].tests().is_none() {
                continue;
            }
            match self.refresh_feature(other) {
                Ok(code) => {
                    self.session.tests[other].set_tests(Some(code));
                    report.refreshed.push(other);
                }
                Err(error) => {
                    self.engines[other] = None;
                    report.failures.push(FeatureFailure {
                        index: other,
                        title: self.session.tests[other].feature_title().to_string(),
                        error,
                    });
                }
            }
        }
        self.persist()?;
        Ok(report)
    }

    pub fn aggregate_tests(&self) -> String {
        aggregate_tests(&self.session.tests)
    }

    pub fn clear(&mut self) -> Result<(), WorkbenchError> {
        self.store.clear()?;
        self.session = SessionSnapshot::default();
        self.engines.clear();
        Ok(())
    }

    fn refresh_feature(&mut self, index: usize) -> Result<String, SpliceError> {
        let engine = match self.engines[index].take() {
            Some(engine) => engine,
            None => {
                let stored = &self.session.tests[index];
                SpliceEngine::compile(
                    self.converter.clone(),
                    stored.feature(),
                    stored.tests().unwrap_or_default(),
                )?
            }
        };
        let engine = self.engines[index].insert(engine);
        Ok(engine.refresh()?.to_string())
    }

    fn stored(&self, index: usize) -> Result<&StoredTest, WorkbenchError> {
        self.session
            .tests
            .get(index)
            .ok_or(WorkbenchError::UnknownFeature(index))
    }

    fn engine(&mut self, index: usize) -> Result<&mut SpliceEngine, WorkbenchError> {
        let stored = self
            .session
            .tests
            .get(index)
            .ok_or(WorkbenchError::UnknownFeature(index))?;
        let code = stored.tests().ok_or(WorkbenchError::NoTests(index))?;
        let engine = match self.engines[index].take() {
            Some(engine) => engine,
            None => SpliceEngine::compile(self.converter.clone(), stored.feature(), code)?,
        };
        Ok(self.engines[index].insert(engine))
    }

    fn persist(&self) -> Result<(), WorkbenchError> {
        self.store.write_all(&self.session)?;
        Ok(())
    }
}

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::gherkin::{FeatureDoc, Keyword};

use super::convert::{ConvertError, TestConverter};
use super::step::{remove_blank_lines, step_keys, trim_blank_edges, Step, StepId, StepKey};

#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("step {0} does not exist")]
    UnknownStep(StepId),
    #[error("{keyword} nodes are structural and cannot be edited")]
    NotEditable { keyword: Keyword },
    #[error("no step is selected")]
    NoSelection,
    #[error("step `{label}` under `{parent}` was not found after the edit")]
    StepNotFoundAfterEdit { label: String, parent: String },
}

/// The step chosen for editing, with the text handed to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub step_id: StepId,
    pub range: Range<usize>,
    /// Step source without blank leading or trailing lines.
    pub step_text: String,
    /// Source of the enclosing scenario, for context.
    pub scenario_text: Option<String>,
}

/// Step-level editing state for one feature.
///
/// Holds the feature text, the current test code and the step list derived
/// from it. Step ids survive recompiles as long as keyword, value, parent and
/// occurrence ordinal stay the same.
pub struct SpliceEngine {
    converter: Arc<dyn TestConverter>,
    feature_text: String,
    feature: FeatureDoc,
    test_code: String,
    steps: Vec<Step>,
    selection: Option<Selection>,
    next_id: u32,
}

impl std::fmt::Debug for SpliceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpliceEngine")
            .field("feature", &self.feature.title)
            .field("steps", &self.steps.len())
            .field("selection", &self.selection.as_ref().map(|s| s.step_id))
            .finish_non_exhaustive()
    }
}

impl SpliceEngine {
    /// Generate test code for a feature that has none yet.
    pub fn generate(
        converter: Arc<dyn TestConverter>,
        feature_text: &str,
    ) -> Result<Self, SpliceError> {
        let code = converter.generate(&[], feature_text)?;
        Self::compile(converter, feature_text, &code)
    }

    pub fn compile(
        converter: Arc<dyn TestConverter>,
        feature_text: &str,
        test_code: &str,
    ) -> Result<Self, SpliceError> {
        let feature = converter.parse_feature(feature_text)?;
        let mut engine = Self {
            converter,
            feature_text: feature_text.to_string(),
            feature,
            test_code: String::new(),
            steps: Vec::new(),
            selection: None,
            next_id: 1,
        };
        engine.adopt(test_code.to_string())?;
        Ok(engine)
    }

    pub fn feature(&self) -> &FeatureDoc {
        &self.feature
    }

    pub fn feature_text(&self) -> &str {
        &self.feature_text
    }

    pub fn test_code(&self) -> &str {
        &self.test_code
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn select(&mut self, id: StepId) -> Result<&Selection, SpliceError> {
        let selection = self.selection_for(id)?;
        Ok(self.selection.insert(selection))
    }

    /// Replace the selected step's source with `edited` and regenerate.
    ///
    /// On error the engine is left exactly as it was.
    pub fn apply_edit(&mut self, edited: &str) -> Result<&str, SpliceError> {
        let selection = self.selection.clone().ok_or(SpliceError::NoSelection)?;
        let position = self
            .position(selection.step_id)
            .ok_or(SpliceError::UnknownStep(selection.step_id))?;
        let range = self.steps[position].range.clone();

        let cleaned = remove_blank_lines(edited);
        let mut rebuilt =
            String::with_capacity(self.test_code.len() - range.len() + cleaned.len());
        rebuilt.push_str(&self.test_code[..range.start]);
        rebuilt.push_str(&cleaned);
        rebuilt.push_str(&self.test_code[range.end..]);

        let fresh = self.converter.compile_steps(&rebuilt)?;
        let target = step_keys(&self.steps).swap_remove(position);
        let matched = step_keys(&fresh)
            .into_iter()
            .position(|key| key == target)
            .map(|i| &fresh[i])
            .ok_or_else(|| {
                let original = &self.steps[position];
                SpliceError::StepNotFoundAfterEdit {
                    label: original.label(),
                    parent: original
                        .parent
                        .as_ref()
                        .map(|p| p.title.clone())
                        .unwrap_or_default(),
                }
            })?;

        let mut merged = self.steps.clone();
        merged[position].fragments = matched.fragments.clone();
        let regenerated = self.converter.generate(&merged, &self.feature_text)?;
        self.replace_code(regenerated)?;
        self.reselect(selection.step_id);
        Ok(&self.test_code)
    }

    /// Recompile the current code and regenerate it against the current
    /// feature text, without an edit.
    pub fn refresh(&mut self) -> Result<&str, SpliceError> {
        let fresh = self.converter.compile_steps(&self.test_code)?;
        let fresh_by_key: HashMap<StepKey, &Step> =
            step_keys(&fresh).into_iter().zip(fresh.iter()).collect();

        let mut merged = self.steps.clone();
        for (step, key) in merged.iter_mut().zip(step_keys(&self.steps)) {
            if let Some(found) = fresh_by_key.get(&key) {
                step.fragments = found.fragments.clone();
            }
        }
        let regenerated = self.converter.generate(&merged, &self.feature_text)?;
        self.replace_code(regenerated)?;
        if let Some(id) = self.selection.as_ref().map(|s| s.step_id) {
            self.reselect(id);
        }
        Ok(&self.test_code)
    }

    /// Swap in new feature text; call [`SpliceEngine::refresh`] to carry the
    /// existing step bodies over to it.
    pub fn set_feature_text(&mut self, feature_text: &str) -> Result<(), SpliceError> {
        self.feature = self.converter.parse_feature(feature_text)?;
        self.feature_text = feature_text.to_string();
        Ok(())
    }

    fn selection_for(&self, id: StepId) -> Result<Selection, SpliceError> {
        let step = self.step(id).ok_or(SpliceError::UnknownStep(id))?;
        if !step.is_editable() {
            return Err(SpliceError::NotEditable {
                keyword: step.keyword,
            });
        }
        let scenario_text = step
            .parent
            .as_ref()
            .and_then(|p| self.steps.get(p.index))
            .map(|parent| trim_blank_edges(parent.source(&self.test_code)));
        Ok(Selection {
            step_id: id,
            range: step.range.clone(),
            step_text: trim_blank_edges(step.source(&self.test_code)),
            scenario_text,
        })
    }

    fn reselect(&mut self, id: StepId) {
        self.selection = self.selection_for(id).ok();
    }

    fn position(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Compile `code` into a step list, then commit both.
    fn replace_code(&mut self, code: String) -> Result<(), SpliceError> {
        let fresh = self.converter.compile_steps(&code)?;
        let (steps, next_id) = thread_ids(&self.steps, fresh, self.next_id);
        self.steps = steps;
        self.next_id = next_id;
        self.test_code = code;
        Ok(())
    }

    fn adopt(&mut self, code: String) -> Result<(), SpliceError> {
        self.replace_code(code)?;
        self.selection = None;
        Ok(())
    }
}

/// Carry ids from `previous` onto `fresh` by step key; new steps get fresh ids.
fn thread_ids(previous: &[Step], mut fresh: Vec<Step>, mut next_id: u32) -> (Vec<Step>, u32) {
    let known: HashMap<StepKey, StepId> = step_keys(previous)
        .into_iter()
        .zip(previous.iter().map(|s| s.id))
        .collect();
    let keys = step_keys(&fresh);
    for (step, key) in fresh.iter_mut().zip(keys) {
        step.id = match known.get(&key) {
            Some(id) => *id,
            None => {
                let id = StepId(next_id);
                next_id += 1;
                id
            }
        };
    }
    (fresh, next_id)
}

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::gherkin::Keyword;

/// Synthetic step identifier, stable across edits of the same feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u32);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Back-reference from a step to the structural node enclosing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    /// `Scenario Outline: <name>` or `Feature: <name>`.
    pub title: String,
    /// Position of the parent node in the same step list.
    pub index: usize,
}

/// Source pieces that travel with a step between test-code generations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepFragments {
    /// Step body, dedented to the marker column.
    pub statement: String,
    /// Import lines whose bindings the statement uses.
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: StepId,
    pub keyword: Keyword,
    pub value: String,
    pub parent: Option<ParentRef>,
    /// Byte offsets into the test code this step was compiled from.
    pub range: Range<usize>,
    pub fragments: StepFragments,
}

impl Step {
    pub fn is_editable(&self) -> bool {
        !self.keyword.is_structural()
    }

    pub fn source<'a>(&self, code: &'a str) -> &'a str {
        code.get(self.range.clone()).unwrap_or_default()
    }

    pub fn identity(&self) -> StepIdentity {
        StepIdentity {
            keyword: self.keyword,
            value: self.value.clone(),
            parent: self.parent.as_ref().map(|p| p.title.clone()),
        }
    }

    /// Display form, e.g. `Given a user <name>`.
    pub fn label(&self) -> String {
        if self.value.is_empty() {
            self.keyword.label().to_string()
        } else {
            format!("{} {}", self.keyword.label(), self.value)
        }
    }
}

/// Content identity of a step: keyword, value and parent title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepIdentity {
    pub keyword: Keyword,
    pub value: String,
    pub parent: Option<String>,
}

/// Identity plus the occurrence ordinal among steps sharing that identity,
/// which keeps repeated identical steps apart.
pub(crate) type StepKey = (StepIdentity, usize);

pub(crate) fn step_keys(steps: &[Step]) -> Vec<StepKey> {
    let mut seen: HashMap<StepIdentity, usize> = HashMap::new();
    steps
        .iter()
        .map(|step| {
            let identity = step.identity();
            let counter = seen.entry(identity.clone()).or_insert(0);
            let ordinal = *counter;
            *counter += 1;
            (identity, ordinal)
        })
        .collect()
}

/// Drop whitespace-only lines at either end, keeping interior blank lines.
pub fn trim_blank_edges(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}

/// Drop every whitespace-only line.
pub fn remove_blank_lines(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

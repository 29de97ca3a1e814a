use super::keyword::Keyword;
use super::text::feature_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDoc {
    pub title: String,
    pub tags: Vec<String>,
    pub scenarios: Vec<ScenarioDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioDoc {
    /// One of `Background`, `Scenario`, `ScenarioOutline`.
    pub kind: Keyword,
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<StepDoc>,
    pub examples: Option<ExamplesTable>,
    pub line: usize,
}

impl ScenarioDoc {
    /// `Scenario Outline: <name>`, the form used as a parent reference.
    pub fn title(&self) -> String {
        scenario_title(self.kind, &self.name)
    }
}

pub fn scenario_title(kind: Keyword, name: &str) -> String {
    if name.is_empty() {
        kind.label().to_string()
    } else {
        format!("{}: {}", kind.label(), name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDoc {
    pub keyword: Keyword,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExamplesTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no `Feature:` line found")]
    MissingFeature,
    #[error("line {line}: a second `Feature:` in one document")]
    MultipleFeatures { line: usize },
    #[error("line {line}: step or table outside of a scenario")]
    OutsideScenario { line: usize },
    #[error("line {line}: examples row has {found} cells, header has {expected}")]
    RaggedTableRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: doc string is never closed")]
    UnterminatedDocString { line: usize },
}

#[derive(Default)]
struct TableCursor {
    active: bool,
    expecting_header: bool,
}

/// Parse a single-feature Gherkin document.
pub fn parse_feature(src: &str) -> Result<FeatureDoc, ParseError> {
    let mut doc: Option<FeatureDoc> = None;
    let mut pending_tags: Vec<String> = Vec::new();
    let mut table = TableCursor::default();
    let mut doc_string: Option<(&'static str, usize)> = None;

    for (idx, raw) in src.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if let Some((delimiter, _)) = doc_string {
            if line.starts_with(delimiter) {
                doc_string = None;
            }
            continue;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(delimiter) = ["\"\"\"", "```"].into_iter().find(|d| line.starts_with(d)) {
            doc_string = Some((delimiter, line_no));
            continue;
        }
        if line.starts_with('@') {
            pending_tags.extend(collect_tags(line));
            continue;
        }

        if let Some(name) = feature_name(line) {
            if doc.is_some() {
                return Err(ParseError::MultipleFeatures { line: line_no });
            }
            let (title, inline_tags) = split_trailing_tags(name);
            let mut tags = std::mem::take(&mut pending_tags);
            tags.extend(inline_tags);
            doc = Some(FeatureDoc {
                title,
                tags,
                scenarios: Vec::new(),
            });
            continue;
        }

        if let Some((kind, name)) = scenario_header(line) {
            let feature = doc.as_mut().ok_or(ParseError::MissingFeature)?;
            let (name, inline_tags) = split_trailing_tags(name);
            let mut tags = std::mem::take(&mut pending_tags);
            tags.extend(inline_tags);
            feature.scenarios.push(ScenarioDoc {
                kind,
                name,
                tags,
                steps: Vec::new(),
                examples: None,
                line: line_no,
            });
            table = TableCursor::default();
            continue;
        }

        if is_examples_header(line) {
            current_scenario(&mut doc, line_no)?;
            pending_tags.clear();
            table = TableCursor {
                active: true,
                expecting_header: true,
            };
            continue;
        }

        if line.starts_with('|') {
            let scenario = current_scenario(&mut doc, line_no)?;
            if !table.active {
                // Step data table; not part of the feature model.
                continue;
            }
            let cells = split_row(line);
            let examples = scenario.examples.get_or_insert_with(ExamplesTable::default);
            if table.expecting_header {
                table.expecting_header = false;
                if examples.header.is_empty() {
                    examples.header = cells;
                    continue;
                }
                if examples.header == cells {
                    continue;
                }
            }
            if cells.len() != examples.header.len() {
                return Err(ParseError::RaggedTableRow {
                    line: line_no,
                    expected: examples.header.len(),
                    found: cells.len(),
                });
            }
            examples.rows.push(cells);
            continue;
        }

        if let Some((keyword, text)) = step_line(line) {
            let scenario = current_scenario(&mut doc, line_no)?;
            scenario.steps.push(StepDoc {
                keyword,
                text: text.to_string(),
                line: line_no,
            });
            table.active = false;
            continue;
        }

        // Free-form description text and `Rule:` headers carry no structure.
    }

    if let Some((_, line)) = doc_string {
        return Err(ParseError::UnterminatedDocString { line });
    }
    doc.ok_or(ParseError::MissingFeature)
}

fn current_scenario(
    doc: &mut Option<FeatureDoc>,
    line: usize,
) -> Result<&mut ScenarioDoc, ParseError> {
    doc.as_mut()
        .ok_or(ParseError::MissingFeature)?
        .scenarios
        .last_mut()
        .ok_or(ParseError::OutsideScenario { line })
}

fn scenario_header(line: &str) -> Option<(Keyword, &str)> {
    let (label, rest) = line.split_once(':')?;
    let keyword = Keyword::from_header(label.trim())?;
    if keyword == Keyword::Feature {
        return None;
    }
    Some((keyword, rest.trim()))
}

fn is_examples_header(line: &str) -> bool {
    line.split_once(':')
        .map(|(label, _)| matches!(label.trim(), "Examples" | "Scenarios"))
        .unwrap_or(false)
}

fn step_line(line: &str) -> Option<(Keyword, &str)> {
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    Keyword::from_step_word(word).map(|kw| (kw, rest))
}

fn collect_tags(line: &str) -> impl Iterator<Item = String> + '_ {
    line.split_whitespace()
        .filter(|t| t.starts_with('@'))
        .map(str::to_string)
}

/// `End-to-End Summary @e2e @summary` -> (`End-to-End Summary`, [`@e2e`, `@summary`]).
fn split_trailing_tags(name: &str) -> (String, Vec<String>) {
    let words: Vec<&str> = name.split_whitespace().collect();
    let mut split_at = words.len();
    while split_at > 0 && words[split_at - 1].starts_with('@') {
        split_at -= 1;
    }
    let title = words[..split_at].join(" ");
    let tags = words[split_at..].iter().map(|t| t.to_string()).collect();
    (title, tags)
}

/// Cells of a `| a | b |` row; `\|` escapes a literal pipe.
pub(crate) fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Names of `<placeholder>` references in step text.
pub fn placeholders(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) => {
                let name = &after[..close];
                if !name.is_empty() && !name.contains('<') && !name.contains(char::is_whitespace) {
                    found.push(name);
                    rest = &after[close + 1..];
                } else {
                    rest = after;
                }
            }
            None => break,
        }
    }
    found
}

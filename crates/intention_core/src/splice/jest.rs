//! Built-in converter for a fixed Jest layout.
//!
//! Every feature becomes a `describe('Feature: ...')` block, every scenario a
//! nested `describe` holding a single `it` (or `it.each` over the examples
//! table). Steps are delimited by `// <Keyword> <text>` marker comments; a
//! step's body is everything up to the next marker or block boundary.
use std::collections::HashMap;
use std::fmt::Write as _;

use serde_json::{Map, Value};

use crate::gherkin::{scenario_title, ExamplesTable, FeatureDoc, Keyword};

use super::convert::{ConvertError, TestConverter};
use super::step::{ParentRef, Step, StepFragments, StepId};

const OUTLINE_STUB: &str = "expect(example).toBeDefined();";
const SCENARIO_STUB: &str = "expect(true).toBe(true);";
const STEP_INDENT: &str = "      ";

#[derive(Debug, Default, Clone, Copy)]
pub struct JestConverter;

impl TestConverter for JestConverter {
    fn compile_steps(&self, test_code: &str) -> Result<Vec<Step>, ConvertError> {
        compile(test_code)
    }

    fn generate(&self, known_steps: &[Step], feature_text: &str) -> Result<String, ConvertError> {
        let doc = self.parse_feature(feature_text)?;
        Ok(render(&doc, known_steps))
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

fn render(doc: &FeatureDoc, known: &[Step]) -> String {
    let lookup = KnownSteps::new(known);
    let mut imports: Vec<String> = Vec::new();
    let mut body = String::new();

    let feature = scenario_title(Keyword::Feature, &doc.title);
    let _ = writeln!(body, "describe({}, () => {{", js_string(&feature));

    let mut ordinals: HashMap<(Keyword, &str, String), usize> = HashMap::new();
    for (i, scenario) in doc.scenarios.iter().enumerate() {
        if i > 0 {
            body.push('\n');
        }
        let title = scenario.title();
        let _ = writeln!(body, "  describe({}, () => {{", js_string(&title));

        let table = scenario.examples.as_ref().filter(|t| !t.header.is_empty());
        let test_name = if scenario.name.is_empty() {
            scenario.kind.label()
        } else {
            scenario.name.as_str()
        };
        match table {
            Some(table) => {
                write_examples(&mut body, table);
                let _ = writeln!(
                    body,
                    "    it.each(examples)({}, async (example) => {{",
                    js_string(test_name)
                );
            }
            None => {
                let _ = writeln!(body, "    it({}, async () => {{", js_string(test_name));
            }
        }
        let stub = if table.is_some() {
            OUTLINE_STUB
        } else {
            SCENARIO_STUB
        };

        for (j, step) in scenario.steps.iter().enumerate() {
            if j > 0 {
                body.push('\n');
            }
            let _ = writeln!(body, "{STEP_INDENT}{}", marker(step.keyword, &step.text));

            let counter = ordinals
                .entry((step.keyword, step.text.as_str(), title.clone()))
                .or_insert(0);
            let fragments = lookup.find(step.keyword, &step.text, &title, *counter);
            *counter += 1;

            let statement = fragments
                .map(|f| f.statement.as_str())
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(stub);
            for line in statement.lines() {
                if line.trim().is_empty() {
                    body.push('\n');
                } else {
                    let _ = writeln!(body, "{STEP_INDENT}{line}");
                }
            }
            for import in fragments.map(|f| f.imports.as_slice()).unwrap_or_default() {
                if !imports.contains(import) {
                    imports.push(import.clone());
                }
            }
        }

        body.push_str("    });\n");
        body.push_str("  });\n");
    }
    body.push_str("});\n");

    if imports.is_empty() {
        body
    } else {
        format!("{}\n\n{body}", imports.join("\n"))
    }
}

fn write_examples(body: &mut String, table: &ExamplesTable) {
    body.push_str("    const examples = [\n");
    for row in &table.rows {
        let object: Map<String, Value> = table
            .header
            .iter()
            .zip(row)
            .map(|(column, cell)| {
                let value =
                    serde_json::from_str(cell).unwrap_or_else(|_| Value::String(cell.clone()));
                (column.clone(), value)
            })
            .collect();
        let _ = writeln!(body, "      {},", Value::Object(object));
    }
    body.push_str("    ];\n\n");
}

fn marker(keyword: Keyword, text: &str) -> String {
    if text.is_empty() {
        format!("// {}", keyword.label())
    } else {
        format!("// {} {}", keyword.label(), text)
    }
}

fn js_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Fragment lookup over the previous step list: exact identity and
/// ordinal first, then keyword and text, then text alone.
struct KnownSteps<'a> {
    steps: &'a [Step],
}

impl<'a> KnownSteps<'a> {
    fn new(steps: &'a [Step]) -> Self {
        Self { steps }
    }

    fn find(
        &self,
        keyword: Keyword,
        text: &str,
        parent: &str,
        ordinal: usize,
    ) -> Option<&'a StepFragments> {
        let editable = || self.steps.iter().filter(|s| s.is_editable());
        let same_parent = |s: &&Step| s.parent.as_ref().is_some_and(|p| p.title == parent);

        editable()
            .filter(|s| s.keyword == keyword && s.value == text)
            .filter(same_parent)
            .nth(ordinal)
            .or_else(|| {
                editable()
                    .filter(|s| s.keyword == keyword && s.value == text)
                    .find(same_parent)
            })
            .or_else(|| editable().find(|s| s.keyword == keyword && s.value == text))
            .or_else(|| editable().find(|s| s.value == text))
            .map(|s| &s.fragments)
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

struct Line<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

struct Import {
    text: String,
    bindings: Vec<String>,
}

fn split_lines(code: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    let mut lines = Vec::new();
    for raw in code.split_inclusive('\n') {
        let text = raw.trim_end_matches(['\n', '\r']);
        lines.push(Line {
            start: offset,
            end: offset + text.len(),
            text,
        });
        offset += raw.len();
    }
    lines
}

fn compile(code: &str) -> Result<Vec<Step>, ConvertError> {
    let lines = split_lines(code);
    let imports: Vec<Import> = lines
        .iter()
        .filter(|l| l.text.trim_start().starts_with("import "))
        .map(|l| Import {
            text: l.text.trim().to_string(),
            bindings: import_bindings(l.text),
        })
        .collect();
    let content_end = lines
        .iter()
        .rev()
        .find(|l| !l.text.trim().is_empty())
        .map_or(0, |l| l.end);

    let mut steps: Vec<Step> = Vec::new();
    let mut feature: Option<usize> = None;
    // (index in `steps`, line index of the closing `})`)
    let mut scenario: Option<(usize, usize)> = None;
    // Line index of the `})` closing the current `it`/`test` block.
    let mut test_close: Option<usize> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let trimmed = line.text.trim();

        if let Some(label) = describe_label(trimmed) {
            let (keyword, value) =
                structural_label(&label).ok_or_else(|| ConvertError::TestCode {
                    line: i + 1,
                    message: format!("unrecognised describe block `{label}`"),
                })?;
            let close = closing_line(&lines, i);
            let end = close.map_or(content_end, |c| lines[c].end);
            let index = steps.len();
            let parent = match keyword {
                Keyword::Feature => {
                    feature = Some(index);
                    None
                }
                _ => {
                    scenario = Some((index, close.unwrap_or(lines.len())));
                    feature.map(|f| parent_ref(&steps, f))
                }
            };
            steps.push(Step {
                id: StepId(index as u32 + 1),
                keyword,
                value,
                parent,
                range: line.start..end,
                fragments: StepFragments::default(),
            });
            i += 1;
            continue;
        }

        if is_test_opener(trimmed) {
            test_close = closing_line(&lines, i);
            i += 1;
            continue;
        }

        if let Some((keyword, value)) = step_marker(trimmed) {
            if scenario.is_some_and(|(_, close)| close < i) {
                scenario = None;
            }
            let marker_indent = indent_of(line.text);
            let mut last = i;
            let mut j = i + 1;
            while j < lines.len()
                && Some(j) != test_close
                && !ends_step_body(lines[j].text, marker_indent.len())
            {
                if !lines[j].text.trim().is_empty() {
                    last = j;
                }
                j += 1;
            }

            let statement = lines[i + 1..=last]
                .iter()
                .map(|l| dedent(l.text, marker_indent))
                .collect::<Vec<_>>()
                .join("\n");
            let used_imports = imports
                .iter()
                .filter(|imp| imp.bindings.iter().any(|b| mentions(&statement, b)))
                .map(|imp| imp.text.clone())
                .collect();
            let parent = scenario
                .map(|(index, _)| index)
                .or(feature)
                .map(|index| parent_ref(&steps, index));

            let index = steps.len();
            steps.push(Step {
                id: StepId(index as u32 + 1),
                keyword,
                value: value.to_string(),
                parent,
                range: line.start..lines[last].end,
                fragments: StepFragments {
                    statement,
                    imports: used_imports,
                },
            });
            i = j;
            continue;
        }

        i += 1;
    }
    Ok(steps)
}

fn parent_ref(steps: &[Step], index: usize) -> ParentRef {
    let node = &steps[index];
    ParentRef {
        title: scenario_title(node.keyword, &node.value),
        index,
    }
}

fn indent_of(text: &str) -> &str {
    &text[..text.len() - text.trim_start().len()]
}

fn dedent<'a>(text: &'a str, prefix: &str) -> &'a str {
    if text.trim().is_empty() {
        ""
    } else {
        text.strip_prefix(prefix).unwrap_or_else(|| text.trim_start())
    }
}

fn ends_step_body(text: &str, marker_indent: usize) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    step_marker(trimmed).is_some()
        || trimmed.starts_with("describe(")
        || is_test_opener(trimmed)
        || (trimmed.starts_with("})") && indent_of(text).len() < marker_indent)
}

fn is_test_opener(trimmed: &str) -> bool {
    ["it(", "it.each(", "test(", "test.each("]
        .iter()
        .any(|p| trimmed.starts_with(p))
}

/// Line index of the `})` closing the block opened at `open`, matched by
/// indentation.
fn closing_line(lines: &[Line<'_>], open: usize) -> Option<usize> {
    let indent = indent_of(lines[open].text);
    lines
        .iter()
        .enumerate()
        .skip(open + 1)
        .find(|(_, l)| indent_of(l.text) == indent && l.text.trim_start().starts_with("})"))
        .map(|(j, _)| j)
}

fn step_marker(trimmed: &str) -> Option<(Keyword, &str)> {
    let comment = trimmed.strip_prefix("//")?.trim_start();
    let (word, rest) = comment
        .split_once(char::is_whitespace)
        .unwrap_or((comment, ""));
    Keyword::STEP_WORDS
        .into_iter()
        .find(|kw| kw.label() == word)
        .map(|kw| (kw, rest.trim()))
}

fn describe_label(trimmed: &str) -> Option<String> {
    js_string_literal(trimmed.strip_prefix("describe(")?)
}

fn structural_label(label: &str) -> Option<(Keyword, String)> {
    let (head, name) = label.split_once(':').unwrap_or((label, ""));
    let keyword = Keyword::from_header(head.trim())?;
    Some((keyword, name.trim().to_string()))
}

/// Leading single, double or backtick quoted literal, unescaped.
fn js_string_literal(src: &str) -> Option<String> {
    let mut chars = src.chars();
    let quote = chars.next().filter(|c| matches!(c, '\'' | '"' | '`'))?;
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            c if c == quote => return Some(out),
            c => out.push(c),
        }
    }
    None
}

/// Local names bound by a single-line ES import.
fn import_bindings(line: &str) -> Vec<String> {
    let Some(rest) = line.trim().strip_prefix("import") else {
        return Vec::new();
    };
    let Some((clause, _)) = rest.split_once(" from ") else {
        return Vec::new();
    };
    let clause = clause.trim();
    let clause = clause.strip_prefix("type ").unwrap_or(clause);

    let (plain, braced) = match clause.find('{') {
        Some(open) => (
            &clause[..open],
            clause[open + 1..].split('}').next().unwrap_or_default(),
        ),
        None => (clause, ""),
    };

    let mut names = Vec::new();
    for part in plain.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.strip_prefix('*') {
            Some(ns) => {
                if let Some(name) = ns.trim().strip_prefix("as") {
                    names.push(name.trim().to_string());
                }
            }
            None => names.push(part.to_string()),
        }
    }
    for spec in braced.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let local = spec.rsplit(" as ").next().unwrap_or(spec).trim();
        let local = local.strip_prefix("type ").unwrap_or(local);
        names.push(local.to_string());
    }
    names
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn mentions(code: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    code.match_indices(name).any(|(pos, _)| {
        let before = code[..pos].chars().next_back();
        let after = code[pos + name.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn import_bindings_cover_common_forms() {
        assert_eq!(import_bindings("import fs from 'fs';"), vec!["fs"]);
        assert_eq!(
            import_bindings("import { parse, format as fmt } from '../src/date';"),
            vec!["parse", "fmt"]
        );
        assert_eq!(import_bindings("import * as path from 'path';"), vec!["path"]);
        assert_eq!(
            import_bindings("import React, { useState } from 'react';"),
            vec!["React", "useState"]
        );
        assert!(import_bindings("import './setup';").is_empty());
    }

    #[test]
    fn mentions_respects_identifier_boundaries() {
        assert!(mentions("const x = parse(input);", "parse"));
        assert!(!mentions("const x = parseAll(input);", "parse"));
        assert!(!mentions("reparse()", "parse"));
    }

    #[test]
    fn js_literals_round_trip_through_quoting() {
        let quoted = js_string("it's a \\ test");
        assert_eq!(js_string_literal(&quoted).as_deref(), Some("it's a \\ test"));
    }

    #[test]
    fn markers_require_a_step_keyword() {
        assert_eq!(
            step_marker("// Given a user <name>"),
            Some((Keyword::Given, "a user <name>"))
        );
        assert_eq!(step_marker("// Givens matter"), None);
        assert_eq!(step_marker("// plain comment"), None);
    }
}

use std::fmt;

use super::keyword::Keyword;
use super::parse::{parse_feature, placeholders, FeatureDoc, ParseError, ScenarioDoc};
use super::text::{sanitize_gherkin, split_features};

/// A departure from the outline-plus-examples convention the generated
/// Gherkin must follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConventionIssue {
    NotAnOutline {
        scenario: String,
    },
    MissingExamples {
        scenario: String,
    },
    EmptyExamples {
        scenario: String,
    },
    InlineLiteral {
        scenario: String,
        step: String,
    },
    UnknownPlaceholder {
        scenario: String,
        step: String,
        placeholder: String,
    },
}

impl fmt::Display for ConventionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConventionIssue::NotAnOutline { scenario } => {
                write!(f, "{scenario}: not a Scenario Outline")
            }
            ConventionIssue::MissingExamples { scenario } => {
                write!(f, "{scenario}: no Examples table")
            }
            ConventionIssue::EmptyExamples { scenario } => {
                write!(f, "{scenario}: Examples table has no rows")
            }
            ConventionIssue::InlineLiteral { scenario, step } => {
                write!(f, "{scenario}: inline value in step `{step}`")
            }
            ConventionIssue::UnknownPlaceholder {
                scenario,
                step,
                placeholder,
            } => write!(
                f,
                "{scenario}: step `{step}` references unknown column <{placeholder}>"
            ),
        }
    }
}

pub fn check_conventions(doc: &FeatureDoc) -> Vec<ConventionIssue> {
    doc.scenarios
        .iter()
        .filter(|s| s.kind != Keyword::Background)
        .flat_map(check_scenario)
        .collect()
}

/// Sanitize, split and check every feature of a generated document.
pub fn check_document(src: &str) -> Result<Vec<ConventionIssue>, ParseError> {
    let cleaned = sanitize_gherkin(src);
    let mut issues = Vec::new();
    for feature in split_features(&cleaned) {
        issues.extend(check_conventions(&parse_feature(&feature)?));
    }
    Ok(issues)
}

fn check_scenario(scenario: &ScenarioDoc) -> Vec<ConventionIssue> {
    let title = scenario.title();
    let mut issues = Vec::new();

    if scenario.kind != Keyword::ScenarioOutline {
        issues.push(ConventionIssue::NotAnOutline {
            scenario: title.clone(),
        });
    }
    let columns: &[String] = match &scenario.examples {
        None => {
            issues.push(ConventionIssue::MissingExamples {
                scenario: title.clone(),
            });
            &[]
        }
        Some(table) => {
            if table.rows.is_empty() {
                issues.push(ConventionIssue::EmptyExamples {
                    scenario: title.clone(),
                });
            }
            &table.header
        }
    };

    for step in &scenario.steps {
        if has_inline_literal(&step.text) {
            issues.push(ConventionIssue::InlineLiteral {
                scenario: title.clone(),
                step: step.text.clone(),
            });
        }
        if scenario.examples.is_none() {
            continue;
        }
        for name in placeholders(&step.text) {
            if !columns.iter().any(|c| c == name) {
                issues.push(ConventionIssue::UnknownPlaceholder {
                    scenario: title.clone(),
                    step: step.text.clone(),
                    placeholder: name.to_string(),
                });
            }
        }
    }
    issues
}

/// Quoted strings or bare numbers outside placeholders.
fn has_inline_literal(text: &str) -> bool {
    let mut stripped = String::with_capacity(text.len());
    let mut rest = text;
    for name in placeholders(text) {
        let token = format!("<{name}>");
        if let Some(pos) = rest.find(&token) {
            stripped.push_str(&rest[..pos]);
            stripped.push(' ');
            rest = &rest[pos + token.len()..];
        }
    }
    stripped.push_str(rest);

    if stripped.matches('"').count() >= 2 {
        return true;
    }
    stripped
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')'))
        .map(|w| w.trim_end_matches(['.', ':', '!', '?']))
        .any(|w| {
            w.trim_start_matches('-').starts_with(|c: char| c.is_ascii_digit())
                && w.parse::<f64>().is_ok()
        })
}

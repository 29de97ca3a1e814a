//! Gherkin text handling: cleanup, feature splitting, parsing and the
//! scenario-outline convention check.
mod conventions;
mod keyword;
mod parse;
mod text;

pub use conventions::{check_conventions, check_document, ConventionIssue};
pub use keyword::Keyword;
pub use parse::{
    parse_feature, placeholders, scenario_title, ExamplesTable, FeatureDoc, ParseError,
    ScenarioDoc, StepDoc,
};
pub use text::{
    check_feature_order, feature_title, sanitize_gherkin, split_features, FeatureOrderReport,
    MANDATED_FEATURES,
};

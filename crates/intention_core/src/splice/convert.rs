use crate::gherkin::{parse_feature, FeatureDoc, ParseError};

use super::step::Step;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("feature text: {0}")]
    Feature(#[from] ParseError),
    #[error("test code line {line}: {message}")]
    TestCode { line: usize, message: String },
}

/// Seam to the Gherkin <-> test-code conversion.
///
/// Implementations derive a flat step list from test code and generate test
/// code from feature text, reusing the fragments of already known steps.
pub trait TestConverter: Send + Sync {
    fn parse_feature(&self, feature_text: &str) -> Result<FeatureDoc, ConvertError> {
        Ok(parse_feature(feature_text)?)
    }

    /// Steps in source order. Ids are positional; callers re-thread them.
    fn compile_steps(&self, test_code: &str) -> Result<Vec<Step>, ConvertError>;

    fn generate(&self, known_steps: &[Step], feature_text: &str) -> Result<String, ConvertError>;
}

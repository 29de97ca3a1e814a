use std::fmt;

use serde::{Deserialize, Serialize};

/// Gherkin keywords, structural nodes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Feature,
    Background,
    Scenario,
    ScenarioOutline,
    Given,
    When,
    Then,
    And,
    But,
}

impl Keyword {
    pub const STEP_WORDS: [Keyword; 5] = [
        Keyword::Given,
        Keyword::When,
        Keyword::Then,
        Keyword::And,
        Keyword::But,
    ];

    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Keyword::Feature | Keyword::Background | Keyword::Scenario | Keyword::ScenarioOutline
        )
    }

    pub fn is_scenario(self) -> bool {
        matches!(
            self,
            Keyword::Background | Keyword::Scenario | Keyword::ScenarioOutline
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Keyword::Feature => "Feature",
            Keyword::Background => "Background",
            Keyword::Scenario => "Scenario",
            Keyword::ScenarioOutline => "Scenario Outline",
            Keyword::Given => "Given",
            Keyword::When => "When",
            Keyword::Then => "Then",
            Keyword::And => "And",
            Keyword::But => "But",
        }
    }

    /// Step keyword for the leading word of a step line.
    pub fn from_step_word(word: &str) -> Option<Keyword> {
        Self::STEP_WORDS
            .into_iter()
            .find(|kw| kw.label() == word)
            .or_else(|| (word == "*").then_some(Keyword::And))
    }

    /// Structural keyword for a `<label>:` header prefix.
    pub fn from_header(label: &str) -> Option<Keyword> {
        match label {
            "Feature" => Some(Keyword::Feature),
            "Background" => Some(Keyword::Background),
            "Scenario" | "Example" => Some(Keyword::Scenario),
            "Scenario Outline" | "Scenario Template" => Some(Keyword::ScenarioOutline),
            _ => None,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

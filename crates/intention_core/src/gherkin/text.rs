//! Line-level helpers over raw Gherkin text.

/// Titles of the three features every analysis must produce, in order.
pub const MANDATED_FEATURES: [&str; 3] = [
    "End-to-End Summary",
    "Execution Details",
    "Edge Cases & Diagnostics",
];

/// Drop Markdown code-fence lines (``` or ```gherkin) and trim.
pub fn sanitize_gherkin(src: &str) -> String {
    src.lines()
        .filter(|line| !line.trim().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Split a multi-feature document at each `Feature:` line. Tag lines sitting
/// directly above a feature travel with it.
pub fn split_features(src: &str) -> Vec<String> {
    let mut features = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    for line in src.lines() {
        if is_feature_line(line) && !buffer.is_empty() {
            let mut split_at = buffer.len();
            while split_at > 0 && buffer[split_at - 1].trim_start().starts_with('@') {
                split_at -= 1;
            }
            let carried = buffer.split_off(split_at);
            features.push(buffer.join("\n").trim().to_string());
            buffer = carried;
        }
        buffer.push(line);
    }
    if !buffer.is_empty() {
        features.push(buffer.join("\n").trim().to_string());
    }
    features.retain(|f| !f.is_empty());
    features
}

/// `Feature: <name>` from the first feature line, else the first non-blank
/// line, else `Feature`.
pub fn feature_title(src: &str) -> String {
    if let Some(name) = src.lines().find_map(feature_name) {
        if !name.is_empty() {
            return format!("Feature: {name}");
        }
    }
    src.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Feature")
        .to_string()
}

/// Name part of a `Feature:` line, trailing tags included.
pub(crate) fn feature_name(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("Feature")?;
    let rest = rest.trim_start().strip_prefix(':')?;
    Some(rest.trim())
}

fn is_feature_line(line: &str) -> bool {
    feature_name(line).is_some()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureOrderReport {
    pub found: Vec<String>,
    pub in_order: bool,
}

/// Check that the document holds the three mandated features in order.
/// Titles may carry trailing tags (`End-to-End Summary @e2e`).
pub fn check_feature_order(src: &str) -> FeatureOrderReport {
    let found: Vec<String> = src
        .lines()
        .filter_map(feature_name)
        .map(str::to_string)
        .collect();
    let in_order = found.len() == MANDATED_FEATURES.len()
        && found
            .iter()
            .zip(MANDATED_FEATURES)
            .all(|(name, expected)| name.starts_with(expected));
    FeatureOrderReport { found, in_order }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_falls_back_to_first_line() {
        assert_eq!(feature_title("\n  @tag only\nmore"), "@tag only");
        assert_eq!(feature_title("   \n"), "Feature");
    }

    #[test]
    fn title_uses_feature_line() {
        assert_eq!(
            feature_title("@e2e\nFeature:  Login flow \n  Scenario: x"),
            "Feature: Login flow"
        );
    }
}

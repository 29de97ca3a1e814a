use intention_core::gherkin::MANDATED_FEATURES;

const FEATURE_TAGS: [&str; 3] = ["@e2e @summary", "@unit @insights", "@unit @edge @debug"];

const TABLE_RULES: [&str; 4] = [
    "- Every Scenario MUST be a Scenario Outline with an Examples table, even when there is a single row.",
    "- ALL demo, input, expected and config values MUST be strictly valid, compact single-line JSON and live ONLY in the Examples table.",
    "- Steps MUST reference example values through <...> placeholders such as <input>, <params>, <config>, <expected>.",
    "- Scalars are still JSON: true, \"mode\", 123.",
];

fn feature_headers() -> Vec<String> {
    MANDATED_FEATURES
        .iter()
        .zip(FEATURE_TAGS)
        .enumerate()
        .map(|(i, (title, tags))| format!("{}) Feature: {title} {tags}", i + 1))
        .collect()
}

pub(super) fn plan(repo_url: &str) -> String {
    [
        "You are a senior QA engineer and TypeScript expert. Visit the repository and produce a concise testability plan.",
        "Summarize the main modules, key classes and functions, external boundaries (APIs, databases, filesystem, network) and seams for unit tests.",
        "List candidate units to test and notable edge cases. Keep it under 400 words, as bullets.",
    ]
    .join(" ")
        + &format!("\n\nRepository URL: {repo_url}")
}

pub(super) fn generate(repo_url: &str, plan: Option<&str>) -> String {
    let headers = feature_headers();
    let mut lines: Vec<String> = vec![
        "Generate ONLY valid Gherkin for this repository, leaning towards unit-testable steps that map well to Jest.".into(),
        "Organize the output into THREE clearly separated Features with tags and optional brief # comments:".into(),
        format!("{} - 3-6 scenarios summarizing the core user-visible flows.", headers[0]),
        format!(
            "{} - 5-10 scenarios per key module, class or function with fine-grained Given/When/Then a Jest test can drive directly with dependencies mocked. Prepend short # Insight comments when helpful.",
            headers[1]
        ),
        format!(
            "{} - 6-10 scenarios covering invalid inputs, timeouts, retries, boundaries and logging hooks.",
            headers[2]
        ),
        "Strict formatting rules for demo values and parameters:".into(),
    ];
    lines.extend(TABLE_RULES.iter().map(|r| r.to_string()));
    lines.extend(
        [
            "- Choose clear column names: input, params, config, expected, context.",
            "- Prefer multiple rows when natural; otherwise provide at least one row.",
            "Guidelines:",
            "- Use steps like 'Given module X with dependency Y mocked', 'And input <input>', 'When calling X.fn with <params>', 'Then it returns <expected>'.",
            "- Prefer small, verifiable steps over vague prose.",
            "- Do NOT use markdown fences or code blocks; # comments are allowed inside Gherkin.",
        ]
        .iter()
        .map(|l| l.to_string()),
    );

    let mut prompt = lines.join("\n");
    if let Some(plan) = plan {
        prompt.push_str("\n\nPlanning context:\n");
        prompt.push_str(plan);
    }
    prompt.push_str(&format!("\n\nRepository URL: {repo_url}"));
    prompt
}

pub(super) fn refine(gherkin: &str) -> String {
    let mut lines: Vec<String> =
        vec!["Reorganize and validate the following Gherkin to strictly follow this order and labeling:".into()];
    lines.extend(feature_headers());
    lines.push("Enforce these constraints:".into());
    lines.extend(TABLE_RULES.iter().map(|r| r.to_string()));
    lines.push("- Keep steps concise and unit-testable; # Insight comments allowed sparingly.".into());
    lines.push("Output ONLY Gherkin.".into());
    lines.push("\n\nGherkin to reorganize:".into());
    lines.push(gherkin.to_string());
    lines.join("\n")
}

use std::fs;
use std::path::Path;

use intention_server::cli::WorkbenchAction;
use intention_server::workbench;
use tempfile::TempDir;

const GHERKIN: &str = "```gherkin
Feature: Cart
  Scenario: Add item
    Given an empty cart
    When I add a book
    Then the cart has 1 item

Feature: Pay
  Scenario: Card
    Given a full cart
    When I pay by card
```";

fn run(session: &Path, action: WorkbenchAction) -> String {
    let mut out = Vec::new();
    workbench::run(session, action, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn load_generate_edit_and_export() {
    intention_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let session = temp.path().join("session");
    let payload = temp.path().join("payload.feature");
    fs::write(&payload, GHERKIN).unwrap();

    let output = run(&session, WorkbenchAction::Load { file: payload });
    assert!(output.contains("Loaded 2 feature(s)"));
    assert!(output.contains("[1] Feature: Pay"));

    let code = run(&session, WorkbenchAction::Generate { index: 0 });
    assert!(code.contains("// When I add a book"));

    let steps = run(&session, WorkbenchAction::Steps { index: 0 });
    let when_id: u32 = steps
        .lines()
        .find(|l| l.contains("When I add a book"))
        .and_then(|l| l.split_whitespace().next())
        .unwrap()
        .parse()
        .unwrap();

    let selected = run(
        &session,
        WorkbenchAction::Select {
            index: 0,
            step: when_id,
        },
    );
    assert!(selected.trim_start().starts_with("// When I add a book"));

    let edit = temp.path().join("edit.ts");
    fs::write(&edit, "// When I add a book\n\ncart.add('book');\n").unwrap();
    let applied = run(
        &session,
        WorkbenchAction::Apply {
            index: 0,
            step: when_id,
            file: edit,
        },
    );
    assert!(applied.contains("cart.add('book');"));

    let features = run(&session, WorkbenchAction::Features);
    assert!(features.contains("[0] Feature: Cart (tests)"));
    assert!(features.contains("[1] Feature: Pay (-)"));

    let target = temp.path().join("out").join("all.spec.ts");
    let exported = run(
        &session,
        WorkbenchAction::Export {
            out: Some(target.clone()),
        },
    );
    assert!(exported.contains("Exported 1 feature(s)"));
    let written = fs::read_to_string(&target).unwrap();
    assert!(written.contains("cart.add('book');"));

    run(&session, WorkbenchAction::Clear);
    assert!(run(&session, WorkbenchAction::Features).contains("No features loaded"));
}

#[test]
fn editing_a_missing_feature_fails() {
    let temp = TempDir::new().unwrap();
    let text = temp.path().join("feature.txt");
    fs::write(&text, "Feature: Lonely").unwrap();

    let mut out = Vec::new();
    let err = workbench::run(
        temp.path(),
        WorkbenchAction::Edit {
            index: 3,
            file: text,
        },
        &mut out,
    )
    .unwrap_err();
    assert!(err.to_string().contains("feature 3 does not exist"));
}

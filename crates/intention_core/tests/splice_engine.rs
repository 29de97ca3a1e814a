use std::sync::Arc;

use intention_core::gherkin::Keyword;
use intention_core::splice::{JestConverter, SpliceEngine, SpliceError, StepId, TestConverter};
use pretty_assertions::assert_eq;

fn init_logging() {
    intention_logging::initialize_for_tests();
}

const CART: &str = "Feature: Cart
  Scenario Outline: add items
    Given a cart with <count> items
    When the user adds <item>
    Then the cart has <total> items

    Examples:
      | count | item    | total |
      | 0     | \"apple\" | 1     |
";

const CART_TESTS: &str = "describe('Feature: Cart', () => {
  describe('Scenario Outline: add items', () => {
    const examples = [
      {\"count\":0,\"item\":\"apple\",\"total\":1},
    ];

    it.each(examples)('add items', async (example) => {
      // Given a cart with <count> items
      expect(example).toBeDefined();

      // When the user adds <item>
      expect(example).toBeDefined();

      // Then the cart has <total> items
      expect(example).toBeDefined();
    });
  });
});
";

fn converter() -> Arc<dyn TestConverter> {
    Arc::new(JestConverter)
}

fn step_id(engine: &SpliceEngine, keyword: Keyword) -> StepId {
    engine
        .steps()
        .iter()
        .find(|s| s.keyword == keyword)
        .map(|s| s.id)
        .expect("step present")
}

#[test]
fn generated_layout_matches_the_jest_contract() {
    init_logging();
    let engine = SpliceEngine::generate(converter(), CART).unwrap();
    assert_eq!(engine.test_code(), CART_TESTS);
}

#[test]
fn compile_derives_steps_with_parents_and_ranges() {
    init_logging();
    let engine = SpliceEngine::compile(converter(), CART, CART_TESTS).unwrap();
    let steps = engine.steps();

    let labels: Vec<String> = steps.iter().map(|s| s.label()).collect();
    assert_eq!(
        labels,
        vec![
            "Feature Cart",
            "Scenario Outline add items",
            "Given a cart with <count> items",
            "When the user adds <item>",
            "Then the cart has <total> items",
        ]
    );
    let ids: Vec<u32> = steps.iter().map(|s| s.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    assert_eq!(steps[0].parent, None);
    let outline_parent = steps[1].parent.as_ref().unwrap();
    assert_eq!(outline_parent.title, "Feature: Cart");
    assert_eq!(outline_parent.index, 0);
    let given_parent = steps[2].parent.as_ref().unwrap();
    assert_eq!(given_parent.title, "Scenario Outline: add items");
    assert_eq!(given_parent.index, 1);

    assert_eq!(
        steps[2].source(CART_TESTS),
        "      // Given a cart with <count> items\n      expect(example).toBeDefined();"
    );
    assert_eq!(steps[2].fragments.statement, "expect(example).toBeDefined();");
    assert!(steps[0].source(CART_TESTS).ends_with("  });\n});"));
}

#[test]
fn structural_nodes_cannot_be_selected() {
    init_logging();
    let mut engine = SpliceEngine::compile(converter(), CART, CART_TESTS).unwrap();
    for keyword in [Keyword::Feature, Keyword::ScenarioOutline] {
        let id = step_id(&engine, keyword);
        assert!(matches!(
            engine.select(id),
            Err(SpliceError::NotEditable { keyword: k }) if k == keyword
        ));
    }
    assert!(matches!(
        engine.select(StepId(99)),
        Err(SpliceError::UnknownStep(StepId(99)))
    ));
    assert!(matches!(
        engine.apply_edit("anything"),
        Err(SpliceError::NoSelection)
    ));
}

#[test]
fn selection_carries_step_and_scenario_text() {
    init_logging();
    let mut engine = SpliceEngine::compile(converter(), CART, CART_TESTS).unwrap();
    let when = step_id(&engine, Keyword::When);
    let selection = engine.select(when).unwrap().clone();

    assert_eq!(
        selection.step_text,
        "      // When the user adds <item>\n      expect(example).toBeDefined();"
    );
    let scenario = selection.scenario_text.unwrap();
    assert!(scenario.starts_with("  describe('Scenario Outline: add items'"));
    assert!(scenario.ends_with("  });"));
}

#[test]
fn apply_edit_replaces_only_the_selected_step() {
    init_logging();
    let mut engine = SpliceEngine::compile(converter(), CART, CART_TESTS).unwrap();
    let before: Vec<_> = engine.steps().to_vec();
    let given = step_id(&engine, Keyword::Given);
    engine.select(given).unwrap();

    let edit = "      // Given a cart with <count> items\n\n      const cart = new Cart(example.count);\n      expect(cart.size()).toBe(example.count);\n\n";
    let code = engine.apply_edit(edit).unwrap().to_string();

    assert!(code.contains(
        "      // Given a cart with <count> items\n      const cart = new Cart(example.count);\n      expect(cart.size()).toBe(example.count);\n\n      // When the user adds <item>"
    ));
    let selection = engine.selection().unwrap();
    assert_eq!(selection.step_id, given);
    assert_eq!(
        selection.step_text,
        "      // Given a cart with <count> items\n      const cart = new Cart(example.count);\n      expect(cart.size()).toBe(example.count);"
    );

    let after = engine.steps();
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(after) {
        assert_eq!(old.id, new.id);
        assert_eq!(old.keyword, new.keyword);
        if old.id != given {
            assert_eq!(old.fragments, new.fragments);
        }
    }
}

#[test]
fn edit_that_renames_the_step_is_rejected_without_side_effects() {
    init_logging();
    let mut engine = SpliceEngine::compile(converter(), CART, CART_TESTS).unwrap();
    let then = step_id(&engine, Keyword::Then);
    engine.select(then).unwrap();

    let err = engine
        .apply_edit("      // Then something else entirely\n      expect(1).toBe(1);")
        .unwrap_err();
    match err {
        SpliceError::StepNotFoundAfterEdit { label, parent } => {
            assert_eq!(label, "Then the cart has <total> items");
            assert_eq!(parent, "Scenario Outline: add items");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.test_code(), CART_TESTS);
}

#[test]
fn imports_used_by_an_edit_travel_with_the_step() {
    init_logging();
    let code = format!("import {{ Cart }} from '../src/cart';\nimport fs from 'fs';\n\n{CART_TESTS}");
    let mut engine = SpliceEngine::compile(converter(), CART, &code).unwrap();
    let given = step_id(&engine, Keyword::Given);
    engine.select(given).unwrap();

    let code = engine
        .apply_edit("      // Given a cart with <count> items\n      const cart = new Cart(example.count);")
        .unwrap()
        .to_string();

    assert!(code.starts_with("import { Cart } from '../src/cart';\n\ndescribe('Feature: Cart'"));
    assert!(!code.contains("import fs"));
    let step = engine.step(given).unwrap();
    assert_eq!(step.fragments.imports, vec!["import { Cart } from '../src/cart';"]);
}

#[test]
fn regenerate_round_trip_has_no_drift() {
    init_logging();
    let converter = JestConverter;
    let first = converter.generate(&[], CART).unwrap();
    let steps = converter.compile_steps(&first).unwrap();
    let second = converter.generate(&steps, CART).unwrap();
    let again = converter.compile_steps(&second).unwrap();

    assert_eq!(first, second);
    let keywords = |steps: &[intention_core::splice::Step]| {
        steps.iter().map(|s| s.keyword).collect::<Vec<_>>()
    };
    assert_eq!(keywords(&steps), keywords(&again));
}

#[test]
fn refresh_follows_feature_text_and_keeps_bodies() {
    init_logging();
    let mut engine = SpliceEngine::compile(converter(), CART, CART_TESTS).unwrap();
    let when = step_id(&engine, Keyword::When);
    engine.select(when).unwrap();
    engine
        .apply_edit("      // When the user adds <item>\n      cart.add(example.item);")
        .unwrap();

    let extended = CART.replace(
        "    Then the cart has <total> items",
        "    Then the cart has <total> items\n    And the badge shows <total>",
    );
    engine.set_feature_text(&extended).unwrap();
    let code = engine.refresh().unwrap().to_string();

    assert!(code.contains("      // When the user adds <item>\n      cart.add(example.item);"));
    assert!(code.contains("      // And the badge shows <total>\n      expect(example).toBeDefined();"));
    assert_eq!(engine.step(when).map(|s| s.keyword), Some(Keyword::When));
    assert_eq!(engine.steps().len(), 6);
    assert_eq!(engine.steps()[5].id, StepId(6));
}

#[test]
fn repeated_identical_steps_keep_separate_bodies() {
    init_logging();
    let feature = "Feature: Twice
  Scenario: repeat
    Given a step
    And a step
    And a step
";
    let mut engine = SpliceEngine::generate(converter(), feature).unwrap();
    let first_and = engine.steps()[3].id;
    engine.select(first_and).unwrap();
    engine
        .apply_edit("      // And a step\n      secondCall();")
        .unwrap();

    let statements: Vec<&str> = engine
        .steps()
        .iter()
        .filter(|s| s.keyword == Keyword::And)
        .map(|s| s.fragments.statement.as_str())
        .collect();
    assert_eq!(
        statements,
        vec!["secondCall();", "expect(true).toBe(true);"]
    );
}

#[test]
fn unindented_edit_of_last_step_stays_inside_its_test() {
    init_logging();
    let feature = "Feature: Cart\n  Scenario: empty cart\n    Given a cart\n    Then it is empty\n";
    let mut engine = SpliceEngine::generate(converter(), feature).unwrap();
    let before: Vec<_> = engine.steps().to_vec();
    let then = step_id(&engine, Keyword::Then);
    engine.select(then).unwrap();

    let code = engine
        .apply_edit("// Then it is empty\nexpect(cart.size()).toBe(0);")
        .unwrap()
        .to_string();

    assert!(code.ends_with(
        "      // Then it is empty\n      expect(cart.size()).toBe(0);\n    });\n  });\n});\n"
    ));
    let closers = code.lines().filter(|l| l.trim() == "});").count();
    assert_eq!(closers, 3);

    let edited = engine.step(then).unwrap();
    assert_eq!(edited.fragments.statement, "expect(cart.size()).toBe(0);");
    for (old, new) in before.iter().zip(engine.steps()) {
        if old.id != then {
            assert_eq!(old.fragments, new.fragments);
        }
    }
}

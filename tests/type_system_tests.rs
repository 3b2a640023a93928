//! Type System Tests
//!
//! Exercises the public type algebra: equality, assignability and
//! unification, plus the types the analyzer infers for real programs.

use forge_lang::types::{is_assignable, types_equal, unify, ForgeType};
use forge_lang::Analyzer;
use std::collections::BTreeMap;

fn obj(props: &[(&str, ForgeType)], open: bool) -> ForgeType {
    let props: BTreeMap<String, ForgeType> = props
        .iter()
        .map(|(name, ty)| (name.to_string(), ty.clone()))
        .collect();
    ForgeType::object(props, open)
}

fn samples() -> Vec<ForgeType> {
    vec![
        ForgeType::Number,
        ForgeType::String,
        ForgeType::Boolean,
        ForgeType::Null,
        ForgeType::literal_string("dog"),
        ForgeType::literal_number(3.0),
        ForgeType::array(ForgeType::Number),
        obj(&[("name", ForgeType::String)], false),
        ForgeType::function(vec![ForgeType::Number], ForgeType::String),
        ForgeType::union([ForgeType::Number, ForgeType::String]),
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
// ASSIGNABILITY LAWS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_assignability_is_reflexive() {
    for ty in samples() {
        assert!(is_assignable(&ty, &ty), "{} should accept itself", ty);
    }
}

#[test]
fn test_any_accepts_and_flows_everywhere() {
    for ty in samples() {
        assert!(is_assignable(&ty, &ForgeType::Any), "{} -> any", ty);
        assert!(is_assignable(&ForgeType::Any, &ty), "any -> {}", ty);
    }
}

#[test]
fn test_unknown_flows_only_into_unknown() {
    assert!(is_assignable(&ForgeType::Unknown, &ForgeType::Unknown));
    assert!(!is_assignable(&ForgeType::Unknown, &ForgeType::Number));
    assert!(is_assignable(&ForgeType::Number, &ForgeType::Unknown));
}

#[test]
fn test_literals_widen() {
    assert!(is_assignable(
        &ForgeType::literal_string("Fuffy"),
        &ForgeType::String
    ));
    assert!(is_assignable(
        &ForgeType::literal_number(1.0),
        &ForgeType::Number
    ));
    assert!(!is_assignable(
        &ForgeType::literal_string("1"),
        &ForgeType::Number
    ));
}

#[test]
fn test_null_is_its_own_kind() {
    assert!(is_assignable(&ForgeType::Null, &ForgeType::Null));
    assert!(!is_assignable(&ForgeType::Null, &ForgeType::String));
    let nullable = ForgeType::union([ForgeType::String, ForgeType::Null]);
    assert!(is_assignable(&ForgeType::Null, &nullable));
}

#[test]
fn test_union_rules() {
    let number_or_string = ForgeType::union([ForgeType::Number, ForgeType::String]);
    assert!(is_assignable(&ForgeType::Number, &number_or_string));
    assert!(!is_assignable(&number_or_string, &ForgeType::Number));
    assert!(!is_assignable(&ForgeType::Boolean, &number_or_string));
}

#[test]
fn test_array_elements_compare_recursively() {
    let numbers = ForgeType::array(ForgeType::Number);
    let strings = ForgeType::array(ForgeType::String);
    assert!(!is_assignable(&numbers, &strings));
    assert!(is_assignable(
        &ForgeType::array(ForgeType::literal_number(2.0)),
        &numbers
    ));
}

#[test]
fn test_closed_object_requires_every_property() {
    let target = obj(
        &[("name", ForgeType::String), ("age", ForgeType::Number)],
        false,
    );
    let partial = obj(&[("name", ForgeType::String)], false);
    let full = obj(
        &[
            ("name", ForgeType::String),
            ("age", ForgeType::Number),
            ("extra", ForgeType::Boolean),
        ],
        false,
    );
    assert!(!is_assignable(&partial, &target));
    assert!(is_assignable(&full, &target));
}

#[test]
fn test_open_target_tolerates_missing_properties() {
    let open_target = obj(
        &[("name", ForgeType::String), ("age", ForgeType::Number)],
        true,
    );
    let empty = obj(&[], false);
    let partial = obj(&[("name", ForgeType::String)], false);
    let wrong = obj(&[("name", ForgeType::Number)], false);

    assert!(is_assignable(&empty, &open_target));
    assert!(is_assignable(&partial, &open_target));
    // Present properties are still checked.
    assert!(!is_assignable(&wrong, &open_target));
}

#[test]
fn test_function_variance() {
    let takes_number = ForgeType::function(vec![ForgeType::Number], ForgeType::String);
    let takes_literal = ForgeType::function(
        vec![ForgeType::literal_number(1.0)],
        ForgeType::literal_string("x"),
    );
    let takes_two = ForgeType::function(
        vec![ForgeType::Number, ForgeType::Number],
        ForgeType::String,
    );

    assert!(is_assignable(&takes_literal, &takes_number));
    assert!(!is_assignable(&takes_two, &takes_number));
}

// ═══════════════════════════════════════════════════════════════════════════
// EQUALITY AND UNIFICATION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_union_equality_ignores_order() {
    let a = ForgeType::union([ForgeType::Number, ForgeType::String]);
    let b = ForgeType::union([ForgeType::String, ForgeType::Number]);
    assert!(types_equal(&a, &b));
    assert!(!types_equal(&a, &ForgeType::Number));
}

#[test]
fn test_union_construction_flattens() {
    let nested = ForgeType::union([
        ForgeType::Number,
        ForgeType::union([ForgeType::String, ForgeType::Number]),
    ]);
    assert!(types_equal(
        &nested,
        &ForgeType::union([ForgeType::Number, ForgeType::String])
    ));
    assert!(types_equal(
        &ForgeType::union([ForgeType::Boolean]),
        &ForgeType::Boolean
    ));
    assert!(types_equal(&ForgeType::union(Vec::new()), &ForgeType::Unknown));
}

#[test]
fn test_unify_is_idempotent() {
    for ty in samples() {
        assert!(types_equal(&unify(&ty, &ty), &ty), "unify({0}, {0})", ty);
    }
}

#[test]
fn test_unify_absorbs_any_and_unknown() {
    assert!(types_equal(
        &unify(&ForgeType::Any, &ForgeType::Number),
        &ForgeType::Any
    ));
    assert!(types_equal(
        &unify(&ForgeType::Unknown, &ForgeType::String),
        &ForgeType::String
    ));
}

#[test]
fn test_unify_objects_merges_properties() {
    let a = obj(&[("name", ForgeType::String)], false);
    let b = obj(&[("age", ForgeType::Number)], true);
    let merged = unify(&a, &b);
    let expected = obj(
        &[("name", ForgeType::String), ("age", ForgeType::Number)],
        true,
    );
    assert!(types_equal(&merged, &expected), "got {}", merged);
}

#[test]
fn test_unify_distinct_primitives_is_union() {
    let joined = unify(&ForgeType::Number, &ForgeType::String);
    assert!(types_equal(
        &joined,
        &ForgeType::union([ForgeType::Number, ForgeType::String])
    ));
    assert!(is_assignable(&ForgeType::Number, &joined));
}

// ═══════════════════════════════════════════════════════════════════════════
// INFERENCE THROUGH THE ANALYZER
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_declared_types_are_inferred() {
    let source = "let dog = 'Fuffy';\nlet age = 3;\nlet tags = ['a', 'b'];";
    let result = Analyzer::default().analyze(source);
    assert!(result.ok, "{:?}", result.diagnostics);
    let semantic = result.semantic.unwrap();

    let dog = semantic.symbols.global.get("dog").unwrap();
    assert!(types_equal(&dog.ty, &ForgeType::String), "dog: {}", dog.ty);
    let age = semantic.symbols.global.get("age").unwrap();
    assert!(types_equal(&age.ty, &ForgeType::Number), "age: {}", age.ty);
    let tags = semantic.symbols.global.get("tags").unwrap();
    assert!(
        types_equal(&tags.ty, &ForgeType::array(ForgeType::String)),
        "tags: {}",
        tags.ty
    );
}

#[test]
fn test_annotation_mismatch_is_reported() {
    let result = Analyzer::default().analyze("let count: number = 'three';");
    assert!(!result.ok);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == "TYPE_MISMATCH"));
}

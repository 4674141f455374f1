// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for generic-validator.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use generic_validator::config::RuleStore;
use generic_validator::webhooks::policies::reason;
use generic_validator::webhooks::{AdmissionPolicy, DecisionBudget};
use proptest::prelude::*;
use serde_json::{Value, json};

use common::fixtures::{ConfigDocumentBuilder, decision_request, rule, widget};

/// Strategy for generating kind names.
fn kind_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,8}"
}

/// Strategy for generating single path segments.
fn segment() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

/// Strategy for generating arbitrary JSON objects.
fn any_object() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
            .prop_map(|map| Value::Object(map.into_iter().collect()))
    })
}

/// Integer operators with their reference semantics.
fn int_operator() -> impl Strategy<Value = (&'static str, fn(i64, i64) -> bool)> {
    prop_oneof![
        Just(("Is", (|a: i64, b: i64| a == b) as fn(i64, i64) -> bool)),
        Just(("IsNot", (|a: i64, b: i64| a != b) as fn(i64, i64) -> bool)),
        Just(("GreaterThan", (|a: i64, b: i64| a > b) as fn(i64, i64) -> bool)),
        Just(("MoreThan", (|a: i64, b: i64| a > b) as fn(i64, i64) -> bool)),
        Just(("SmallerThan", (|a: i64, b: i64| a < b) as fn(i64, i64) -> bool)),
        Just(("LessThan", (|a: i64, b: i64| a < b) as fn(i64, i64) -> bool)),
        Just(("EqualOrGreaterThan", (|a: i64, b: i64| a >= b) as fn(i64, i64) -> bool)),
        Just(("EqualOrMoreThan", (|a: i64, b: i64| a >= b) as fn(i64, i64) -> bool)),
        Just(("EqualOrSmallerThan", (|a: i64, b: i64| a <= b) as fn(i64, i64) -> bool)),
        Just(("EqualOrLessThan", (|a: i64, b: i64| a <= b) as fn(i64, i64) -> bool)),
    ]
}

fn policy(document: &str) -> AdmissionPolicy {
    let store = Arc::new(RuleStore::new());
    store.load(document).unwrap();
    AdmissionPolicy::new(store)
}

proptest! {
    /// Requesters in an admin group are allowed whatever the rules and object.
    #[test]
    fn admin_always_allowed(object in any_object(), threshold in any::<i64>()) {
        let document = ConfigDocumentBuilder::new()
            .kind("Widget", vec![rule("spec.replicas", "int", "GreaterThan", json!(threshold))])
            .admin_group("ops")
            .build();
        let result = policy(&document).decide(
            &decision_request("Widget", &["dev", "ops"], object),
            &DecisionBudget::unbounded(),
        );
        prop_assert!(result.allowed);
        prop_assert_eq!(result.reason(), reason::ADMIN_BYPASS);
    }

    /// Kinds without rules are allowed for any object.
    #[test]
    fn unconfigured_kind_allowed(kind in kind_name(), object in any_object()) {
        prop_assume!(kind != "Widget");
        let document = ConfigDocumentBuilder::new()
            .kind("Widget", vec![rule("spec.tier", "string", "Is", json!("gold"))])
            .build();
        let result = policy(&document).decide(
            &decision_request(&kind, &["dev"], object),
            &DecisionBudget::unbounded(),
        );
        prop_assert!(result.allowed);
        prop_assert_eq!(result.reason(), reason::NO_RULES_FOR_KIND);
    }

    /// Rules of every entry for a kind concatenate in document order.
    #[test]
    fn duplicate_kinds_concatenate(
        entries in prop::collection::vec(
            (prop_oneof![Just("Widget"), Just("Gadget")], prop::collection::vec(segment(), 0..3)),
            1..6,
        )
    ) {
        let mut builder = ConfigDocumentBuilder::new();
        let mut expected: Vec<String> = Vec::new();
        for (kind, fields) in &entries {
            let rules = fields
                .iter()
                .map(|f| rule(&format!("spec.{f}"), "bool", "Is", json!(true)))
                .collect();
            builder = builder.kind(*kind, rules);
            if *kind == "Widget" {
                expected.extend(fields.iter().map(|f| format!("spec.{f}")));
            }
        }

        let store = RuleStore::new();
        store.load(&builder.build()).unwrap();
        let fields: Vec<String> = store
            .rules_for_kind("Widget")
            .into_iter()
            .map(|r| r.field)
            .collect();
        prop_assert_eq!(fields, expected);
    }

    /// Integer operators compare the object value against the rule value.
    #[test]
    fn integer_operators(actual in -1000i64..1000, expected in -1000i64..1000, (op, reference) in int_operator()) {
        let document = ConfigDocumentBuilder::new()
            .kind("Widget", vec![rule("spec.replicas", "int64", op, json!(expected))])
            .build();
        let result = policy(&document).decide(
            &decision_request("Widget", &["dev"], widget(json!({"replicas": actual}))),
            &DecisionBudget::unbounded(),
        );
        prop_assert_eq!(result.allowed, reference(actual, expected));
    }

    /// A rejected reload leaves rules, admin groups and generation unchanged.
    #[test]
    fn failed_reload_changes_nothing(fields in prop::collection::vec(segment(), 1..4), bad_type in "[a-z]{3,6}[0-9]") {
        let good = ConfigDocumentBuilder::new()
            .kind("Widget", fields.iter().map(|f| rule(&format!("spec.{f}"), "string", "Is", json!("x"))).collect())
            .admin_group("ops")
            .build();
        let bad = ConfigDocumentBuilder::new()
            .kind("Widget", vec![rule("spec.x", &bad_type, "Is", json!("x"))])
            .build();

        let store = RuleStore::new();
        store.load(&good).unwrap();
        let rules = store.rules_for_kind("Widget");
        let admins = store.admin_groups();
        let generation = store.generation();

        prop_assert!(store.load(&bad).is_err());
        prop_assert_eq!(store.rules_for_kind("Widget"), rules);
        prop_assert_eq!(store.admin_groups(), admins);
        prop_assert_eq!(store.generation(), generation);
    }

    /// Decisions never panic and a missing field always denies.
    #[test]
    fn arbitrary_objects_decide(object in any_object()) {
        let document = ConfigDocumentBuilder::new()
            .kind("Widget", vec![rule("spec.tier", "string", "Is", json!("gold"))])
            .build();
        let result = policy(&document).decide(
            &decision_request("Widget", &["dev"], object.clone()),
            &DecisionBudget::unbounded(),
        );
        let tier = object.get("spec").and_then(|spec| spec.get("tier"));
        prop_assert_eq!(result.allowed, tier == Some(&json!("gold")));
    }
}

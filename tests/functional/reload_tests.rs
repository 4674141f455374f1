//! Concurrent reload tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use generic_validator::config::RuleStore;
use generic_validator::webhooks::policies::reason;
use generic_validator::webhooks::{AdmissionPolicy, DecisionBudget};
use serde_json::json;

use crate::common::fixtures::{ConfigDocumentBuilder, decision_request, rule, widget};

const RELOADS: usize = 200;
const READERS: usize = 4;

fn document_a() -> String {
    ConfigDocumentBuilder::new()
        .kind("Widget", vec![rule("spec.a1", "string", "Is", json!("x"))])
        .kind("Gadget", vec![rule("spec.g", "bool", "Is", json!(true))])
        .kind("Widget", vec![rule("spec.a2", "string", "Is", json!("x"))])
        .build()
}

fn document_b() -> String {
    ConfigDocumentBuilder::new()
        .kind(
            "Widget",
            vec![
                rule("spec.b1", "int", "GreaterThan", json!(0)),
                rule("spec.b2", "int", "GreaterThan", json!(0)),
                rule("spec.b3", "int", "GreaterThan", json!(0)),
            ],
        )
        .admin_group("ops")
        .build()
}

#[test]
fn test_concurrent_reload_never_mixes_documents() {
    let store = Arc::new(RuleStore::new());
    store.load(&document_a()).unwrap();

    let expected_a = vec!["spec.a1".to_string(), "spec.a2".to_string()];
    let expected_b = vec![
        "spec.b1".to_string(),
        "spec.b2".to_string(),
        "spec.b3".to_string(),
    ];
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            let (a, b) = (document_a(), document_b());
            for i in 0..RELOADS {
                let document = if i % 2 == 0 { &b } else { &a };
                store.load(document).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        for _ in 0..READERS {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    let fields: Vec<String> = store
                        .rules_for_kind("Widget")
                        .into_iter()
                        .map(|r| r.field)
                        .collect();
                    assert!(
                        fields == expected_a || fields == expected_b,
                        "observed a mixed rule list: {fields:?}"
                    );

                    // Admin groups and rules must come from the same document.
                    let snapshot = store.snapshot();
                    let from_b = snapshot.admin_groups().contains("ops");
                    assert_eq!(from_b, snapshot.rules_for_kind("Widget").len() == 3);
                    assert_eq!(from_b, snapshot.rules_for_kind("Gadget").is_empty());
                }
            });
        }
    });

    assert_eq!(store.generation(), 1 + RELOADS as u64);
}

#[test]
fn test_decisions_during_reload_follow_one_document() {
    let store = Arc::new(RuleStore::new());
    store.load(&document_a()).unwrap();
    let policy = AdmissionPolicy::new(store.clone());

    // Satisfies document A, violates document B.
    let request = decision_request("Widget", &["dev"], widget(json!({"a1": "x", "a2": "x"})));
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            let (a, b) = (document_a(), document_b());
            for i in 0..RELOADS {
                store.load(if i % 2 == 0 { &b } else { &a }).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        for _ in 0..READERS {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    let result = policy.decide(&request, &DecisionBudget::unbounded());
                    if result.allowed {
                        assert_eq!(result.reason(), reason::ALL_RULES_SATISFIED);
                    } else {
                        // Document B: the first rule names a field the object lacks.
                        assert_eq!(result.reason(), reason::RULE_EVALUATION_FAILED);
                        assert!(result.message.unwrap().contains("spec.b1"));
                    }
                }
            });
        }
    });
}

#[test]
fn test_rejected_reload_under_load_keeps_configuration() {
    let store = Arc::new(RuleStore::new());
    store.load(&document_a()).unwrap();
    let bad = ConfigDocumentBuilder::new()
        .kind("Widget", vec![rule("spec.x", "bool", "In", json!([true]))])
        .build();

    thread::scope(|scope| {
        for _ in 0..READERS {
            scope.spawn(|| {
                for _ in 0..RELOADS {
                    assert!(store.load(&bad).is_err());
                }
            });
        }
    });

    assert_eq!(store.generation(), 1);
    assert_eq!(store.rules_for_kind("Widget").len(), 2);
}

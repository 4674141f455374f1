//! Admission decision for a decoded request.
//!
//! Stages, in order:
//! - Admin bypass: requesters holding an admin group are always allowed
//! - Rule lookup: kinds without configured rules are allowed
//! - Sequential evaluation: the first violated or failing rule denies
//!
//! Every decision is taken against one configuration snapshot, so admin groups
//! and rules always come from the same document.

pub mod field_path;
pub mod verify;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::RuleStore;

pub use verify::{EvalError, verify};

/// Machine-readable decision reasons.
pub mod reason {
    pub const ADMIN_BYPASS: &str = "AdminBypass";
    pub const NO_RULES_FOR_KIND: &str = "NoRulesForKind";
    pub const ALL_RULES_SATISFIED: &str = "AllRulesSatisfied";
    pub const RULE_VIOLATED: &str = "RuleViolated";
    pub const RULE_EVALUATION_FAILED: &str = "RuleEvaluationFailed";
    pub const DECISION_CANCELLED: &str = "DecisionCancelled";
    pub const DEADLINE_EXCEEDED: &str = "DeadlineExceeded";
    pub const INVALID_REQUEST: &str = "InvalidRequest";
}

/// Result of an admission decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Reason code (see [`reason`])
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: Some(reason.to_string()),
            message: None,
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("Unknown")
    }
}

/// A decoded admission request.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    /// Kind of the object, used to select rules
    pub kind: String,
    pub api_version: String,
    /// Groups of the requesting user
    pub requester_groups: Vec<String>,
    /// The object being admitted
    pub object: Value,
}

/// Deadline and cancellation signal for one decision.
///
/// Checked before every rule; an exhausted budget denies.
#[derive(Debug, Clone, Default)]
pub struct DecisionBudget {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

/// Why a [`DecisionBudget`] is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetExhausted {
    Cancelled,
    DeadlineExceeded,
}

impl DecisionBudget {
    /// No deadline; only an explicit cancel stops evaluation.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    /// Deadline `timeout` from now. A timeout past the clock's range has no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::starting_at(Instant::now(), timeout)
    }

    /// Deadline `timeout` after `started`. A timeout past the clock's range has no deadline.
    pub fn starting_at(started: Instant, timeout: Duration) -> Self {
        match started.checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::unbounded(),
        }
    }

    /// Request cancellation. Clones share the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn check(&self) -> Result<(), BudgetExhausted> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(BudgetExhausted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(BudgetExhausted::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// The admission decision engine.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    store: Arc<RuleStore>,
}

impl AdmissionPolicy {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Decide whether `request` is admitted.
    pub fn decide(&self, request: &DecisionRequest, budget: &DecisionBudget) -> ValidationResult {
        let configuration = self.store.snapshot();

        if configuration.is_admin(&request.requester_groups) {
            return ValidationResult::allowed(reason::ADMIN_BYPASS);
        }

        let rules = configuration.rules_for_kind(&request.kind);
        if rules.is_empty() {
            return ValidationResult::allowed(reason::NO_RULES_FOR_KIND);
        }

        for rule in rules {
            if let Err(exhausted) = budget.check() {
                return match exhausted {
                    BudgetExhausted::Cancelled => ValidationResult::denied(
                        reason::DECISION_CANCELLED,
                        &format!("Decision cancelled before verifying the rule: {}", rule),
                    ),
                    BudgetExhausted::DeadlineExceeded => ValidationResult::denied(
                        reason::DEADLINE_EXCEEDED,
                        &format!("Deadline exceeded before verifying the rule: {}", rule),
                    ),
                };
            }

            match verify(&request.object, rule) {
                Ok(true) => continue,
                Ok(false) => {
                    return ValidationResult::denied(
                        reason::RULE_VIOLATED,
                        &format!("Rule: {} violated", rule),
                    );
                }
                Err(e) => {
                    return ValidationResult::denied(
                        reason::RULE_EVALUATION_FAILED,
                        &format!("The error {} ({}) occurred verifying the rule: {}", e, e.kind(), rule),
                    );
                }
            }
        }

        ValidationResult::allowed(reason::ALL_RULES_SATISFIED)
    }
}

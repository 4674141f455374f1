//! Process-wide rule store.
//!
//! The store publishes immutable [`Configuration`] snapshots behind an `Arc`.
//! A reload parses and indexes the new document without holding any lock and
//! takes the write lock only to swap the pointer, so readers never observe a
//! partially rebuilt index and never block each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use super::document::{ConfigDocument, KindRuleSet};
use super::error::ConfigError;
use super::rule::Rule;

/// An accepted configuration together with its kind index.
#[derive(Debug, Clone)]
pub struct Configuration {
    document: ConfigDocument,
    index: HashMap<String, Vec<Rule>>,
    kinds: Vec<String>,
    generation: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::build(ConfigDocument::default(), 0)
    }
}

impl Configuration {
    /// Index a validated document.
    ///
    /// Rules of every entry naming the same kind are concatenated in document
    /// order, whether or not the entries are contiguous.
    pub fn build(document: ConfigDocument, generation: u64) -> Self {
        let mut index: HashMap<String, Vec<Rule>> = HashMap::new();
        for set in &document.kind_rule_sets {
            index
                .entry(set.kind.clone())
                .or_default()
                .extend(set.rules.iter().cloned());
        }

        let mut kinds: Vec<String> = index.keys().cloned().collect();
        kinds.sort();

        Self {
            document,
            index,
            kinds,
            generation,
        }
    }

    /// Rules for `kind` in declaration order; empty when none are configured.
    pub fn rules_for_kind(&self, kind: &str) -> &[Rule] {
        self.index.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn admin_groups(&self) -> &BTreeSet<String> {
        &self.document.admin_groups
    }

    /// Whether any of `groups` is an admin group.
    pub fn is_admin<S: AsRef<str>>(&self, groups: &[S]) -> bool {
        groups
            .iter()
            .any(|group| self.document.admin_groups.contains(group.as_ref()))
    }

    pub fn kind_rule_sets(&self) -> &[KindRuleSet] {
        &self.document.kind_rule_sets
    }

    /// Configured kinds, sorted.
    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    pub fn rule_count(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }

    /// Sequence number of this configuration; 0 before any document was accepted.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Shared holder of the current [`Configuration`].
#[derive(Debug)]
pub struct RuleStore {
    current: RwLock<Arc<Configuration>>,
    next_generation: AtomicU64,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStore {
    /// Create a store with no rules and the default admin group.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Configuration::default())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Parse `document` and publish it as the current configuration.
    ///
    /// Returns the generation of the published configuration. On error the
    /// store is left untouched.
    pub fn load(&self, document: &str) -> Result<u64, ConfigError> {
        let parsed = ConfigDocument::parse(document)?;
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let configuration = Arc::new(Configuration::build(parsed, generation));

        let kinds = configuration.kinds().len();
        let rules = configuration.rule_count();
        self.publish(configuration);

        info!(generation, kinds, rules, "Published rule configuration");
        Ok(generation)
    }

    fn publish(&self, configuration: Arc<Configuration>) {
        // The lock only guards an Arc swap, so a poisoned lock still holds a
        // consistent snapshot.
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // Concurrent loads may finish out of order; never go back in time.
        if configuration.generation() > current.generation() {
            *current = configuration;
        } else {
            debug!(
                generation = configuration.generation(),
                current = current.generation(),
                "Discarding configuration older than the published one"
            );
        }
    }

    /// The currently published configuration.
    pub fn snapshot(&self) -> Arc<Configuration> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copy of the rules configured for `kind`, in declaration order.
    pub fn rules_for_kind(&self, kind: &str) -> Vec<Rule> {
        self.snapshot().rules_for_kind(kind).to_vec()
    }

    /// Copy of the admin groups.
    pub fn admin_groups(&self) -> BTreeSet<String> {
        self.snapshot().admin_groups().clone()
    }

    /// Configured kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        self.snapshot().kinds().to_vec()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }
}

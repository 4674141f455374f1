//! Controller module for the generic validator.
//!
//! Watches the ConfigMap holding the rule document and keeps the rule store
//! and the webhook registration in sync with it.

pub mod configuration;
pub mod context;
pub mod error;
pub mod reconciler;
pub mod registration;

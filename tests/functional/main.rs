// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for generic-validator.
//!
//! These tests drive the rule store and the HTTP endpoints end to end
//! WITHOUT requiring a live Kubernetes cluster.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_concurrent_reload_never_mixes_documents
//! ```
//!
//! ## Test Categories
//!
//! - **Reload tests**: concurrent reloads against concurrent readers and
//!   decisions
//! - **Endpoint tests**: AdmissionReview requests through the axum routers

#[path = "../common/mod.rs"]
mod common;

mod endpoint_tests;
mod reload_tests;

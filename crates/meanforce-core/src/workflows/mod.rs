//! # Workflows Module
//!
//! Top-level entry points. A workflow validates the inputs of one task, loads
//! them, dispatches to the configured estimator, and persists the result.
//!
//! - **Label Workflow** ([`label`]) - Mean-force labeling of one restrained or
//!   constrained MD segment.

pub mod label;

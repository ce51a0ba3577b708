//! # Mean-Force Labeling Library
//!
//! Estimates generalized mean forces along collective variables (CVs) from short
//! biased molecular-dynamics segments. These forces are the labels of an
//! enhanced-sampling / concurrent-learning loop: each finished MD segment is
//! reduced to one force vector that downstream training consumes.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three layers throughout:
//!
//! - **[`core`]: The Foundation.** Stateless numerics and data models: periodic CV
//!   handling, trailing-window averaging, the CV projector interface, and the
//!   numeric text table format.
//!
//! - **[`engine`]: The Estimators.** Validated configuration, the restrained
//!   (harmonic) and constrained (blue-moon) estimators, the trajectory converter
//!   collaborator, error types, and progress reporting.
//!
//! - **[`workflows`]: The Public API.** Loads the inputs of one task, runs the
//!   selected estimator, and writes the force file only when everything succeeded.

pub mod core;
pub mod engine;
pub mod workflows;

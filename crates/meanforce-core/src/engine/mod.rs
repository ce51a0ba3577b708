//! # Engine Module
//!
//! The mean-force estimators and everything they need to run.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Validated label settings and the estimator selection
//! - **Restrained Estimator** ([`restrained`]) - Hooke's-law inversion of the CV drift
//! - **Constrained Estimator** ([`constrained`]) - Force projection plus the finite-temperature correction
//! - **Trajectory Conversion** ([`convert`]) - Producing coordinate/force tables from MD output
//! - **Progress Monitoring** ([`progress`]) - Phase and per-frame progress events
//! - **Error Handling** ([`error`]) - The error type every estimation returns
//!
//! The estimator set is closed: [`config::Estimator`] is matched exhaustively
//! and both variants share the trailing-window averaging of
//! [`crate::core::window`].

pub mod config;
pub mod constrained;
pub mod convert;
pub mod error;
pub mod progress;
pub mod restrained;

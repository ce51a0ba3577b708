//! # Core Module
//!
//! Stateless building blocks shared by both estimators.
//!
//! - **Data Models** ([`models`]) - CV trajectories, atomic frames, angular masks and CV atom groups
//! - **File I/O** ([`io`]) - Whitespace-delimited numeric tables in `%.10e` layout
//! - **Periodicity** ([`periodic`]) - Branch unwrapping of angular CVs on `[-π, π)`
//! - **Averaging** ([`window`]) - Trailing-window means that discard the relaxation phase
//! - **Projection** ([`projection`]) - The swappable map from Cartesian forces to CV space
//!
//! Nothing here holds state between calls; every function is a pure transform of
//! its arguments.

pub mod io;
pub mod models;
pub mod periodic;
pub mod projection;
pub mod window;

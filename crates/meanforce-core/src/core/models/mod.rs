//! Data models for one labeling task.
//!
//! - [`trajectory`] - CV time series and per-frame atomic coordinates/forces
//! - [`selection`] - Angular masks and the atom tuples defining each CV

pub mod selection;
pub mod trajectory;

//! Branch handling for periodic (angular) collective variables.
//!
//! Angular CVs are reported on `[-π, π)`. Both operations here apply at most one
//! `±2π` shift per value and use the same half-open convention: a difference of
//! exactly `+π` wraps to `-π`, a difference of exactly `-π` is kept.

use super::models::selection::AngularMask;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::{PI, TAU};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Angular mask has {mask} entries but the data has {width} CV dimensions")]
pub struct MaskMismatch {
    pub mask: usize,
    pub width: usize,
}

fn check_width(mask: &AngularMask, width: usize) -> Result<(), MaskMismatch> {
    if mask.len() != width {
        return Err(MaskMismatch {
            mask: mask.len(),
            width,
        });
    }
    Ok(())
}

/// Brings a single angular difference into `[-π, π)` with one `±2π` correction.
#[inline]
pub fn wrap_once(diff: f64) -> f64 {
    if diff < -PI {
        diff + TAU
    } else if diff >= PI {
        diff - TAU
    } else {
        diff
    }
}

/// Shifts the angular columns of every frame onto the branch of frame 0.
///
/// For each frame `i > 0` and angular dimension `d`, the value moves by `±2π`
/// when `values[i, d] - values[0, d]` falls outside `[-π, π)`. Frame 0 is the
/// fixed reference, so applying this twice changes nothing.
pub fn unwrap_trajectory(values: &mut DMatrix<f64>, mask: &AngularMask) -> Result<(), MaskMismatch> {
    check_width(mask, values.ncols())?;
    if values.nrows() < 2 {
        return Ok(());
    }

    for dim in mask.angular_dims() {
        let reference = values[(0, dim)];
        for frame in 1..values.nrows() {
            let current = values[(frame, dim)];
            let diff = current - reference;
            if diff < -PI {
                values[(frame, dim)] = current + TAU;
            } else if diff >= PI {
                values[(frame, dim)] = current - TAU;
            }
        }
    }
    Ok(())
}

/// Wraps the angular components of a difference vector against a fixed center.
///
/// No carry between components or calls: each angular entry is corrected
/// independently by [`wrap_once`].
pub fn wrap_difference(diff: &mut DVector<f64>, mask: &AngularMask) -> Result<(), MaskMismatch> {
    check_width(mask, diff.len())?;
    for dim in mask.angular_dims() {
        diff[dim] = wrap_once(diff[dim]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn wrap_once_maps_plus_pi_to_minus_pi() {
        assert_eq!(wrap_once(PI), -PI);
    }

    #[test]
    fn wrap_once_keeps_minus_pi() {
        assert_eq!(wrap_once(-PI), -PI);
    }

    #[test]
    fn wrap_once_leaves_interior_values_unchanged() {
        assert_eq!(wrap_once(0.99 * PI), 0.99 * PI);
        assert_eq!(wrap_once(-0.99 * PI), -0.99 * PI);
        assert_eq!(wrap_once(0.0), 0.0);
    }

    #[test]
    fn wrap_once_shifts_values_outside_the_branch() {
        assert!(approx(wrap_once(1.5 * PI), -0.5 * PI));
        assert!(approx(wrap_once(-1.5 * PI), 0.5 * PI));
    }

    #[test]
    fn unwrap_moves_angular_jumps_onto_reference_branch() {
        let mut values = DMatrix::from_row_slice(
            3,
            2,
            &[
                3.0, 5.0, //
                -3.0, 5.1, //
                3.1, 5.2,
            ],
        );
        let mask = AngularMask::new(vec![true, false]);
        unwrap_trajectory(&mut values, &mask).unwrap();

        assert!(approx(values[(1, 0)], -3.0 + TAU));
        assert!(approx(values[(2, 0)], 3.1));
        assert_eq!(values[(1, 1)], 5.1);
        assert_eq!(values[(2, 1)], 5.2);
    }

    #[test]
    fn unwrap_treats_jump_of_exactly_pi_as_wrap() {
        let mut values = DMatrix::from_row_slice(2, 1, &[0.0, PI]);
        let mask = AngularMask::new(vec![true]);
        unwrap_trajectory(&mut values, &mask).unwrap();
        assert!(approx(values[(1, 0)], -PI));
    }

    #[test]
    fn unwrap_is_idempotent() {
        let mut values = DMatrix::from_row_slice(
            4,
            2,
            &[
                -3.1, 0.5, //
                3.0, -3.0, //
                2.9, 3.1, //
                -2.0, 0.0,
            ],
        );
        let mask = AngularMask::new(vec![true, true]);
        unwrap_trajectory(&mut values, &mask).unwrap();
        let once = values.clone();
        unwrap_trajectory(&mut values, &mask).unwrap();
        assert_eq!(values, once);
    }

    #[test]
    fn unwrap_rejects_mask_of_wrong_length() {
        let mut values = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 1.0]);
        let mask = AngularMask::new(vec![true]);
        assert_eq!(
            unwrap_trajectory(&mut values, &mask).unwrap_err(),
            MaskMismatch { mask: 1, width: 2 }
        );
    }

    #[test]
    fn wrap_difference_touches_only_angular_dimensions() {
        let mut diff = DVector::from_vec(vec![1.5 * PI, 1.5 * PI]);
        let mask = AngularMask::new(vec![false, true]);
        wrap_difference(&mut diff, &mask).unwrap();
        assert_eq!(diff[0], 1.5 * PI);
        assert!(approx(diff[1], -0.5 * PI));
    }
}

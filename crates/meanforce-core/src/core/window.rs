use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum WindowError {
    #[error("Tail fraction must lie in (0, 1], got {0}")]
    InvalidTail(f64),
    #[error("Cannot average an empty series")]
    Empty,
}

pub fn check_tail(tail: f64) -> Result<(), WindowError> {
    if tail > 0.0 && tail <= 1.0 {
        Ok(())
    } else {
        Err(WindowError::InvalidTail(tail))
    }
}

/// First row of the trailing window: `floor(n * (1 - tail))`, capped at `n - 1`.
pub fn window_start(n: usize, tail: f64) -> usize {
    let start = (n as f64 * (1.0 - tail)).floor() as usize;
    start.min(n.saturating_sub(1))
}

/// Column-wise mean over the last `tail` fraction of the rows.
///
/// The leading rows are treated as relaxation from the previous state and
/// dropped before averaging.
pub fn trailing_mean(rows: &DMatrix<f64>, tail: f64) -> Result<DVector<f64>, WindowError> {
    check_tail(tail)?;
    let n = rows.nrows();
    if n == 0 {
        return Err(WindowError::Empty);
    }

    let start = window_start(n, tail);
    let window = rows.rows(start, n - start);
    Ok(DVector::from_iterator(
        rows.ncols(),
        window.column_iter().map(|column| column.mean()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn series() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            2,
            &[
                1.0, 10.0, //
                2.0, 20.0, //
                3.0, 30.0, //
                4.0, 40.0,
            ],
        )
    }

    #[test]
    fn window_start_follows_floor_of_discarded_fraction() {
        assert_eq!(window_start(3, 0.5), 1);
        assert_eq!(window_start(10, 0.5), 5);
        assert_eq!(window_start(10, 1.0), 0);
        assert_eq!(window_start(4, 0.25), 3);
    }

    #[test]
    fn window_start_never_passes_last_row() {
        assert_eq!(window_start(5, 1e-300), 4);
        assert_eq!(window_start(1, 0.01), 0);
    }

    #[test]
    fn full_tail_equals_plain_mean() {
        let mean = trailing_mean(&series(), 1.0).unwrap();
        assert!((mean[0] - 2.5).abs() < TOLERANCE);
        assert!((mean[1] - 25.0).abs() < TOLERANCE);
    }

    #[test]
    fn vanishing_tail_uses_last_row() {
        let mean = trailing_mean(&series(), 1e-9).unwrap();
        assert_eq!(mean.as_slice(), &[4.0, 40.0]);
    }

    #[test]
    fn half_tail_averages_trailing_half() {
        let mean = trailing_mean(&series(), 0.5).unwrap();
        assert!((mean[0] - 3.5).abs() < TOLERANCE);
        assert!((mean[1] - 35.0).abs() < TOLERANCE);
    }

    #[test]
    fn tail_outside_unit_interval_is_rejected() {
        for tail in [0.0, -0.1, 1.5, f64::NAN] {
            assert!(matches!(
                trailing_mean(&series(), tail),
                Err(WindowError::InvalidTail(_))
            ));
        }
    }

    #[test]
    fn empty_series_is_rejected() {
        let empty = DMatrix::<f64>::zeros(0, 3);
        assert_eq!(trailing_mean(&empty, 1.0), Err(WindowError::Empty));
    }
}

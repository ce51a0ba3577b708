use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FrameDataError {
    #[error("{what} contains no frames")]
    NoFrames { what: &'static str },

    #[error("{what} has no value columns after the leading index column")]
    NoColumns { what: &'static str },

    #[error("Coordinate table has {coords} frames but force table has {forces}")]
    FrameCountMismatch { coords: usize, forces: usize },

    #[error("Coordinate table has {coords} value columns but force table has {forces}")]
    WidthMismatch { coords: usize, forces: usize },

    #[error("Per-atom tables need a multiple of 3 value columns, found {columns}")]
    NotTriplets { columns: usize },

    #[error("Center vector has {found} values, expected {expected}")]
    CenterWidth { expected: usize, found: usize },
}

/// Drops the leading index/time column every trajectory table carries.
fn strip_index_column(
    table: DMatrix<f64>,
    what: &'static str,
) -> Result<DMatrix<f64>, FrameDataError> {
    if table.nrows() == 0 {
        return Err(FrameDataError::NoFrames { what });
    }
    if table.ncols() < 2 {
        return Err(FrameDataError::NoColumns { what });
    }
    Ok(table.remove_column(0))
}

/// A time series of collective variable values, one row per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CvTrajectory {
    values: DMatrix<f64>,
}

impl CvTrajectory {
    /// Wraps a raw table whose first column is the time index.
    pub fn from_table(table: DMatrix<f64>) -> Result<Self, FrameDataError> {
        let values = strip_index_column(table, "CV trajectory")?;
        Ok(Self { values })
    }

    /// Wraps CV values that carry no time column.
    pub fn from_values(values: DMatrix<f64>) -> Result<Self, FrameDataError> {
        if values.nrows() == 0 {
            return Err(FrameDataError::NoFrames {
                what: "CV trajectory",
            });
        }
        if values.ncols() == 0 {
            return Err(FrameDataError::NoColumns {
                what: "CV trajectory",
            });
        }
        Ok(Self { values })
    }

    pub fn num_frames(&self) -> usize {
        self.values.nrows()
    }

    pub fn dimension(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn into_values(self) -> DMatrix<f64> {
        self.values
    }

    pub fn frame(&self, index: usize) -> DVector<f64> {
        self.values.row(index).transpose()
    }
}

/// Per-frame Cartesian coordinates and forces of every atom in the system.
///
/// Both tables are stored without their index column and are guaranteed to
/// share frame count and width, the width being `3 * num_atoms`.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicFrames {
    coords: DMatrix<f64>,
    forces: DMatrix<f64>,
}

impl AtomicFrames {
    pub fn from_tables(
        coords: DMatrix<f64>,
        forces: DMatrix<f64>,
    ) -> Result<Self, FrameDataError> {
        let coords = strip_index_column(coords, "Coordinate table")?;
        let forces = strip_index_column(forces, "Force table")?;

        if coords.nrows() != forces.nrows() {
            return Err(FrameDataError::FrameCountMismatch {
                coords: coords.nrows(),
                forces: forces.nrows(),
            });
        }
        if coords.ncols() != forces.ncols() {
            return Err(FrameDataError::WidthMismatch {
                coords: coords.ncols(),
                forces: forces.ncols(),
            });
        }
        if coords.ncols() % 3 != 0 {
            return Err(FrameDataError::NotTriplets {
                columns: coords.ncols(),
            });
        }
        Ok(Self { coords, forces })
    }

    pub fn num_frames(&self) -> usize {
        self.coords.nrows()
    }

    pub fn num_atoms(&self) -> usize {
        self.coords.ncols() / 3
    }

    pub fn coords(&self) -> &DMatrix<f64> {
        &self.coords
    }

    pub fn forces(&self) -> &DMatrix<f64> {
        &self.forces
    }

    /// Collects the flattened xyz coordinates and forces of `atoms` (1-based ids)
    /// for one frame, in the order given.
    ///
    /// Ids must already be checked against [`Self::num_atoms`], as
    /// [`crate::core::models::selection::AtomGroups::check_within`] does.
    pub(crate) fn gather(&self, frame: usize, atoms: &[usize]) -> (Vec<f64>, Vec<f64>) {
        debug_assert!(
            atoms.iter().all(|&id| id >= 1 && id <= self.num_atoms()),
            "atom ids {:?} outside 1..={}",
            atoms,
            self.num_atoms()
        );
        let mut r = Vec::with_capacity(atoms.len() * 3);
        let mut f = Vec::with_capacity(atoms.len() * 3);
        for &id in atoms {
            let base = (id - 1) * 3;
            for axis in 0..3 {
                r.push(self.coords[(frame, base + axis)]);
                f.push(self.forces[(frame, base + axis)]);
            }
        }
        (r, f)
    }
}

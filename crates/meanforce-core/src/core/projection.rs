use nalgebra::{DMatrix, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ProjectionError {
    #[error("Position vector length {0} is not a multiple of 3")]
    NotTriplets(usize),
    #[error("CV {cv} needs {expected} atoms for this projector, got {found}")]
    UnsupportedGroup {
        cv: usize,
        expected: usize,
        found: usize,
    },
    #[error("CV {cv} references local atom {atom}, but only {available} atoms are present")]
    AtomOutOfRange {
        cv: usize,
        atom: usize,
        available: usize,
    },
    #[error("Atoms of CV {cv} coincide; the CV gradient is undefined")]
    CoincidentAtoms { cv: usize },
    #[error("CV Jacobian is rank deficient (rank {rank}, expected {expected})")]
    RankDeficient { rank: usize, expected: usize },
    #[error("Pseudo-inverse failed: {0}")]
    Decomposition(String),
    #[error("Positions or projection matrix contain non-finite entries")]
    NonFinite,
}

/// Builds the matrix that maps Cartesian forces onto CV space.
///
/// Given flattened positions `[x0, y0, z0, x1, ...]` of the selected atoms, the
/// reference CV values, and one local atom-index tuple per CV, an implementation
/// returns an `n_cv x positions.len()` matrix whose rows project atomic forces
/// onto the CV basis. The mean-force estimator only ever talks to this trait, so
/// other CV definitions can be plugged in without touching the correction logic.
pub trait CvProjector: Sync {
    fn project(
        &self,
        positions: &[f64],
        centers: &[f64],
        groups: &[Vec<usize>],
    ) -> Result<DMatrix<f64>, ProjectionError>;
}

/// Default relative cutoff below which a singular value counts as zero.
pub const DEFAULT_SINGULAR_TOLERANCE: f64 = 1e-10;

/// Interatomic distance CVs: each group is an atom pair `(i, j)` and the CV is `|r_i - r_j|`.
///
/// The projection is the Moore-Penrose pseudo-inverse of the transposed CV
/// Jacobian, computed by SVD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceProjector {
    pub singular_tolerance: f64,
}

impl Default for DistanceProjector {
    fn default() -> Self {
        Self {
            singular_tolerance: DEFAULT_SINGULAR_TOLERANCE,
        }
    }
}

impl DistanceProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows are `d|r_i - r_j| / dx`: the unit bond vector on atom `i`, its negative on atom `j`.
    pub fn jacobian(
        &self,
        positions: &[f64],
        groups: &[Vec<usize>],
    ) -> Result<DMatrix<f64>, ProjectionError> {
        if positions.len() % 3 != 0 {
            return Err(ProjectionError::NotTriplets(positions.len()));
        }
        if positions.iter().any(|v| !v.is_finite()) {
            return Err(ProjectionError::NonFinite);
        }
        let n_atoms = positions.len() / 3;
        let atom = |index: usize| {
            Vector3::new(
                positions[3 * index],
                positions[3 * index + 1],
                positions[3 * index + 2],
            )
        };

        let mut jacobian = DMatrix::zeros(groups.len(), positions.len());
        for (cv, group) in groups.iter().enumerate() {
            let &[i, j] = group.as_slice() else {
                return Err(ProjectionError::UnsupportedGroup {
                    cv,
                    expected: 2,
                    found: group.len(),
                });
            };
            for &index in &[i, j] {
                if index >= n_atoms {
                    return Err(ProjectionError::AtomOutOfRange {
                        cv,
                        atom: index,
                        available: n_atoms,
                    });
                }
            }

            let bond = atom(i) - atom(j);
            let length = bond.norm();
            if length < 1e-12 {
                return Err(ProjectionError::CoincidentAtoms { cv });
            }
            let unit = bond / length;
            for axis in 0..3 {
                jacobian[(cv, 3 * i + axis)] += unit[axis];
                jacobian[(cv, 3 * j + axis)] -= unit[axis];
            }
        }
        Ok(jacobian)
    }
}

impl CvProjector for DistanceProjector {
    fn project(
        &self,
        positions: &[f64],
        _centers: &[f64],
        groups: &[Vec<usize>],
    ) -> Result<DMatrix<f64>, ProjectionError> {
        let jacobian = self.jacobian(positions, groups)?;
        pseudo_inverse_of_transpose(jacobian, self.singular_tolerance)
    }
}

/// Returns `pinv(jacobianᵀ)`, refusing rank-deficient Jacobians.
pub fn pseudo_inverse_of_transpose(
    jacobian: DMatrix<f64>,
    relative_tolerance: f64,
) -> Result<DMatrix<f64>, ProjectionError> {
    if jacobian.iter().any(|v| !v.is_finite()) {
        return Err(ProjectionError::NonFinite);
    }
    let expected = jacobian.nrows();
    let svd = jacobian.transpose().svd(true, true);

    let largest = svd.singular_values.max();
    if !largest.is_finite() {
        return Err(ProjectionError::NonFinite);
    }
    let cutoff = largest * relative_tolerance.max(0.0);
    let rank = svd.rank(cutoff);
    if largest <= 0.0 || rank < expected {
        return Err(ProjectionError::RankDeficient { rank, expected });
    }

    let projection = svd
        .pseudo_inverse(cutoff)
        .map_err(|e| ProjectionError::Decomposition(e.to_string()))?;
    if projection.iter().any(|v| !v.is_finite()) {
        return Err(ProjectionError::NonFinite);
    }
    Ok(projection)
}

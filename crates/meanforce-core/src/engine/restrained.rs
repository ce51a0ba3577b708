use super::config::{ConfigError, RestrainedConfig};
use super::error::LabelError;
use crate::core::models::selection::AngularMask;
use crate::core::models::trajectory::{CvTrajectory, FrameDataError};
use crate::core::periodic::{unwrap_trajectory, wrap_difference};
use crate::core::window::trailing_mean;
use nalgebra::DVector;
use tracing::{debug, instrument};

/// Mean force from CV drift under harmonic restraints.
///
/// The angular columns are first unwrapped onto the branch of frame 0, the
/// trailing window is averaged, and the wrapped offset from the restraint center
/// is scaled by the force constants: `F = kappas ⊙ wrap(mean - center)`.
#[instrument(skip_all, name = "restrained_estimator")]
pub fn estimate(
    trajectory: &CvTrajectory,
    center: &DVector<f64>,
    mask: &AngularMask,
    tail: f64,
    config: &RestrainedConfig,
) -> Result<DVector<f64>, LabelError> {
    if center.len() != trajectory.dimension() {
        return Err(FrameDataError::CenterWidth {
            expected: trajectory.dimension(),
            found: center.len(),
        }
        .into());
    }

    if config.kappas.len() != trajectory.dimension() {
        return Err(ConfigError::KappaLengthMismatch {
            kappas: config.kappas.len(),
            dimension: trajectory.dimension(),
        }
        .into());
    }

    let mut values = trajectory.values().clone();
    unwrap_trajectory(&mut values, mask)?;

    let average = trailing_mean(&values, tail)?;
    debug!(?average, "Trailing-window CV average.");

    let mut diff = average - center;
    wrap_difference(&mut diff, mask)?;

    let kappas = DVector::from_column_slice(&config.kappas);
    Ok(kappas.component_mul(&diff))
}

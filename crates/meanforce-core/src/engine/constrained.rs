use super::config::ConstrainedConfig;
use super::error::LabelError;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::trajectory::{AtomicFrames, CvTrajectory};
use crate::core::projection::{CvProjector, ProjectionError};
use crate::core::window::trailing_mean;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Geometry shared by every frame of one estimation.
#[derive(Debug, Clone)]
struct Selection {
    atoms: Vec<usize>,
    local_groups: Vec<Vec<usize>>,
}

/// Mean force of a single frame under holonomic CV constraints.
///
/// `mf = B·f + kT · Σ_k ∂B[:, k]/∂x_k`, where `B` is the projector output at
/// `positions` and each partial derivative is a central difference with step
/// `step`. Every Cartesian component is perturbed, so one frame costs
/// `2 * positions.len() + 1` projector calls.
pub fn frame_mean_force<P: CvProjector + ?Sized>(
    projector: &P,
    positions: &[f64],
    forces: &[f64],
    centers: &[f64],
    groups: &[Vec<usize>],
    kbt: f64,
    step: f64,
) -> Result<DVector<f64>, ProjectionError> {
    let projection = projector.project(positions, centers, groups)?;
    let expected_shape = (groups.len(), positions.len());
    if projection.shape() != expected_shape {
        return Err(ProjectionError::Decomposition(format!(
            "projector returned a {:?} matrix, expected {:?}",
            projection.shape(),
            expected_shape
        )));
    }

    let direct = &projection * DVector::from_column_slice(forces);
    let divergence = projection_divergence(projector, positions, centers, groups, step)?;

    let mean_force = direct + divergence * kbt;
    if mean_force.iter().any(|v| !v.is_finite()) {
        return Err(ProjectionError::NonFinite);
    }
    Ok(mean_force)
}

/// `Σ_k ∂B[:, k]/∂x_k` by central differences: the trace of `dB/dx` taken over
/// the perturbed coordinate and the column axis of `B`.
pub fn projection_divergence<P: CvProjector + ?Sized>(
    projector: &P,
    positions: &[f64],
    centers: &[f64],
    groups: &[Vec<usize>],
    step: f64,
) -> Result<DVector<f64>, ProjectionError> {
    let mut divergence = DVector::zeros(groups.len());
    let mut perturbed = positions.to_vec();

    for k in 0..positions.len() {
        perturbed[k] = positions[k] + step;
        let plus = projector.project(&perturbed, centers, groups)?;
        perturbed[k] = positions[k] - step;
        let minus = projector.project(&perturbed, centers, groups)?;
        perturbed[k] = positions[k];

        for cv in 0..groups.len() {
            divergence[cv] += (plus[(cv, k)] - minus[(cv, k)]) / (2.0 * step);
        }
    }
    Ok(divergence)
}

/// Mean force from constrained-MD frames, averaged over the trailing window.
///
/// The reference CV values handed to the projector are the first frame of
/// `cv_trajectory`. Frames are processed independently and in parallel when
/// the `parallel` feature is enabled.
#[instrument(skip_all, name = "constrained_estimator")]
pub fn estimate<P: CvProjector + ?Sized>(
    cv_trajectory: &CvTrajectory,
    frames: &AtomicFrames,
    tail: f64,
    config: &ConstrainedConfig,
    projector: &P,
    reporter: &ProgressReporter,
) -> Result<DVector<f64>, LabelError> {
    config.atom_groups.check_within(frames.num_atoms())?;

    let selection = Selection {
        atoms: config.atom_groups.selected_atoms(),
        local_groups: config.atom_groups.local_groups(),
    };
    let centers: Vec<f64> = cv_trajectory.frame(0).iter().copied().collect();
    let kbt = config.kbt();
    let n_frames = frames.num_frames();

    info!(
        frames = n_frames,
        atoms = selection.atoms.len(),
        cvs = selection.local_groups.len(),
        "Projecting atomic forces onto CV space."
    );
    reporter.report(Progress::FramesStart {
        total: n_frames as u64,
    });

    let compute = |frame: usize| -> Result<DVector<f64>, LabelError> {
        let (positions, forces) = frames.gather(frame, &selection.atoms);
        let mean_force = frame_mean_force(
            projector,
            &positions,
            &forces,
            &centers,
            &selection.local_groups,
            kbt,
            config.fd_step,
        )
        .map_err(|source| LabelError::Projection { frame, source })?;
        reporter.report(Progress::FrameDone);
        Ok(mean_force)
    };

    #[cfg(not(feature = "parallel"))]
    let per_frame: Result<Vec<_>, LabelError> = (0..n_frames).map(compute).collect();

    #[cfg(feature = "parallel")]
    let per_frame: Result<Vec<_>, LabelError> = (0..n_frames).into_par_iter().map(compute).collect();

    let per_frame = per_frame?;
    reporter.report(Progress::FramesFinish);

    let n_cvs = selection.local_groups.len();
    let table = DMatrix::from_fn(n_frames, n_cvs, |frame, cv| per_frame[frame][cv]);
    let average = trailing_mean(&table, tail)?;
    debug!(?average, "Trailing-window mean force.");
    Ok(average)
}

use crate::core::io::table::TextTable;
use crate::core::models::trajectory::{AtomicFrames, CvTrajectory, FrameDataError};
use crate::core::projection::{CvProjector, DistanceProjector};
use crate::engine::config::{ConfigError, Estimator, LabelConfig};
use crate::engine::convert::{FrameConverter, GmxTrajConverter};
use crate::engine::error::LabelError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::{constrained, restrained};
use nalgebra::{DMatrix, DVector};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

/// Mean-force row written on success.
pub const FORCE_FILE: &str = "force.out";
/// Per-frame coordinates echoed by the constrained estimator.
pub const COORD_FILE: &str = "coord.xvg";
/// Per-frame forces echoed by the constrained estimator.
pub const FORCE_TABLE_FILE: &str = "force.xvg";

/// Where the constrained estimator gets its per-frame atomic data.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameSource {
    /// Ready-made `[index, x, y, z, ...]` tables.
    Tables { coords: PathBuf, forces: PathBuf },
    /// An MD trajectory plus topology, converted through a [`FrameConverter`].
    Trajectory {
        trajectory: PathBuf,
        topology: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelInputs {
    /// Output directory of this task; created if missing.
    pub task_dir: PathBuf,
    /// CV time series, first column the time index.
    pub cv_series: PathBuf,
    /// Restraint centers (restrained only).
    pub centers: Option<PathBuf>,
    /// Atomic frames (constrained only).
    pub frames: Option<FrameSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelOutput {
    pub mean_force: Vec<f64>,
    pub forces: PathBuf,
    pub frame_coords: Option<PathBuf>,
    pub frame_forces: Option<PathBuf>,
}

/// Labels one task with the default distance projector and `gmx` converter.
pub fn run(
    inputs: &LabelInputs,
    config: &LabelConfig,
    reporter: &ProgressReporter,
) -> Result<LabelOutput, LabelError> {
    run_with(
        inputs,
        config,
        &DistanceProjector::default(),
        &GmxTrajConverter::default(),
        reporter,
    )
}

/// Estimates the mean force of one task and writes it to the task directory.
///
/// Nothing is written unless the estimate succeeds.
#[instrument(skip_all, name = "label_workflow", fields(method = %config.estimator.method()))]
pub fn run_with<P, C>(
    inputs: &LabelInputs,
    config: &LabelConfig,
    projector: &P,
    converter: &C,
    reporter: &ProgressReporter,
) -> Result<LabelOutput, LabelError>
where
    P: CvProjector + ?Sized,
    C: FrameConverter + ?Sized,
{
    check_inputs(inputs, config)?;
    info!("Labeling task {:?}.", inputs.task_dir);

    let cv_trajectory = reporter.phase("Loading CV series", || {
        let table = load_table(&inputs.cv_series)?;
        Ok::<_, LabelError>(CvTrajectory::from_table(table)?)
    })?;
    config.check_dimension(cv_trajectory.dimension())?;
    debug!(
        frames = cv_trajectory.num_frames(),
        dimension = cv_trajectory.dimension(),
        "Loaded CV series."
    );

    let (mean_force, frames) = match &config.estimator {
        Estimator::Restrained(restrained_config) => {
            let center_path = inputs
                .centers
                .as_ref()
                .ok_or(ConfigError::MissingParameter("centers"))?;
            let center = load_center(center_path, cv_trajectory.dimension())?;
            let mean_force = reporter.phase("Restrained estimate", || {
                restrained::estimate(
                    &cv_trajectory,
                    &center,
                    &config.angular_mask,
                    config.tail,
                    restrained_config,
                )
            })?;
            (mean_force, None)
        }
        Estimator::Constrained(constrained_config) => {
            let source = inputs
                .frames
                .as_ref()
                .ok_or(ConfigError::MissingParameter("frames"))?;
            let frames = reporter.phase("Loading atomic frames", || {
                load_frames(source, converter, reporter)
            })?;
            let mean_force = reporter.phase("Constrained estimate", || {
                constrained::estimate(
                    &cv_trajectory,
                    &frames,
                    config.tail,
                    constrained_config,
                    projector,
                    reporter,
                )
            })?;
            (mean_force, Some(frames))
        }
    };

    let output = write_outputs(&inputs.task_dir, &mean_force, frames.as_ref())?;
    info!("Mean force written to {:?}.", output.forces);
    Ok(output)
}

fn check_inputs(inputs: &LabelInputs, config: &LabelConfig) -> Result<(), ConfigError> {
    match config.estimator {
        Estimator::Restrained(_) if inputs.centers.is_none() => {
            Err(ConfigError::MissingParameter("centers"))
        }
        Estimator::Constrained(_) if inputs.frames.is_none() => {
            Err(ConfigError::MissingParameter("frames"))
        }
        _ => Ok(()),
    }
}

fn load_table(path: &Path) -> Result<DMatrix<f64>, LabelError> {
    TextTable::read_from_path(path).map_err(|source| LabelError::Table {
        path: path.to_path_buf(),
        source,
    })
}

/// First row of the center file, with or without a leading time column.
fn load_center(path: &Path, dimension: usize) -> Result<DVector<f64>, LabelError> {
    let table = load_table(path)?;
    let row = table.row(0);
    let values: Vec<f64> = if row.len() == dimension {
        row.iter().copied().collect()
    } else if row.len() == dimension + 1 {
        row.iter().skip(1).copied().collect()
    } else {
        return Err(FrameDataError::CenterWidth {
            expected: dimension,
            found: row.len(),
        }
        .into());
    };
    Ok(DVector::from_vec(values))
}

fn load_frames<C>(
    source: &FrameSource,
    converter: &C,
    reporter: &ProgressReporter,
) -> Result<AtomicFrames, LabelError>
where
    C: FrameConverter + ?Sized,
{
    let (coords, forces) = match source {
        FrameSource::Tables { coords, forces } => (load_table(coords)?, load_table(forces)?),
        FrameSource::Trajectory {
            trajectory,
            topology,
        } => {
            let scratch = tempfile::Builder::new()
                .prefix("meanforce-")
                .tempdir()
                .map_err(|source| LabelError::Io {
                    path: std::env::temp_dir(),
                    source,
                })?;
            reporter.report(Progress::Message(format!(
                "Extracting coordinates and forces from {}",
                trajectory.display()
            )));
            let coord_path = scratch.path().join(COORD_FILE);
            let force_path = scratch.path().join(FORCE_TABLE_FILE);
            converter.generate_coords(trajectory, topology, &coord_path)?;
            converter.generate_forces(trajectory, topology, &force_path)?;
            (load_table(&coord_path)?, load_table(&force_path)?)
        }
    };
    Ok(AtomicFrames::from_tables(coords, forces)?)
}

/// Writes the frame echoes first and `force.out` last, each staged in a temporary
/// file inside `task_dir` and renamed into place.
///
/// `force.out` only appears once everything else has been written, so its
/// presence marks a completed task.
fn write_outputs(
    task_dir: &Path,
    mean_force: &DVector<f64>,
    frames: Option<&AtomicFrames>,
) -> Result<LabelOutput, LabelError> {
    std::fs::create_dir_all(task_dir).map_err(io_err(task_dir))?;

    let coord_path = task_dir.join(COORD_FILE);
    let force_table_path = task_dir.join(FORCE_TABLE_FILE);
    if let Some(frames) = frames {
        write_staged(task_dir, &coord_path, |w| {
            TextTable::write_to(frames.coords(), w)
        })?;
        write_staged(task_dir, &force_table_path, |w| {
            TextTable::write_to(frames.forces(), w)
        })?;
    }

    let force_path = task_dir.join(FORCE_FILE);
    write_staged(task_dir, &force_path, |w| {
        TextTable::write_row_to(mean_force.iter().copied(), w)?;
        w.flush()
    })?;

    Ok(LabelOutput {
        mean_force: mean_force.iter().copied().collect(),
        forces: force_path,
        frame_coords: coord_path.exists().then_some(coord_path),
        frame_forces: force_table_path.exists().then_some(force_table_path),
    })
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> LabelError {
    let path = path.to_path_buf();
    move |source| LabelError::Io { path, source }
}

/// Writes through a temporary file in `dir`, then renames it onto `target`.
fn write_staged<F>(dir: &Path, target: &Path, write: F) -> Result<(), LabelError>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> std::io::Result<()>,
{
    let mut staged = NamedTempFile::new_in(dir).map_err(io_err(target))?;
    {
        let mut writer = BufWriter::new(&mut staged);
        write(&mut writer).map_err(io_err(target))?;
    }
    staged
        .persist(target)
        .map_err(|e| io_err(target)(e.error))?;
    debug!("Wrote {:?}", target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::table::TableError;
    use crate::engine::config::{LabelConfigBuilder, Method};
    use crate::engine::convert::ConvertError;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::{TempDir, tempdir};

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn restrained_config(kappas: Vec<f64>, tail: f64) -> LabelConfig {
        LabelConfigBuilder::new()
            .method(Method::Restrained)
            .angular_mask(vec![0; kappas.len()])
            .kappas(kappas)
            .tail(tail)
            .build()
            .unwrap()
    }

    fn constrained_config() -> LabelConfig {
        LabelConfigBuilder::new()
            .method(Method::Constrained)
            .angular_mask(vec![0])
            .selected_atomid(vec![vec![1, 2]])
            .tail(1.0)
            .build()
            .unwrap()
    }

    /// Writes pre-baked tables instead of calling out to GROMACS.
    struct CannedConverter {
        coords: String,
        forces: String,
    }

    impl FrameConverter for CannedConverter {
        fn generate_coords(
            &self,
            _trajectory: &Path,
            _topology: &Path,
            out: &Path,
        ) -> Result<(), ConvertError> {
            fs::write(out, &self.coords).unwrap();
            Ok(())
        }

        fn generate_forces(
            &self,
            _trajectory: &Path,
            _topology: &Path,
            out: &Path,
        ) -> Result<(), ConvertError> {
            fs::write(out, &self.forces).unwrap();
            Ok(())
        }
    }

    #[test]
    fn restrained_run_writes_single_force_row() {
        let dir = tempdir().unwrap();
        let inputs = LabelInputs {
            task_dir: dir.path().join("task.000"),
            cv_series: write(&dir, "plm.out", "0 1.0\n1 1.02\n2 1.04\n"),
            centers: Some(write(&dir, "centers.out", "1.0\n")),
            frames: None,
        };

        let output = run(&inputs, &restrained_config(vec![100.0], 0.5), &ProgressReporter::new())
            .unwrap();

        assert!((output.mean_force[0] - 3.0).abs() < 1e-9);
        assert_eq!(output.forces, inputs.task_dir.join(FORCE_FILE));
        assert!(output.frame_coords.is_none());
        assert!(output.frame_forces.is_none());
        let content = fs::read_to_string(&output.forces).unwrap();
        assert!(content.starts_with("3.00000000"));
        assert!(content.ends_with("e+00\n"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn center_file_may_carry_a_time_column() {
        let dir = tempdir().unwrap();
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: write(&dir, "plm.out", "0 2.0 3.0\n1 2.0 3.0\n"),
            centers: Some(write(&dir, "centers.out", "0 1.5 3.5\n")),
            frames: None,
        };
        let output = run(
            &inputs,
            &restrained_config(vec![2.0, 4.0], 1.0),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!((output.mean_force[0] - 1.0).abs() < 1e-12);
        assert!((output.mean_force[1] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn restrained_without_centers_fails_before_touching_disk() {
        let dir = tempdir().unwrap();
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: dir.path().join("does-not-exist.out"),
            centers: None,
            frames: None,
        };
        let err = run(&inputs, &restrained_config(vec![1.0], 1.0), &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(
            err,
            LabelError::Config(ConfigError::MissingParameter("centers"))
        ));
        assert!(!inputs.task_dir.exists());
    }

    #[test]
    fn mask_width_mismatch_writes_nothing() {
        let dir = tempdir().unwrap();
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: write(&dir, "plm.out", "0 1.0 2.0\n"),
            centers: Some(write(&dir, "centers.out", "1.0 2.0\n")),
            frames: None,
        };
        let err = run(&inputs, &restrained_config(vec![1.0], 1.0), &ProgressReporter::new())
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(!inputs.task_dir.exists());
    }

    #[test]
    fn non_numeric_cv_series_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let cv_series = write(&dir, "plm.out", "0 1.0\n1 nope\n");
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: cv_series.clone(),
            centers: Some(write(&dir, "centers.out", "1.0\n")),
            frames: None,
        };
        let err = run(&inputs, &restrained_config(vec![1.0], 1.0), &ProgressReporter::new())
            .unwrap_err();
        match err {
            LabelError::Table { path, source } => {
                assert_eq!(path, cv_series);
                assert!(matches!(source, TableError::InvalidNumber { line: 2, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!inputs.task_dir.exists());
    }

    #[test]
    fn constrained_run_from_tables_echoes_frames() {
        let dir = tempdir().unwrap();
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: write(&dir, "plm.out", "0 1.0\n1 1.0\n"),
            centers: None,
            frames: Some(FrameSource::Tables {
                coords: write(
                    &dir,
                    "coord.xvg",
                    "@ title \"coords\"\n0 0 0 0 1 0 0\n1 0 0 0 1 0 0\n",
                ),
                forces: write(
                    &dir,
                    "force.xvg",
                    "# forces\n0 -3 0 0 3 0 0\n1 -3 0 0 3 0 0\n",
                ),
            }),
        };

        let config = constrained_config();
        let output = run(&inputs, &config, &ProgressReporter::new()).unwrap();

        let Estimator::Constrained(c) = &config.estimator else {
            unreachable!()
        };
        assert!((output.mean_force[0] - (3.0 + 2.0 * c.kbt())).abs() < 1e-5);

        let coords = output.frame_coords.expect("coordinates echoed");
        let echoed = TextTable::read_from_path(&coords).unwrap();
        assert_eq!(echoed.shape(), (2, 6));
        assert_eq!(echoed[(0, 3)], 1.0);
        assert!(output.frame_forces.is_some());
    }

    #[test]
    fn constrained_run_converts_trajectory_through_collaborator() {
        let dir = tempdir().unwrap();
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: write(&dir, "plm.out", "0 1.0\n"),
            centers: None,
            frames: Some(FrameSource::Trajectory {
                trajectory: dir.path().join("md.trr"),
                topology: dir.path().join("topol.tpr"),
            }),
        };
        let converter = CannedConverter {
            coords: "0 0 0 0 0 0 2\n".to_string(),
            forces: "0 0 0 0 0 0 0\n".to_string(),
        };

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        let config = constrained_config();
        let output = run_with(
            &inputs,
            &config,
            &DistanceProjector::default(),
            &converter,
            &reporter,
        )
        .unwrap();

        assert!(
            events
                .lock()
                .unwrap()
                .iter()
                .any(|e| matches!(e, Progress::Message(msg) if msg.contains("md.trr")))
        );

        let Estimator::Constrained(c) = &config.estimator else {
            unreachable!()
        };
        // Zero forces leave only the curvature term, 2 kT / d with d = 2.
        assert!((output.mean_force[0] - c.kbt()).abs() < 1e-5);
    }

    #[test]
    fn mismatched_frame_counts_are_a_data_error() {
        let dir = tempdir().unwrap();
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: write(&dir, "plm.out", "0 1.0\n"),
            centers: None,
            frames: Some(FrameSource::Tables {
                coords: write(&dir, "c.xvg", "0 0 0 0 1 0 0\n1 0 0 0 1 0 0\n"),
                forces: write(&dir, "f.xvg", "0 0 0 0 0 0 0\n"),
            }),
        };
        let err = run(&inputs, &constrained_config(), &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            LabelError::Data(FrameDataError::FrameCountMismatch {
                coords: 2,
                forces: 1
            })
        ));
        assert!(!inputs.task_dir.exists());
    }

    #[test]
    fn constrained_without_frames_is_a_config_error() {
        let dir = tempdir().unwrap();
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: write(&dir, "plm.out", "0 1.0\n"),
            centers: None,
            frames: None,
        };
        let err = run(&inputs, &constrained_config(), &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            LabelError::Config(ConfigError::MissingParameter("frames"))
        ));
    }

    #[test]
    fn nan_in_cv_series_is_rejected_before_estimation() {
        let dir = tempdir().unwrap();
        let cv_series = write(&dir, "plm.out", "0 1.0\n1 nan\n2 1.04\n");
        let inputs = LabelInputs {
            task_dir: dir.path().join("task"),
            cv_series: cv_series.clone(),
            centers: Some(write(&dir, "centers.out", "1.0\n")),
            frames: None,
        };
        let err = run(&inputs, &restrained_config(vec![100.0], 1.0), &ProgressReporter::new())
            .unwrap_err();
        match err {
            LabelError::Table { path, source } => {
                assert_eq!(path, cv_series);
                assert!(matches!(source, TableError::NonFinite { line: 2, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!inputs.task_dir.join(FORCE_FILE).exists());
    }

    #[test]
    fn failed_frame_echo_leaves_no_force_file() {
        let dir = tempdir().unwrap();
        let task_dir = dir.path().join("task");
        // A directory squatting on the echo path makes the rename fail.
        fs::create_dir_all(task_dir.join(COORD_FILE)).unwrap();
        let inputs = LabelInputs {
            task_dir: task_dir.clone(),
            cv_series: write(&dir, "plm.out", "0 1.0\n"),
            centers: None,
            frames: Some(FrameSource::Tables {
                coords: write(&dir, "c.xvg", "0 0 0 0 1 0 0\n"),
                forces: write(&dir, "f.xvg", "0 0 0 0 0 0 0\n"),
            }),
        };

        let err = run(&inputs, &constrained_config(), &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, LabelError::Io { ref path, .. } if *path == task_dir.join(COORD_FILE)));
        assert!(!task_dir.join(FORCE_FILE).exists());
        assert!(!task_dir.join(FORCE_TABLE_FILE).exists());
    }

    #[test]
    fn force_file_is_replaced_whole_on_rerun() {
        let dir = tempdir().unwrap();
        let task_dir = dir.path().join("task");
        fs::create_dir_all(&task_dir).unwrap();
        fs::write(task_dir.join(FORCE_FILE), "stale contents from an earlier run\n").unwrap();
        let inputs = LabelInputs {
            task_dir: task_dir.clone(),
            cv_series: write(&dir, "plm.out", "0 1.0\n1 1.02\n2 1.04\n"),
            centers: Some(write(&dir, "centers.out", "1.0\n")),
            frames: None,
        };

        run(&inputs, &restrained_config(vec![100.0], 0.5), &ProgressReporter::new()).unwrap();

        let content = fs::read_to_string(task_dir.join(FORCE_FILE)).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("3.00000000"));
        let leftovers = fs::read_dir(&task_dir).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}

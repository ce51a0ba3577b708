use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("'{program}' reported success but did not write '{path}'", path = path.display())]
    MissingOutput { program: String, path: PathBuf },
}

/// Produces per-frame coordinate and force tables from an MD trajectory.
///
/// Output files use the `[index, x1, y1, z1, x2, ...]` row layout read by
/// [`crate::core::io::table::TextTable`].
pub trait FrameConverter {
    fn generate_coords(
        &self,
        trajectory: &Path,
        topology: &Path,
        out: &Path,
    ) -> Result<(), ConvertError>;

    fn generate_forces(
        &self,
        trajectory: &Path,
        topology: &Path,
        out: &Path,
    ) -> Result<(), ConvertError>;
}

/// Runs `gmx traj`, answering the group prompt with group 0 (the whole system).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmxTrajConverter {
    pub executable: PathBuf,
}

impl Default for GmxTrajConverter {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("gmx"),
        }
    }
}

impl GmxTrajConverter {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn run_traj(
        &self,
        trajectory: &Path,
        topology: &Path,
        output_flag: &str,
        out: &Path,
    ) -> Result<(), ConvertError> {
        let program = self.executable.display().to_string();
        info!(
            "Running {} traj {} {:?} on {:?}",
            program, output_flag, out, trajectory
        );

        let mut child = Command::new(&self.executable)
            .arg("traj")
            .arg("-f")
            .arg(trajectory)
            .arg("-s")
            .arg(topology)
            .arg(output_flag)
            .arg(out)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A tool that exits without reading the prompt closes the pipe early;
            // its exit status is what matters.
            match stdin.write_all(b"0\n") {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(ConvertError::Spawn {
                        program,
                        source: e,
                    });
                }
                _ => {}
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|source| ConvertError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(ConvertError::Failed {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !out.exists() {
            return Err(ConvertError::MissingOutput {
                program,
                path: out.to_path_buf(),
            });
        }
        debug!("Wrote {:?}", out);
        Ok(())
    }
}

impl FrameConverter for GmxTrajConverter {
    fn generate_coords(
        &self,
        trajectory: &Path,
        topology: &Path,
        out: &Path,
    ) -> Result<(), ConvertError> {
        self.run_traj(trajectory, topology, "-ox", out)
    }

    fn generate_forces(
        &self,
        trajectory: &Path,
        topology: &Path,
        out: &Path,
    ) -> Result<(), ConvertError> {
        self.run_traj(trajectory, topology, "-of", out)
    }
}

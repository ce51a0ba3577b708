use super::config::ConfigError;
use super::convert::ConvertError;
use crate::core::io::table::TableError;
use crate::core::models::selection::SelectionError;
use crate::core::models::trajectory::FrameDataError;
use crate::core::periodic::MaskMismatch;
use crate::core::projection::ProjectionError;
use crate::core::window::WindowError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input data: {0}")]
    Data(#[from] FrameDataError),

    #[error("Failed to read table '{path}': {source}", path = path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    #[error("Projection failed at frame {frame}: {source}")]
    Projection {
        frame: usize,
        #[source]
        source: ProjectionError,
    },

    #[error("Trajectory conversion failed: {0}")]
    Conversion(#[from] ConvertError),

    #[error("I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LabelError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, LabelError::Config(_))
    }
}

impl From<WindowError> for LabelError {
    fn from(e: WindowError) -> Self {
        match e {
            WindowError::InvalidTail(_) => LabelError::Config(ConfigError::Tail(e)),
            WindowError::Empty => LabelError::Data(FrameDataError::NoFrames {
                what: "Averaging window",
            }),
        }
    }
}

impl From<MaskMismatch> for LabelError {
    fn from(e: MaskMismatch) -> Self {
        LabelError::Config(ConfigError::MaskLengthMismatch {
            mask: e.mask,
            width: e.width,
        })
    }
}

impl From<SelectionError> for LabelError {
    fn from(e: SelectionError) -> Self {
        LabelError::Config(ConfigError::Selection(e))
    }
}

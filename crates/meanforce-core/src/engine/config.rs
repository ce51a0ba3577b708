use crate::core::models::selection::{AngularMask, AtomGroups, SelectionError};
use crate::core::window::{WindowError, check_tail};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Boltzmann constant in kJ/(mol·K).
pub const BOLTZMANN_KJ_PER_MOL_K: f64 = 0.0083148648645;

/// Reference temperature of the constraint correction when none is configured.
pub const REFERENCE_TEMPERATURE_K: f64 = 372.18045;

/// Central-difference step for the projector derivative, in nm.
pub const DEFAULT_FD_STEP_NM: f64 = 1e-4;

pub const DEFAULT_TAIL: f64 = 0.9;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Unknown estimator method '{0}'. Expected 'restrained' or 'constrained'.")]
    UnknownMethod(String),

    #[error("Angular mask has {mask} entries but the CV data has {width} dimensions")]
    MaskLengthMismatch { mask: usize, width: usize },

    #[error("Got {kappas} force constants for {dimension} CV dimensions")]
    KappaLengthMismatch { kappas: usize, dimension: usize },

    #[error("Force constant {index} is not finite ({value})")]
    InvalidKappa { index: usize, value: f64 },

    #[error("{0}")]
    Tail(#[from] WindowError),

    #[error("Temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),

    #[error("Finite-difference step must be positive and finite, got {0}")]
    InvalidStep(f64),

    #[error("Invalid CV selection: {0}")]
    Selection(#[from] SelectionError),
}

/// The closed set of supported estimators, as named in label configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Restrained,
    Constrained,
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restrained" => Ok(Method::Restrained),
            "constrained" => Ok(Method::Constrained),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Restrained => f.write_str("restrained"),
            Method::Constrained => f.write_str("constrained"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestrainedConfig {
    pub kappas: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstrainedConfig {
    pub atom_groups: AtomGroups,
    pub temperature: f64,
    pub fd_step: f64,
}

impl ConstrainedConfig {
    pub fn kbt(&self) -> f64 {
        BOLTZMANN_KJ_PER_MOL_K * self.temperature
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Estimator {
    Restrained(RestrainedConfig),
    Constrained(ConstrainedConfig),
}

impl Estimator {
    pub fn method(&self) -> Method {
        match self {
            Estimator::Restrained(_) => Method::Restrained,
            Estimator::Constrained(_) => Method::Constrained,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelConfig {
    pub angular_mask: AngularMask,
    pub tail: f64,
    pub estimator: Estimator,
}

impl LabelConfig {
    /// Checks the mask against the CV width observed in the data.
    pub fn check_dimension(&self, width: usize) -> Result<(), ConfigError> {
        if self.angular_mask.len() != width {
            return Err(ConfigError::MaskLengthMismatch {
                mask: self.angular_mask.len(),
                width,
            });
        }
        if let Estimator::Restrained(restrained) = &self.estimator {
            if restrained.kappas.len() != width {
                return Err(ConfigError::KappaLengthMismatch {
                    kappas: restrained.kappas.len(),
                    dimension: width,
                });
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct LabelConfigBuilder {
    method: Option<Method>,
    angular_mask: Option<Vec<i64>>,
    kappas: Option<Vec<f64>>,
    selected_atomid: Option<Vec<Vec<i64>>>,
    tail: Option<f64>,
    temperature: Option<f64>,
    fd_step: Option<f64>,
}

impl LabelConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }
    pub fn angular_mask(mut self, flags: Vec<i64>) -> Self {
        self.angular_mask = Some(flags);
        self
    }
    pub fn kappas(mut self, kappas: Vec<f64>) -> Self {
        self.kappas = Some(kappas);
        self
    }
    pub fn selected_atomid(mut self, groups: Vec<Vec<i64>>) -> Self {
        self.selected_atomid = Some(groups);
        self
    }
    pub fn tail(mut self, tail: f64) -> Self {
        self.tail = Some(tail);
        self
    }
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn fd_step(mut self, step: f64) -> Self {
        self.fd_step = Some(step);
        self
    }

    pub fn build(self) -> Result<LabelConfig, ConfigError> {
        let method = self.method.ok_or(ConfigError::MissingParameter("method"))?;
        let angular_mask = AngularMask::from_flags(
            &self
                .angular_mask
                .ok_or(ConfigError::MissingParameter("angular_mask"))?,
        )?;
        let tail = self.tail.unwrap_or(DEFAULT_TAIL);
        check_tail(tail)?;

        let estimator = match method {
            Method::Restrained => {
                let kappas = self.kappas.ok_or(ConfigError::MissingParameter("kappas"))?;
                if let Some((index, &value)) =
                    kappas.iter().enumerate().find(|(_, k)| !k.is_finite())
                {
                    return Err(ConfigError::InvalidKappa { index, value });
                }
                if kappas.len() != angular_mask.len() {
                    return Err(ConfigError::KappaLengthMismatch {
                        kappas: kappas.len(),
                        dimension: angular_mask.len(),
                    });
                }
                Estimator::Restrained(RestrainedConfig { kappas })
            }
            Method::Constrained => {
                let raw_groups = self
                    .selected_atomid
                    .ok_or(ConfigError::MissingParameter("selected_atomid"))?;
                if raw_groups.is_empty() {
                    return Err(ConfigError::MissingParameter("selected_atomid"));
                }
                let atom_groups = AtomGroups::new(&raw_groups)?;

                let temperature = self.temperature.unwrap_or(REFERENCE_TEMPERATURE_K);
                if !(temperature.is_finite() && temperature > 0.0) {
                    return Err(ConfigError::InvalidTemperature(temperature));
                }
                let fd_step = self.fd_step.unwrap_or(DEFAULT_FD_STEP_NM);
                if !(fd_step.is_finite() && fd_step > 0.0) {
                    return Err(ConfigError::InvalidStep(fd_step));
                }
                Estimator::Constrained(ConstrainedConfig {
                    atom_groups,
                    temperature,
                    fd_step,
                })
            }
        };

        Ok(LabelConfig {
            angular_mask,
            tail,
            estimator,
        })
    }
}

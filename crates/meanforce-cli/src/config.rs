use crate::cli::LabelArgs;
use crate::error::{CliError, Result};
use meanforce::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialCvConfig {
    #[serde(rename = "angular-mask")]
    angular_mask: Option<Vec<i64>>,
    #[serde(rename = "selected-atomid")]
    selected_atomid: Option<Vec<Vec<i64>>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialLabelConfig {
    method: Option<String>,
    kappas: Option<Vec<f64>>,
    tail: Option<f64>,
    temperature: Option<f64>,
    #[serde(rename = "fd-step")]
    fd_step: Option<f64>,
}

/// Label settings as read from a TOML file, before CLI overrides are applied.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    cv: Option<PartialCvConfig>,
    label: Option<PartialLabelConfig>,
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn merge_with_cli(mut self, args: &LabelArgs) -> Result<core_config::LabelConfig> {
        self.apply_set_values(&args.set_values)?;

        let cv_config = self.cv.take().unwrap_or_default();
        let label_config = self.label.take().unwrap_or_default();

        let method_name = label_config.method.ok_or_else(|| {
            CliError::Config("`label.method` is required in the config file.".to_string())
        })?;
        let method = core_config::Method::from_str(&method_name)
            .map_err(|e| CliError::Config(e.to_string()))?;
        let angular_mask = cv_config.angular_mask.ok_or_else(|| {
            CliError::Config("`cv.angular-mask` is required in the config file.".to_string())
        })?;

        let mut builder = core_config::LabelConfigBuilder::new()
            .method(method)
            .angular_mask(angular_mask)
            .tail(
                args.tail
                    .or(label_config.tail)
                    .unwrap_or(core_config::DEFAULT_TAIL),
            );

        if let Some(kappas) = label_config.kappas {
            builder = builder.kappas(kappas);
        }
        if let Some(groups) = cv_config.selected_atomid {
            builder = builder.selected_atomid(groups);
        }
        if let Some(temperature) = args.temperature.or(label_config.temperature) {
            builder = builder.temperature(temperature);
        }
        if let Some(step) = label_config.fd_step {
            builder = builder.fd_step(step);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;

            match key {
                "label.method" => {
                    self.label.get_or_insert_with(Default::default).method =
                        Some(value_str.to_string());
                }
                "label.kappas" => {
                    self.label.get_or_insert_with(Default::default).kappas =
                        Some(parse_list(key, value_str)?);
                }
                "label.tail" => {
                    self.label.get_or_insert_with(Default::default).tail =
                        Some(parse_value(key, value_str)?);
                }
                "label.temperature" => {
                    self.label.get_or_insert_with(Default::default).temperature =
                        Some(parse_value(key, value_str)?);
                }
                "label.fd-step" => {
                    self.label.get_or_insert_with(Default::default).fd_step =
                        Some(parse_value(key, value_str)?);
                }
                "cv.angular-mask" => {
                    self.cv.get_or_insert_with(Default::default).angular_mask =
                        Some(parse_list(key, value_str)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value_str: &str) -> Result<T> {
    value_str.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: {}", key, value_str))
    })
}

/// Accepts `1,0,1` as well as the bracketed TOML form `[1, 0, 1]`.
fn parse_list<T: FromStr>(key: &str, value_str: &str) -> Result<Vec<T>> {
    let inner = value_str.trim();
    let inner = inner
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(inner);
    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_value(key, item))
        .collect()
}

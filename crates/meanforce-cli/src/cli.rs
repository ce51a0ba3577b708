use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "meanforce - Estimate the mean force along collective variables from restrained or constrained MD segments.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Label one MD segment with its mean force and write `force.out` to the task directory.
    Label(LabelArgs),
}

/// Arguments for the `label` subcommand.
#[derive(Args, Debug)]
pub struct LabelArgs {
    // --- Core Arguments ---
    /// Path to the configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Task directory receiving the outputs; created if missing.
    #[arg(short = 'o', long, required = true, value_name = "PATH")]
    pub task_dir: PathBuf,

    /// CV time series (e.g. a PLUMED COLVAR file), first column is time.
    #[arg(long, required = true, value_name = "PATH")]
    pub cv_series: PathBuf,

    // --- Restrained Inputs ---
    /// Restraint centers; the first row is used.
    #[arg(long, value_name = "PATH")]
    pub centers: Option<PathBuf>,

    // --- Constrained Inputs ---
    /// Per-frame coordinate table `[index, x1, y1, z1, ...]`.
    #[arg(long, value_name = "PATH", requires = "forces", conflicts_with = "trajectory")]
    pub coords: Option<PathBuf>,

    /// Per-frame force table `[index, fx1, fy1, fz1, ...]`.
    #[arg(long, value_name = "PATH", requires = "coords")]
    pub forces: Option<PathBuf>,

    /// MD trajectory to convert with `gmx traj` instead of passing tables.
    #[arg(long, value_name = "PATH", requires = "topology")]
    pub trajectory: Option<PathBuf>,

    /// Run input (topology) matching `--trajectory`.
    #[arg(long, value_name = "PATH", requires = "trajectory")]
    pub topology: Option<PathBuf>,

    // --- Overrides ---
    /// Override `label.tail`, the trailing fraction of frames to average.
    #[arg(short, long, value_name = "FLOAT")]
    pub tail: Option<f64>,

    /// Override `label.temperature` in kelvin.
    #[arg(long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S label.fd-step=5e-5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

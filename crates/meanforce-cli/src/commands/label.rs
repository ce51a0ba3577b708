use crate::cli::LabelArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use meanforce::engine::progress::ProgressReporter;
use meanforce::workflows::label::{self, FrameSource, LabelInputs, LabelOutput};
use tracing::info;

fn frame_source(args: &LabelArgs) -> Option<FrameSource> {
    match (&args.coords, &args.forces, &args.trajectory, &args.topology) {
        (Some(coords), Some(forces), _, _) => Some(FrameSource::Tables {
            coords: coords.clone(),
            forces: forces.clone(),
        }),
        (_, _, Some(trajectory), Some(topology)) => Some(FrameSource::Trajectory {
            trajectory: trajectory.clone(),
            topology: topology.clone(),
        }),
        _ => None,
    }
}

fn build_inputs(args: &LabelArgs) -> LabelInputs {
    LabelInputs {
        task_dir: args.task_dir.clone(),
        cv_series: args.cv_series.clone(),
        centers: args.centers.clone(),
        frames: frame_source(args),
    }
}

fn execute(args: &LabelArgs, reporter: &ProgressReporter) -> Result<LabelOutput> {
    let partial_config = PartialConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_with_cli(args)?;

    let inputs = build_inputs(args);
    info!(
        "Labeling {:?} with the {} estimator...",
        &inputs.task_dir,
        final_config.estimator.method()
    );
    Ok(label::run(&inputs, &final_config, reporter)?)
}

pub fn run(args: LabelArgs) -> Result<()> {
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Estimating mean force...");
    let output = execute(&args, &reporter)?;

    let formatted: Vec<String> = output
        .mean_force
        .iter()
        .map(|f| format!("{:.6}", f))
        .collect();
    println!("✓ Mean force [{}]", formatted.join(", "));
    println!("  Written to: {}", output.forces.display());
    for artifact in [&output.frame_coords, &output.frame_forces]
        .into_iter()
        .flatten()
    {
        println!("  Frame table: {}", artifact.display());
    }

    Ok(())
}

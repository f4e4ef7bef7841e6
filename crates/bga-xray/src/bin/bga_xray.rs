//! bga-xray CLI: inspect BGA X-ray images against a recipe, or teach a recipe from a golden board.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bga_xray::detect::{gray_view, load_gray, ImageInputError};
use bga_xray::inspect::{
    InspectConfig, InspectIoError, InspectReport, Inspector, InspectorParams, Recipe,
};
use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Json(#[from] InspectIoError),
    #[error(transparent)]
    Image(#[from] ImageInputError),
    #[error("failed to install logger: {0}")]
    Logger(#[from] log::SetLoggerError),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "bga-xray")]
#[command(about = "Inspect BGA solder balls in X-ray images (missing balls, voids, bridges)")]
#[command(version)]
struct Cli {
    /// Log verbosity (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect one image and write a JSON report.
    Inspect(InspectArgs),

    /// Learn reference ball positions from a golden image and write the taught recipe.
    Teach(TeachArgs),

    /// Run an inspection job described by a JSON config file.
    Run {
        /// Path to the job config (image path, recipe, optional params and output path).
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct InspectArgs {
    /// Path to the recipe (JSON).
    #[arg(long)]
    recipe: PathBuf,

    /// Path to the X-ray image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the inspection report (JSON).
    #[arg(long, default_value = "bga_inspect_report.json")]
    out: PathBuf,

    /// Engine parameter overrides (JSON). Defaults are used when omitted.
    #[arg(long)]
    params: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct TeachArgs {
    /// Path to the base recipe (JSON) holding radius, thresholds and ROI.
    #[arg(long)]
    recipe: PathBuf,

    /// Path to a golden image with every ball present.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the taught recipe (JSON).
    #[arg(long)]
    out: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run_cli(cli: Cli) -> CliResult<()> {
    init_logging(cli.log_level)?;
    match cli.command {
        Commands::Inspect(args) => run_inspect(&args),
        Commands::Teach(args) => run_teach(&args),
        Commands::Run { config } => run_config(&config),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(level: LevelFilter) -> CliResult<()> {
    let _ = tracing_log::LogTracer::init();
    bga_xray::core::init_tracing(level, false);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter) -> CliResult<()> {
    bga_xray::core::init_with_level(level)?;
    Ok(())
}

fn inspect_and_report(inspector: &Inspector, image_path: &Path, out: &Path) -> CliResult<()> {
    info!("loading image {}", image_path.display());
    let img = load_gray(image_path)?;
    info!("image size {}x{}", img.width(), img.height());

    let outcome = inspector.inspect(&gray_view(&img));
    let report = InspectReport::new(
        image_path.display().to_string(),
        inspector.recipe().model.clone(),
        outcome,
    );
    report.write_json(out)?;
    info!("report written to {}", out.display());

    println!("{}", report.summary_line);
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> CliResult<()> {
    let recipe = Recipe::load_json(&args.recipe)?;
    let params = match &args.params {
        Some(path) => InspectorParams::load_json(path)?,
        None => InspectorParams::default(),
    };
    inspect_and_report(&Inspector::new(recipe, params), &args.image, &args.out)
}

fn run_config(path: &Path) -> CliResult<()> {
    let config = InspectConfig::load_json(path)?;
    inspect_and_report(
        &config.build_inspector(),
        Path::new(&config.image_path),
        &config.output_path(),
    )
}

fn run_teach(args: &TeachArgs) -> CliResult<()> {
    let base = Recipe::load_json(&args.recipe)?;
    let img = load_gray(&args.image)?;
    let taught = Inspector::with_recipe(base).teach(&gray_view(&img));
    taught.write_json(&args.out)?;
    info!(
        "taught {} reference points, written to {}",
        taught.reference_points.len(),
        args.out.display()
    );
    println!("taught {} balls", taught.target_ball_count);
    Ok(())
}

//! Command line front end for the before/after comparison pipeline.
//!
//! Usage:
//!   face-compare images before.jpg after.jpg             # Full pipeline
//!   face-compare images before.jpg after.jpg --json      # JSON output
//!   face-compare landmarks before.json after.json        # Offline landmark comparison

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Error};
use clap::{Parser, Subcommand};
use rs_face_compare::geometry::metrics::MetricName;
use rs_face_compare::utils::image::decode_base64_image;
use rs_face_compare::{
    AffineImageWarper, AppConfig, ChatCompletionClient, ComparisonPipeline, ComparisonResult, FailureReport,
    ImageWarper, LandmarkSet, VisionLandmarkClient,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "rs_face_compare=info";

#[derive(Parser, Debug)]
#[command(name = "face-compare")]
#[command(author, version, about = "Before/after facial geometry comparison", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// JSON config file (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect, score and comment on two photos
    Images {
        before: PathBuf,
        after: PathBuf,

        /// Skip warping the before photo onto the after pose
        #[arg(long)]
        no_realign: bool,
    },
    /// Score two landmark maps without calling any service
    Landmarks { before: PathBuf, after: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    }
    .with_env_credentials();

    let outcome = match &args.command {
        Command::Images {
            before,
            after,
            no_realign,
        } => run_images(config, before, after, *no_realign).await?,
        Command::Landmarks { before, after } => run_landmarks(config, before, after)?,
    };

    match outcome {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            Ok(())
        }
        Err(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                eprintln!("comparison failed [{}]: {}", report.reason, report.message);
            }
            std::process::exit(1);
        }
    }
}

async fn run_images(
    mut config: AppConfig,
    before: &Path,
    after: &Path,
    no_realign: bool,
) -> Result<Result<ComparisonResult, FailureReport>, Error> {
    if no_realign {
        config.pipeline.realign = false;
    }
    let before = load_image(before)?;
    let after = load_image(after)?;

    let detector = Arc::new(VisionLandmarkClient::new(config.detector.clone())?);
    let text_generator = Arc::new(ChatCompletionClient::new(config.text_generator.clone())?);
    let warper: Option<Arc<dyn ImageWarper>> = Some(Arc::new(AffineImageWarper));

    let pipeline = ComparisonPipeline::new(detector, text_generator, warper, config);
    Ok(pipeline.compare_reported(&before, &after).await)
}

fn run_landmarks(
    config: AppConfig,
    before: &Path,
    after: &Path,
) -> Result<Result<ComparisonResult, FailureReport>, Error> {
    let before = load_landmarks(before)?;
    let after = load_landmarks(after)?;

    let detector = Arc::new(VisionLandmarkClient::new(config.detector.clone())?);
    let text_generator = Arc::new(ChatCompletionClient::new(config.text_generator.clone())?);
    let pipeline = ComparisonPipeline::new(detector, text_generator, None, config);
    Ok(pipeline.compare_landmarks_reported(&before, &after))
}

/// Reads raw image bytes, or a base64 data URL saved as text.
fn load_image(path: &Path) -> Result<Vec<u8>, Error> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read image {}", path.display()))?;
    if bytes.starts_with(b"data:") {
        let text = String::from_utf8(bytes).with_context(|| format!("{} is not a valid data url", path.display()))?;
        return decode_base64_image(&text);
    }
    Ok(bytes)
}

fn load_landmarks(path: &Path) -> Result<LandmarkSet, Error> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("cannot read landmarks {}", path.display()))?;
    let landmarks: LandmarkSet =
        serde_json::from_str(&raw).with_context(|| format!("invalid landmark file {}", path.display()))?;
    Ok(landmarks)
}

fn print_result(result: &ComparisonResult) {
    println!("{:<34} {:>10} {:>10} {:>10} {:>9}", "metric", "before", "after", "change", "percent");
    for delta in &result.deltas {
        let decimals = delta.metric.display_decimals() as usize;
        let percent = delta
            .change_percent
            .map(|p| format!("{p:+.1}%"))
            .unwrap_or_else(|| "-".to_string());
        let marker = if delta.improved { "  improved" } else { "" };
        println!(
            "{:<34} {:>10.*} {:>10.*} {:>+10.*} {:>9}{marker}",
            label(delta.metric),
            decimals,
            delta.before,
            decimals,
            delta.after,
            decimals,
            delta.change,
            percent,
        );
    }

    if !result.composites.is_empty() {
        println!();
        for composite in &result.composites {
            match composite.trend {
                Some(trend) => println!("{:?}: {:.1} ({trend})", composite.kind, composite.value),
                None => println!("{:?}: {:.1}", composite.kind, composite.value),
            }
        }
    }

    if let Some(commentary) = &result.commentary {
        println!();
        println!("{commentary}");
    }
}

fn label(metric: MetricName) -> String {
    let unit = metric.unit().symbol();
    if unit.is_empty() {
        metric.label().to_string()
    } else {
        format!("{} ({unit})", metric.label())
    }
}

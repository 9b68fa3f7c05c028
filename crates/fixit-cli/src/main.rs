use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fixit_engine::{IllustrationRequest, ImagePayload, RepairPlanner, Settings};
use serde_json::{json, Value};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "fixit", version, about = "FixIt repair assistant CLI")]
struct Cli {
    /// `.env` file consulted for variables missing from the environment.
    #[arg(long, global = true, env = "FIXIT_ENV_FILE")]
    env_file: Option<PathBuf>,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,
    /// Default log level when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Diagnose a photo and plan the repair.
    Analyze(AnalyzeArgs),
    /// Search for a manual or guide for an object.
    Manual(ManualArgs),
    /// Generate one step illustration.
    Illustrate(IllustrateArgs),
    /// Ask for help with a photo of the current repair state.
    Troubleshoot(TroubleshootArgs),
    /// Check whether a photo is fit to share publicly.
    Moderate(ModerateArgs),
    /// Run analysis, manual search and illustrations into one repair draft.
    Prepare(AnalyzeArgs),
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value = "")]
    text: String,
}

#[derive(Debug, Parser)]
struct ManualArgs {
    #[arg(long)]
    object: String,
}

#[derive(Debug, Parser)]
struct IllustrateArgs {
    #[arg(long)]
    object: String,
    #[arg(long)]
    step: String,
    #[arg(long)]
    ideal_view: String,
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Write the generated image here instead of printing its data URI.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct TroubleshootArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    object: String,
    /// Zero-based index of the current step.
    #[arg(long, default_value_t = 0)]
    step_index: usize,
    #[arg(long)]
    step_text: String,
}

#[derive(Debug, Parser)]
struct ModerateArgs {
    #[arg(long)]
    image: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("fixit error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.log_json, cli.log_level);

    let env_file = cli
        .env_file
        .clone()
        .or_else(|| Some(PathBuf::from(".env")).filter(|path| path.is_file()));
    let planner = RepairPlanner::new(Settings::load(env_file.as_deref()));

    let output = match cli.command {
        Command::Analyze(args) => {
            let image = read_image(&args.image)?;
            serde_json::to_value(planner.analyze(&image, &args.text)?)?
        }
        Command::Manual(args) => serde_json::to_value(planner.find_manual(&args.object))?,
        Command::Illustrate(args) => run_illustrate(&planner, args)?,
        Command::Troubleshoot(args) => {
            let image = read_image(&args.image)?;
            let advice =
                planner.troubleshoot(&image, &args.object, args.step_index, &args.step_text);
            json!({
                "advice": advice.text,
                "fallbackReason": advice.fallback_reason,
            })
        }
        Command::Moderate(args) => {
            let image = read_image(&args.image)?;
            let verdict = planner.moderate(&image);
            json!({
                "safe": verdict.result.safe,
                "reason": verdict.result.reason,
                "fallbackReason": verdict.fallback_reason,
            })
        }
        Command::Prepare(args) => {
            let image = read_image(&args.image)?;
            serde_json::to_value(planner.prepare(&image, &args.text)?)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

fn run_illustrate(planner: &RepairPlanner, args: IllustrateArgs) -> Result<Value> {
    let reference = args.reference.as_deref().map(read_image).transpose()?;
    let illustration = planner.illustrate(&IllustrationRequest {
        object_name: &args.object,
        step_instruction: &args.step,
        ideal_view: &args.ideal_view,
        reference: reference.as_ref(),
    });
    let Some(image) = &illustration.image else {
        return Ok(json!({
            "image": Value::Null,
            "fallbackReason": illustration.fallback_reason,
        }));
    };
    match &args.out {
        Some(out) => {
            fs::write(out, &image.bytes)
                .with_context(|| format!("failed to write {}", out.display()))?;
            Ok(json!({
                "mimeType": image.mime_type,
                "bytes": image.bytes.len(),
                "path": out.to_string_lossy(),
            }))
        }
        None => Ok(json!({
            "mimeType": image.mime_type,
            "dataUri": image.to_data_uri(),
        })),
    }
}

fn read_image(path: &Path) -> Result<ImagePayload> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    ImagePayload::from_bytes(bytes).with_context(|| format!("unusable image {}", path.display()))
}

/// Logs go to stderr so stdout stays pure JSON.
fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}

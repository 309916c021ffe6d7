use anyhow::{Context, Result};
use bodylang::{Analyzer, Config};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const CONFIG_PATH: &str = "config.toml";

/// Score posture, eye contact and movement in a recorded clip.
#[derive(Parser, Debug)]
#[command(name = "bodylang", version = env!("BODYLANG_BUILD_VERSION"))]
struct Args {
    /// Video file to analyze
    video: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Give up and report the default assessment after this many seconds
    #[arg(short, long)]
    timeout_secs: Option<u64>,

    /// Pretty-print the JSON result
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("bodylang {}", env!("BODYLANG_BUILD_VERSION"));

    let config = Config::load_or_default(&args.config);
    let analyzer = Analyzer::from_config(config);

    let result = match args.timeout_secs {
        Some(secs) => Arc::new(analyzer).analyze_with_timeout(&args.video, Duration::from_secs(secs)),
        None => analyzer.analyze(&args.video),
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .context("Failed to serialize result")?;
    println!("{}", json);

    Ok(())
}

use anyhow::Result;
use bodylang::config::Config;
use bodylang::video::{sample, ContainerNormalizer, OpenCvVideo, VideoSource};
use opencv::prelude::*;
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: video_probe <video>...");
        std::process::exit(2);
    }

    let config = Config::load_or_default("config.toml");
    let normalizer = ContainerNormalizer::from_config(&config.normalizer);

    println!("=== Video probe ===");
    println!();

    for path in &paths {
        println!("{}:", path);
        let normalized = normalizer.normalize(Path::new(path));
        if normalized.is_repaired() {
            println!("  repaired copy: {}", normalized.path().display());
        }

        let mut video = match OpenCvVideo::open(normalized.path()) {
            Ok(v) => v,
            Err(e) => {
                println!("  open failed: {:#}", e);
                println!();
                continue;
            }
        };

        let meta = video.metadata();
        println!(
            "  prop: {}x{} fps={} frames={} backend={}",
            meta.width,
            meta.height,
            meta.fps,
            meta.frame_count,
            video.backend_name()
        );
        println!(
            "  metadata: {}",
            if meta.is_valid() { "valid (indexed sampling)" } else { "invalid (sequential fallback)" }
        );

        let frames = sample(&mut video, config.sampling.max_frames);
        match frames.first() {
            Some(first) => println!(
                "  sampled: {} frames, {}x{} ch={}",
                frames.len(),
                first.width(),
                first.height(),
                first.mat().channels()
            ),
            None => println!("  sampled: no decodable frames"),
        }
        println!();
    }

    Ok(())
}

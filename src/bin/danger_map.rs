// Usage: target/release/danger_map --config danger.toml [--map out.html] [--snapshot out.grid]

use anyhow::Context;
use clap::Parser;
use ride_danger::config::IndexKind;
use ride_danger::pipeline::sink_for_path;
use ride_danger::source::CsvSource;
use ride_danger::{Config, MapSink, Pipeline, Tier};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "danger_map", version)]
#[command(about = "Aggregate ride data onto a grid and map per-cell danger levels")]
struct Args {
    /// TOML configuration; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Map output (.html, .geojson or .png), overrides output.map
    #[arg(long)]
    map: Option<PathBuf>,

    /// Snapshot output, overrides output.snapshot
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// End of the lookback window, overrides window.now
    #[arg(long)]
    now: Option<String>,

    /// Use the R* tree index instead of the linear scan
    #[arg(long, default_value_t = false)]
    rtree: bool,

    /// Show progress bars for the aggregation passes
    #[arg(long, default_value_t = false)]
    progress: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if args.map.is_some() {
        config.output.map = args.map.clone();
    }
    if args.snapshot.is_some() {
        config.output.snapshot = args.snapshot.clone();
    }
    if args.now.is_some() {
        config.window.now = args.now.clone();
    }
    if args.rtree {
        config.index.kind = IndexKind::Rtree;
    }

    let pipeline = Pipeline::new(config)
        .context("invalid configuration")?
        .with_progress(args.progress);
    let config = pipeline.config();

    let mut sink = match &config.output.map {
        Some(path) => Some(sink_for_path(path, &config.map, config.grid.extent()?)?),
        None => None,
    };

    let mut source = CsvSource::new(&config.input);
    let sink = sink.as_mut().map(|s| s.as_mut() as &mut dyn MapSink);
    let report = pipeline
        .run(&mut source, sink)
        .context("danger map run failed")?;

    let stats = report.stats;
    log::info!(
        "{} rides, {} positions ({} dropped); proximity {} scored / {} dropped; crashes {} scored / {} dropped",
        stats.aggregate.rides,
        stats.aggregate.positions,
        stats.aggregate.positions_dropped,
        stats.aggregate.proximity_scored,
        stats.aggregate.proximity_dropped,
        stats.aggregate.crashes_scored,
        stats.aggregate.crashes_dropped,
    );
    for tier in Tier::ALL {
        log::info!("{:>9}: {} cells", tier, stats.tiers.get(tier));
    }
    if let Some(path) = &config.output.map {
        println!("Map has been created and saved as {}", path.display());
    }
    Ok(())
}

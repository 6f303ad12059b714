// Usage: target/release/inspect_snapshot [snapshot] [--visited-only]
//
// Reads a snapshot back without re-running aggregation and dumps it as csv:
// row,col,lat,lon,danger,tier

use anyhow::Context;
use clap::Parser;
use ride_danger::GridSnapshot;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inspect_snapshot", version)]
struct Args {
    /// Snapshot file
    snapshot: PathBuf,

    /// Only print cells some ride went through
    #[arg(long, default_value_t = false)]
    visited_only: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let snapshot = GridSnapshot::load(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;
    eprintln!(
        "{}x{} snapshot, {} visited cells",
        snapshot.rows(),
        snapshot.cols(),
        snapshot.iter().filter(|(_, _, e)| e.is_visited()).count()
    );

    let mut wtr = csv::Writer::from_writer(io::stdout());
    wtr.write_record(["row", "col", "lat", "lon", "danger", "tier"])?;
    for (row, col, entry) in snapshot.iter() {
        if args.visited_only && !entry.is_visited() {
            continue;
        }
        wtr.write_record(&[
            row.to_string(),
            col.to_string(),
            entry.center.lat.to_string(),
            entry.center.lon.to_string(),
            entry.danger.to_string(),
            entry.tier.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

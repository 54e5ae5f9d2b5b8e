//! covisit CLI - run the co-visitation model and facility allocation
//!
//! Usage:
//!   covisit-cli allocate <trace.csv> [--circles <file>] [--facilities <n>] ...
//!   covisit-cli demo [--nodes <n>] [--facilities <n>] ...
//!
//! The trace file is a plain CSV of `id,timestamp,x,y` rows in an already
//! projected planar coordinate system. The resulting allocation is printed
//! to stdout as JSON.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use covisit::{
    AllocationParams, Allocator, Bounds, DistanceStat, GeometryIndex, LogProgress, Method,
    StatsConfig, SyntheticConfig, TraceStore, TravelTimeStat, VisitStats, generate_commuters,
    grid_over, load_circles,
};
use log::info;

#[derive(Parser)]
#[command(name = "covisit-cli")]
#[command(about = "Co-visitation statistics and facility allocation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the model from a trace file and run an allocation
    Allocate {
        /// CSV trace file with `id,timestamp,x,y` rows
        trace: PathBuf,

        /// Optional `x;y;radius` circle file supplying candidate sites
        #[arg(long)]
        circles: Option<PathBuf>,

        /// Edge length of the generated demand cells
        #[arg(long, default_value = "400")]
        cell_size: f64,

        /// Bucket size of the spatial index
        #[arg(long, default_value = "100")]
        bucket_size: f64,

        /// Interpolation cadence for trace ingestion
        #[arg(long, default_value = "1")]
        sampling: i64,

        /// Ignore samples before this timestamp
        #[arg(long)]
        start: Option<i64>,

        /// Ignore samples after this timestamp
        #[arg(long)]
        end: Option<i64>,

        /// Coverage deadline (median travel time ceiling)
        #[arg(long, default_value = "3600")]
        deadline: i64,

        /// Number of facilities to select
        #[arg(short, long, default_value = "5")]
        facilities: usize,

        /// Scale factor for derived exclusion ceilings
        #[arg(long, default_value = "1.0")]
        del_factor: f64,

        /// Travel-time exclusion: `med`, `avg`, a fixed ceiling, or `none`
        #[arg(long, default_value = "none")]
        travel_time: String,

        /// Distance exclusion: `auto`, a fixed ceiling, or `none`
        #[arg(long, default_value = "none")]
        distance: String,

        /// Allocation method: location-allocation, random, page-rank, k-means
        #[arg(short, long, default_value = "location-allocation")]
        method: Method,
    },

    /// Run the whole pipeline on synthetic commuter traces
    Demo {
        /// Number of synthetic entities
        #[arg(long, default_value = "20")]
        nodes: usize,

        /// Number of facilities to select
        #[arg(short, long, default_value = "2")]
        facilities: usize,

        /// Coverage deadline (median travel time ceiling)
        #[arg(long, default_value = "3600")]
        deadline: i64,

        /// RNG seed for trace generation
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Allocate {
            trace,
            circles,
            cell_size,
            bucket_size,
            sampling,
            start,
            end,
            deadline,
            facilities,
            del_factor,
            travel_time,
            distance,
            method,
        } => run_allocate(
            &trace, circles, cell_size, bucket_size, sampling, start, end, deadline, facilities,
            del_factor, &travel_time, &distance, method,
        ),
        Commands::Demo {
            nodes,
            facilities,
            deadline,
            seed,
        } => run_demo(nodes, facilities, deadline, seed),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_allocate(
    trace_path: &PathBuf,
    circles: Option<PathBuf>,
    cell_size: f64,
    bucket_size: f64,
    sampling: i64,
    start: Option<i64>,
    end: Option<i64>,
    deadline: i64,
    facilities: usize,
    del_factor: f64,
    travel_time: &str,
    distance: &str,
    method: Method,
) -> Result<(), Box<dyn std::error::Error>> {
    let traces = load_trace_csv(trace_path)?;
    info!("loaded {} entities from {}", traces.len(), trace_path.display());

    let bounds = traces
        .bounds()
        .ok_or("trace file contains no usable samples")?;
    let index = build_index(bounds, circles.as_deref(), cell_size, bucket_size)?;

    let config = StatsConfig {
        sampling,
        start_time: start,
        end_time: end,
    };
    let stats = VisitStats::build(&index, &traces, &config, &LogProgress);
    info!(
        "model built: {} visited regions, average speed {:.3}",
        stats.region_count(),
        stats.average_speed()
    );

    let (tt_stat, travel_time) = parse_travel_time(travel_time)?;
    let (d_stat, distance) = parse_distance(distance)?;
    let params = AllocationParams {
        deadline,
        nb_facilities: facilities,
        del_factor,
        tt_stat,
        travel_time,
        d_stat,
        distance,
        method,
    };

    let allocator = Allocator::new(&stats, &index);
    let allocation = allocator.run(&params, &LogProgress)?;
    let sites = allocator.sites(&allocation);

    println!("{}", serde_json::to_string_pretty(&sites)?);
    Ok(())
}

fn run_demo(
    nodes: usize,
    facilities: usize,
    deadline: i64,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyntheticConfig {
        nb_nodes: nodes,
        seed,
        ..Default::default()
    };
    let traces = generate_commuters(&config);
    info!("generated {} synthetic entities", traces.len());

    let bounds = traces.bounds().ok_or("synthetic generation produced no samples")?;
    let index = GeometryIndex::new(grid_over(&bounds, 400.0), 100.0);

    let stats_config = StatsConfig {
        sampling: 30,
        ..Default::default()
    };
    let stats = VisitStats::build(&index, &traces, &stats_config, &LogProgress);

    let params = AllocationParams {
        deadline,
        nb_facilities: facilities,
        ..Default::default()
    };
    let allocator = Allocator::new(&stats, &index);
    let allocation = allocator.run(&params, &LogProgress)?;
    let sites = allocator.sites(&allocation);

    println!("{}", serde_json::to_string_pretty(&sites)?);
    Ok(())
}

/// Load a `id,timestamp,x,y` CSV into a trace store.
fn load_trace_csv(path: &PathBuf) -> Result<TraceStore, Box<dyn std::error::Error>> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let reader = BufReader::new(file);

    let mut traces = TraceStore::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [id, t, x, y] = fields.as_slice() else {
            return Err(format!("line {}: expected `id,timestamp,x,y`, got {line:?}", i + 1).into());
        };
        traces.add_sample(id, t.parse()?, x.parse()?, y.parse()?);
    }
    Ok(traces)
}

/// Build the geometry index: the automatic demand grid, plus circle
/// candidates when a circle file was given.
fn build_index(
    bounds: Bounds,
    circles: Option<&std::path::Path>,
    cell_size: f64,
    bucket_size: f64,
) -> Result<GeometryIndex, Box<dyn std::error::Error>> {
    let mut geoms = grid_over(&bounds, cell_size);
    info!("generated {} demand cells over {:?}", geoms.len(), bounds);

    if let Some(path) = circles {
        let loaded = load_circles(path)?;
        info!("loaded {} candidate circles from {}", loaded.len(), path.display());
        geoms.extend(loaded);
    }

    Ok(GeometryIndex::new(geoms, bucket_size))
}

/// Parse the `--travel-time` flag: `none`, `med`, `avg`, or a fixed ceiling
/// (compared against the median).
fn parse_travel_time(s: &str) -> Result<(TravelTimeStat, Option<f64>), String> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok((TravelTimeStat::None, None)),
        "med" | "median" => Ok((TravelTimeStat::Median, None)),
        "avg" | "average" => Ok((TravelTimeStat::Average, None)),
        other => other
            .parse::<f64>()
            .map(|v| (TravelTimeStat::Median, Some(v)))
            .map_err(|_| format!("invalid --travel-time value {other:?}")),
    }
}

/// Parse the `--distance` flag: `none`, `auto`, or a fixed ceiling.
fn parse_distance(s: &str) -> Result<(DistanceStat, Option<f64>), String> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok((DistanceStat::None, None)),
        "auto" => Ok((DistanceStat::Auto, None)),
        other => other
            .parse::<f64>()
            .map(|v| (DistanceStat::Fixed, Some(v)))
            .map_err(|_| format!("invalid --distance value {other:?}")),
    }
}

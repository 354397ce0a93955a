//! dispatch: end-to-end run of the rust_er emergency routing engine.
//!
//! Resolves one patient to a hospital, prints the debug trace summary, then
//! confirms the request and streams the ambulance's progress until arrival.
//!
//! ```text
//! RUST_LOG=debug cargo run -p dispatch -- --speedup 120
//! cargo run -p dispatch -- --data ./city_csv --city 1 --lat 24.86 --lon 67.0
//! ```

mod network;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use er_core::{CityId, GeoPoint, NodeId, Timestamp};
use er_dispatch::{DispatchConfig, Dispatcher, RoutingDecision};
use er_graph::{CsvSource, GraphSource};
use er_tracker::TrackingStatus;

use network::{CIVIL_HOSPITAL, KARACHI, PATIENT, build_source};

// ── Command line ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Route a patient to a hospital and track the ambulance")]
struct Args {
    /// Dispatcher config (TOML).  Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of CSV tables.  Without it a built-in network is used.
    #[arg(long)]
    data: Option<PathBuf>,

    #[arg(long, default_value_t = KARACHI.get())]
    city: u32,

    #[arg(long, default_value_t = PATIENT.lat, allow_negative_numbers = true)]
    lat: f64,

    #[arg(long, default_value_t = PATIENT.lon, allow_negative_numbers = true)]
    lon: f64,

    /// Destination hospital node.  Picks the nearest when omitted.
    #[arg(long)]
    hospital: Option<u32>,

    /// Overrides `tracker.speedup` from the config.
    #[arg(long)]
    speedup: Option<f64>,

    /// Write the full debug trace as JSON.
    #[arg(long)]
    trace_json: Option<PathBuf>,

    /// Resolve only; do not confirm or track.
    #[arg(long)]
    no_track: bool,
}

// ── main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // 1. Config.
    let mut config = match &args.config {
        Some(path) => DispatchConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => DispatchConfig::default(),
    };
    if args.config.is_none() && args.speedup.is_none() {
        // Play a ten-minute trip in about ten seconds.
        config.tracker.speedup = 60.0;
    }
    if let Some(speedup) = args.speedup {
        config.tracker.speedup = speedup;
    }
    tracing::info!(
        speedup = config.tracker.speedup,
        tick_secs = config.tracker.tick_interval_secs,
        cache_graphs = config.cache_graphs,
        "config ready"
    );

    // 2. Graph source.
    let now = Timestamp::now();
    let source: Arc<dyn GraphSource> = match &args.data {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "reading CSV tables");
            Arc::new(CsvSource::new(dir))
        }
        None => {
            tracing::info!("using the built-in Karachi network");
            Arc::new(build_source(now))
        }
    };
    let dispatcher = Dispatcher::new(source, config)?;
    let city = CityId(args.city);

    println!("=== dispatch: rust_er emergency routing ===");
    for c in dispatcher.list_cities()? {
        println!("City {:<4} {}", c.id, c.name.as_deref().unwrap_or("-"));
    }
    let hospitals = dispatcher.list_hospitals(city)?;
    println!("City {city}: {} hospitals", hospitals.len());
    for h in &hospitals {
        println!("  {:<6} {:<24} {}", h.id, h.name.as_deref().unwrap_or("-"), h.pos);
    }
    println!();

    // 3. Resolve.
    let patient = GeoPoint::new(args.lat, args.lon);
    let t0 = Instant::now();
    let decision = match args.hospital {
        Some(h) => dispatcher.resolve_request(city, patient, NodeId(h), now)?,
        None if args.data.is_none() && args.city == KARACHI.get() => {
            // Show both: the requested hospital, then the nearest one.
            let fixed = dispatcher.resolve_request(city, patient, CIVIL_HOSPITAL, now)?;
            print_decision("Civil Hospital", &fixed);
            dispatcher.resolve_nearest_hospital(city, patient, now)?
        }
        None => dispatcher.resolve_nearest_hospital(city, patient, now)?,
    };
    print_decision("Nearest hospital", &decision);
    println!("Resolved in {:.3} ms", t0.elapsed().as_secs_f64() * 1_000.0);
    println!();

    // 4. Debug trace.
    let trace = dispatcher.get_trace(decision.request_id)?;
    let blocked = trace.edges.iter().filter(|e| e.blocked).count();
    let traffic = trace.edges.iter().filter(|e| e.traffic).count();
    println!(
        "Trace: {} nodes, {} edges ({blocked} blocked, {traffic} with traffic), {} steps",
        trace.nodes.len(),
        trace.edges.len(),
        trace.steps.len()
    );
    println!("{:<6} {:<8} {:<24} {}", "Step", "Settled", "Visited", "Frontier");
    println!("{}", "-".repeat(56));
    for (i, step) in trace.steps.iter().enumerate() {
        let current = step.current.map_or_else(|| "-".to_string(), |n| n.to_string());
        let visited: Vec<String> = step.visited.iter().map(ToString::to_string).collect();
        let frontier: Vec<String> = step.frontier.iter().map(ToString::to_string).collect();
        println!("{:<6} {:<8} {:<24} {}", i, current, visited.join(","), frontier.join(","));
    }
    if let Some(path) = &args.trace_json {
        std::fs::write(path, trace.to_json()?).with_context(|| format!("writing {}", path.display()))?;
        println!("Trace written to {}", path.display());
    }
    println!();

    if args.no_track {
        return Ok(());
    }
    if !decision.is_reachable() {
        bail!("request {} is unreachable; nothing to track", decision.request_id);
    }

    // 5. Confirm and track.
    let duration = dispatcher.confirm(decision.request_id)?;
    println!("Confirmed request {}; trip plays back in {:.1} s", decision.request_id, duration.as_secs_f64());
    let mut feed = dispatcher.subscribe(decision.request_id)?;
    while let Some(event) = feed.next().await {
        // One line per event, as a subscriber on the wire would see it.
        println!("  {:>5.1}%  {}", event.progress * 100.0, serde_json::to_string(&event)?);
        if event.status == TrackingStatus::Completed {
            break;
        }
    }

    let request = dispatcher.request(decision.request_id)?;
    println!("Request {} is {}", request.id, request.status);
    Ok(())
}

fn print_decision(label: &str, d: &RoutingDecision) {
    let path: Vec<String> = d.path.iter().map(ToString::to_string).collect();
    match (d.total_weight, d.total_distance_km) {
        (Some(w), Some(km)) => println!(
            "{label}: request {} {} → {}  [{}]  {w:.1} min, {km:.2} km",
            d.request_id,
            d.source_node,
            d.destination_node,
            path.join(" → "),
        ),
        _ => println!(
            "{label}: request {} {} → {}  unreachable",
            d.request_id, d.source_node, d.destination_node
        ),
    }
}

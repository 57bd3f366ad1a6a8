//! LanternLayer CLI - drive the engine without a real map surface.
//!
//! Runs the full engine against a headless surface: synthetic feed events,
//! a bulk history load, and the particle overlay ticking in the background.
//! Useful for smoke-testing the pipeline and for profiling bulk loads.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lanternlayer::{
    EngineConfig, GeoPoint, HeadlessSurface, LiveMapEngine, MapSurface, OverlayConfig, PixelSize,
    RecordInput, SyncEvent, ViewportBridge, ViewportState, ISLAND,
};

#[derive(Debug, Parser)]
#[command(name = "lanternlayer", about = "Live geospatial visualization engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Feed synthetic live events through the engine.
    Simulate {
        /// Number of incremental events to publish.
        #[arg(long, default_value_t = 50)]
        events: usize,
        /// Delay between events in milliseconds.
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
        /// RNG seed for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Bulk-load a synthetic history set and report chunk timings.
    LoadHistory {
        /// Number of records to insert.
        #[arg(long, default_value_t = 10_000)]
        records: usize,
        /// Records per synchronous chunk.
        #[arg(long, default_value_t = 256)]
        chunk_size: usize,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn ready_bridge() -> Arc<ViewportBridge> {
    ViewportBridge::with_viewport(ViewportState {
        center: GeoPoint::new(23.7, 120.96),
        zoom: 8.0,
        pixel_size: PixelSize {
            width: 1280.0,
            height: 720.0,
        },
    })
}

async fn simulate(events: usize, interval_ms: u64, seed: Option<u64>) {
    let surface = Arc::new(HeadlessSurface::new());
    let engine = LiveMapEngine::new(
        EngineConfig::default().with_overlay(OverlayConfig {
            seed,
            ..OverlayConfig::default()
        }),
        Arc::clone(&surface) as Arc<dyn MapSurface>,
        ready_bridge(),
    );

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let box_lat = ISLAND.min_lat..ISLAND.max_lat;
    let box_lng = ISLAND.min_lng..ISLAND.max_lng;

    for i in 0..events {
        let topic = if i % 3 == 0 { "wallets" } else { "visits" };
        let record = RecordInput::new(format!("{topic}-{i}"))
            .at(
                rng.random_range(box_lat.clone()),
                rng.random_range(box_lng.clone()),
            )
            .with_kind(if topic == "wallets" { "wallet" } else { "visit" });
        engine.publish(&SyncEvent::incremental(topic, vec![record]));
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
    }

    // Let the overlay drain before tearing down.
    while !engine.overlay().lock().is_empty() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    info!(
        events,
        markers = surface.marker_count(),
        "simulation complete"
    );
    engine.unmount();
}

async fn load_history(records: usize, chunk_size: usize) {
    let surface = Arc::new(HeadlessSurface::new());
    let engine = LiveMapEngine::new(
        EngineConfig::default().with_chunk_size(chunk_size),
        Arc::clone(&surface) as Arc<dyn MapSurface>,
        ready_bridge(),
    );

    let input: Vec<_> = (0..records)
        .map(|i| {
            RecordInput::new(format!("h-{i}")).at(
                (i % 170) as f64 - 85.0,
                (i % 360) as f64 - 180.0,
            )
        })
        .collect();

    match engine.insert_history("history", input).await {
        Ok(report) => {
            info!(
                inserted = report.inserted,
                chunks = report.chunks,
                max_chunk_us = report.max_chunk.as_micros() as u64,
                aborted = report.aborted,
                markers = surface.marker_count(),
                "history load complete"
            );
        }
        Err(e) => {
            eprintln!("history load failed: {e}");
            std::process::exit(1);
        }
    }
    engine.unmount();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            events,
            interval_ms,
            seed,
        } => simulate(events, interval_ms, seed).await,
        Commands::LoadHistory {
            records,
            chunk_size,
        } => load_history(records, chunk_size).await,
    }
}

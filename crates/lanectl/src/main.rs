//! LaneCache demo - runs scripted scenarios against a sharded cache

mod scenarios;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lanecache::{CacheConfig, ShardedCache};
use lanestore::SimulatedStore;
use tracing::{error, info};

use crate::scenarios::{DemoCache, Scenario};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScenarioArg {
    All,
    Basic,
    Eviction,
    Update,
    Concurrent,
    Stress,
    Failure,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache capacity (number of keys)
    #[arg(short, long, default_value_t = 5)]
    capacity: usize,

    /// Number of shard lanes
    #[arg(short, long, default_value_t = lanecache::DEFAULT_SHARDS)]
    shards: usize,

    /// Simulated durable write latency in milliseconds
    #[arg(short, long, default_value_t = 50)]
    latency_ms: u64,

    /// Seconds to wait for lanes to drain on shutdown
    #[arg(long, default_value_t = 5)]
    grace_secs: u64,

    /// Scenario to run
    #[arg(long, value_enum, default_value_t = ScenarioArg::All)]
    scenario: ScenarioArg,
}

impl ScenarioArg {
    fn scenarios(self) -> Vec<Scenario> {
        match self {
            ScenarioArg::All => Scenario::ALL.to_vec(),
            ScenarioArg::Basic => vec![Scenario::Basic, Scenario::Miss],
            ScenarioArg::Eviction => vec![Scenario::FillToCapacity, Scenario::Eviction],
            ScenarioArg::Update => {
                vec![Scenario::Update, Scenario::RepeatedUpdate, Scenario::Affinity]
            }
            ScenarioArg::Concurrent => vec![Scenario::Concurrent],
            ScenarioArg::Stress => vec![Scenario::Stress],
            ScenarioArg::Failure => vec![Scenario::Failure],
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting lanectl v{}", env!("CARGO_PKG_VERSION"));
    info!(
        capacity = args.capacity,
        shards = args.shards,
        latency_ms = args.latency_ms,
        "configuring cache"
    );

    let store = SimulatedStore::with_latency(Duration::from_millis(args.latency_ms));
    let config = CacheConfig::new(args.capacity)
        .with_shards(args.shards)
        .with_shutdown_grace(Duration::from_secs(args.grace_secs));
    let cache: Arc<DemoCache> =
        Arc::new(ShardedCache::new(config, store).context("failed to start cache")?);

    println!("\n=== LaneCache Scenario Suite ===\n");

    let mut failed = 0;
    for scenario in args.scenario.scenarios() {
        println!("{}", scenario.title());
        println!("{}", "-".repeat(scenario.title().len()));

        match scenario.run(&cache) {
            Ok(true) => println!("PASS\n"),
            Ok(false) => {
                failed += 1;
                println!("FAIL\n");
            }
            Err(e) => {
                failed += 1;
                error!("scenario aborted: {e:#}");
                println!("FAIL\n");
            }
        }
    }

    let stats = cache.stats();
    println!("=== Summary ===");
    println!("Final size:  {}/{}", cache.current_size(), cache.capacity());
    println!(
        "Hits: {}  Misses: {}  Hit ratio: {:.2}",
        stats.hits(),
        stats.misses(),
        stats.hit_ratio()
    );
    println!(
        "Inserts: {}  Updates: {}  Evictions: {}  Failed writes: {}",
        stats.inserts(),
        stats.updates(),
        stats.evictions(),
        stats.write_failures()
    );

    println!("\nShutting down...");
    cache.shutdown().context("shutdown did not complete cleanly")?;
    println!("Shutdown complete.");

    if failed > 0 {
        anyhow::bail!("{failed} scenario(s) failed");
    }
    Ok(())
}

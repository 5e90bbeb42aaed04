mod commands;

use clutch_browser::{BrowserTransport, PacingConfig, TransportConfig};
use clutch_config::HarvestConfig;
use clutch_core::archive::PageArchive;
use clutch_core::db::DbOps;
use clutch_core::pipeline::{
    run_all, run_discovery, run_map_stats, run_overview, run_perf_economy, DiscoveryOpts,
    RunAllOpts, StageStats,
};
use clutch_core::transport::Fetcher;
use clutch_sqlite::SqliteDb;
use commands::{ClutchCli, ClutchSubcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = ClutchCli::parse_args();
    let config = match &args.config {
        Some(path) => HarvestConfig::from_file(path)?,
        None => HarvestConfig::default(),
    };

    // maintenance commands never need a browser
    if let ClutchSubcommand::Db { command } = &args.command {
        return commands::db_command(command, &config).await;
    }

    let db = SqliteDb::from_file(&config.db_path)?;
    // structural schema problems surface here and the pipeline refuses to start
    db.migrate()?;
    let archive = PageArchive::new(&config.data_dir);

    let transport = BrowserTransport::start(transport_config(&config)).await?;
    let result = drive(&args.command, &db, &transport, &archive, &config).await;
    let fetch_stats = transport.stats();
    transport.close().await;

    let stats = result?;
    info!(
        requests = fetch_stats.requests,
        successes = fetch_stats.successes,
        current_delay = fetch_stats.current_delay,
        "transport totals"
    );
    println!("{stats}");
    if stats.fetch_errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn drive(
    command: &ClutchSubcommand,
    db: &SqliteDb,
    transport: &BrowserTransport,
    archive: &PageArchive,
    config: &HarvestConfig,
) -> clutch_core::Result<StageStats> {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\nCTRL-C received, aborting the current batch...");
            Ok(StageStats::default())
        }
        result = run_stage(command, db, transport, archive, config) => result,
    }
}

async fn run_stage(
    command: &ClutchSubcommand,
    db: &SqliteDb,
    transport: &BrowserTransport,
    archive: &PageArchive,
    config: &HarvestConfig,
) -> clutch_core::Result<StageStats> {
    match command {
        ClutchSubcommand::Discover { max_offset } => {
            let opts = DiscoveryOpts {
                start_offset: 0,
                max_offset: max_offset.unwrap_or(config.max_offset),
                results_per_page: config.results_per_page,
            };
            run_discovery(db, transport, archive, &opts).await
        }
        ClutchSubcommand::Overview { limit } => {
            run_overview(db, transport, archive, limit.unwrap_or(config.overview_batch_size)).await
        }
        ClutchSubcommand::MapStats { limit } => {
            run_map_stats(db, transport, archive, limit.unwrap_or(config.map_stats_batch_size))
                .await
        }
        ClutchSubcommand::PerfEconomy { limit } => {
            run_perf_economy(
                db,
                transport,
                archive,
                limit.unwrap_or(config.perf_economy_batch_size),
            )
            .await
        }
        ClutchSubcommand::RunAll => {
            let opts = RunAllOpts {
                discovery: DiscoveryOpts {
                    start_offset: 0,
                    max_offset: config.max_offset,
                    results_per_page: config.results_per_page,
                },
                overview_limit: config.overview_batch_size,
                map_stats_limit: config.map_stats_batch_size,
                perf_economy_limit: config.perf_economy_batch_size,
            };
            run_all(db, transport, archive, &opts).await
        }
        ClutchSubcommand::Db { .. } => unreachable!("handled before transport start"),
    }
}

fn transport_config(config: &HarvestConfig) -> TransportConfig {
    TransportConfig {
        pacing: PacingConfig {
            min_delay: config.min_delay,
            max_delay: config.max_delay,
            backoff_factor: config.backoff_factor,
            recovery_factor: config.recovery_factor,
            max_backoff: config.max_backoff,
        },
        page_load_wait: config.page_load_wait,
        challenge_wait: config.challenge_wait,
        max_retries: config.max_retries,
        min_content_chars: config.min_content_chars,
    }
}

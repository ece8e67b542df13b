//! Relay Service daemon
//!
//! Loads the point table, binds it to the GPIO chip and keeps the engine
//! ticking until SIGINT/SIGTERM. SIGHUP re-reads the configuration file.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::logging::{init_logging, LoggingConfig};
use common::shutdown::{wait_for_shutdown, ReloadSignal};
use common::ServiceArgs;
use relay_gpio::create_driver;
use relaysrv::{
    runtime::{self, spawn_ticks},
    ConfigFile, EngineSettings, RelayEngine, RelaysConfig,
};

fn main() -> anyhow::Result<()> {
    let args = ServiceArgs::parse();

    let _log_guard = init_logging(&LoggingConfig {
        service_name: "relaysrv".to_string(),
        level: args.log_level.clone(),
        log_dir: args.log_dir.clone(),
        enable_json: false,
        ansi: !args.no_color,
    })?;

    let config = RelaysConfig::load(&args.config)?;
    config.validate()?;

    // Validation mode: validate and exit
    if args.validate {
        let table = config.table()?;
        info!(
            "Configuration valid: {} points on chip {}",
            table.points.len(),
            table.chip
        );
        return Ok(());
    }

    // Single logical thread drives every engine operation
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(args, config))
}

async fn run(args: ServiceArgs, config: RelaysConfig) -> anyhow::Result<()> {
    let driver = create_driver(&config.gpio);
    if !driver.is_available() {
        warn!("GPIO backend {} is not available on this host", driver.name());
    }

    let mut engine = RelayEngine::new(
        driver,
        Box::new(ConfigFile::new(&args.config)),
        EngineSettings::from_config(&config),
    );
    // Keep serving whatever bound; a later SIGHUP may fix the table
    match config.table() {
        Ok(table) => {
            if let Err(e) = engine.configure(&table) {
                error!("Cannot initialize GPIO: {}", e);
            }
        },
        Err(e) => error!("Cannot load point table: {}", e),
    }

    let engine = runtime::shared(engine);
    let token = CancellationToken::new();
    let ticks = spawn_ticks(Arc::clone(&engine), token.clone());
    info!("relaysrv started ({})", args.config.display());

    let mut reload = ReloadSignal::new();
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = reload.recv() => {
                info!("Reload signal received");
                if let Err(e) = engine.lock().refresh() {
                    error!("Refresh failed: {}", e);
                }
            }
        }
    }

    token.cancel();
    ticks.join().await;
    engine.lock().teardown();
    info!("relaysrv stopped");
    Ok(())
}

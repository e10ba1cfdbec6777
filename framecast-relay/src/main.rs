//! framecast relay — entry point.
//!
//! ```text
//! framecast-relay                  Export the test pattern per config
//! framecast-relay --receive        Listen for UDP frames instead
//! framecast-relay --ticks <n>      Stop after n render ticks
//! framecast-relay --config <path>  Load a custom config TOML
//! framecast-relay --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_relay::config::RelayConfig;
use framecast_relay::service::RelayService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-relay", about = "framecast frame export relay")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-relay.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to `--config` and exit.
    #[arg(long)]
    init: bool,

    /// Run the UDP receiver instead of the exporter.
    #[arg(long)]
    receive: bool,

    /// Stop after this many render ticks.
    #[arg(long)]
    ticks: Option<u64>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&RelayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    if cli.init {
        RelayConfig::write_default(&cli.config)?;
        println!("Wrote {}", cli.config.display());
        return Ok(());
    }

    // Load config.
    let config = RelayConfig::load(&cli.config);

    // Init tracing. Stdout may carry frames, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("framecast-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("strategy: {:?}", config.pipeline.strategy);
    info!("tick rate: {} Hz", config.source.tick_hz);
    info!("frame skip: {}", config.pipeline.frame_skip);

    let service = RelayService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    if cli.receive {
        service.run_receiver().await?;
    } else {
        service.run(cli.ticks).await?;
    }

    Ok(())
}

//! CAN Monitor - Main Entry Point

use can_monitor::{apply_filters, init_logging, monitor, ChangeTracker, MonitorConfig};
use elm_can::Elm327;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| MonitorConfig::DEFAULT_PATH.to_string());
    let config = MonitorConfig::load(&path)?;
    init_logging(&config.logging);

    info!("=== CAN Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Protocol {}", config.session.protocol);

    let mut session = Elm327::open(&config.session)?;
    session.reset().await?;
    apply_filters(&mut session, &config.filter).await?;

    let mut tracker = ChangeTracker::new(config.ignore.iter().copied(), config.firehose);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    monitor(&mut session, &mut tracker, shutdown, |change| println!("{}", change)).await?;
    Ok(())
}

//! CAN Monitor
//!
//! Brings an ELM327 adapter into monitor mode and reports payload changes
//! per arbitration ID.

use elm_can::{Elm327, ElmError, FilterMask, Link, Record};
use std::future::Future;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod tracker;

pub use config::{FilterSettings, LoggingConfig, MonitorConfig};
pub use tracker::{Change, ChangeTracker};

/// Why the monitor loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The adapter returned to its prompt or never found the bus
    EndOfStream,
    /// Shutdown was requested
    Shutdown,
}

/// Counters for one monitoring run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSummary {
    pub frames: u64,
    pub changes: u64,
    pub unrecognized: u64,
    pub reason: ExitReason,
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Failed to set tracing subscriber");
}

/// Send the configured acceptance filter.
///
/// Returns the planned pair when a whitelist was used.
pub async fn apply_filters<L: Link>(
    session: &mut Elm327<L>,
    settings: &FilterSettings,
) -> Result<Option<FilterMask>, ElmError> {
    if !settings.whitelist.is_empty() {
        let plan = session.set_whitelist(&settings.whitelist).await?;
        info!(
            "Whitelist of {} IDs -> filter {:03X} mask {:03X}",
            settings.whitelist.len(),
            plan.filter,
            plan.mask
        );
        return Ok(Some(plan));
    }

    if let Some(filter) = settings.filter {
        session.set_filter(filter).await?;
    }
    if let Some(mask) = settings.mask {
        session.set_mask(mask).await?;
    }
    Ok(None)
}

/// Stream records until the adapter stops or `shutdown` resolves, passing
/// every payload change to `on_change`. The prompt is restored before
/// returning unless the link itself failed.
pub async fn monitor<L, S, F>(
    session: &mut Elm327<L>,
    tracker: &mut ChangeTracker,
    shutdown: S,
    mut on_change: F,
) -> Result<MonitorSummary, ElmError>
where
    L: Link,
    S: Future<Output = ()>,
    F: FnMut(&Change),
{
    session.start_streaming().await?;
    tokio::pin!(shutdown);

    let mut frames = 0;
    let mut changes = 0;
    let mut unrecognized = 0;

    let reason = loop {
        let record = tokio::select! {
            biased;
            _ = &mut shutdown => break ExitReason::Shutdown,
            record = session.next_record() => record?,
        };

        match record {
            Record::Frame(frame) => {
                frames += 1;
                if let Some(change) = tracker.observe(&frame) {
                    changes += 1;
                    on_change(&change);
                }
            }
            Record::Unrecognized(line) => {
                unrecognized += 1;
                info!("Unrecognized adapter output: {}", line);
            }
            Record::EndOfStream => break ExitReason::EndOfStream,
        }
    };

    session.stop_streaming().await?;

    let summary = MonitorSummary {
        frames,
        changes,
        unrecognized,
        reason,
    };
    info!(
        "Monitor stopped ({:?}): {} frames, {} changes, {} unrecognized lines",
        summary.reason, summary.frames, summary.changes, summary.unrecognized
    );
    Ok(summary)
}

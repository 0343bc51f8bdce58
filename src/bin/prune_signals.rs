//! Signal log retention sweep.
//!
//! Standalone binary meant to run from cron (daily is plenty). The bus never
//! deletes signals on its own; this job moves rows older than the configured
//! retention window into `agent_signals_archive`.
//!
//! Usage: `prune_signals` (reads `~/.lifeos/config.json`, `RUST_LOG` for
//! verbosity).

use lifeos_signals::config::BusConfig;
use lifeos_signals::housekeeping;

fn main() {
    env_logger::init();

    let config = match BusConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("prune_signals: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let db = match config.open_db() {
        Ok(db) => db,
        Err(e) => {
            log::error!("prune_signals: failed to open signal store: {}", e);
            std::process::exit(1);
        }
    };

    match housekeeping::archive_stale(&db, config.retention_days) {
        Ok(stats) => {
            log::info!(
                "prune_signals: archived {} stale signals, {} remain live (retention {} days)",
                stats.archived,
                stats.remaining,
                config.retention_days
            );
        }
        Err(e) => {
            log::error!("prune_signals: sweep failed: {}", e);
            std::process::exit(1);
        }
    }
}

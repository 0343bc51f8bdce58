//! Retention sweep for the signal log.
//!
//! The bus itself never deletes: consumed, dismissed, and expired signals
//! stay in `agent_signals` so the briefing agents can look back at what
//! happened. This module is the explicit job (see `prune_signals`) that
//! moves stale rows into `agent_signals_archive` once they age out.

use rusqlite::params;

use crate::db::{DbError, SignalDb};
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    /// Rows moved to the archive table this run.
    pub archived: usize,
    /// Rows still in the live table afterwards.
    pub remaining: usize,
}

/// Archive signals created more than `retention_days` ago, unless they are
/// still active and unexpired. Copy and delete run in one transaction with
/// the same predicate, so a row is either fully moved or untouched.
pub fn archive_stale(db: &SignalDb, retention_days: i64) -> Result<PruneStats, DbError> {
    let cutoff = util::rfc3339_days_ago(retention_days);
    let now = util::now_rfc3339();
    let archived_at = now.clone();

    db.with_transaction(|conn| {
        let archived = conn.execute(
            "INSERT INTO agent_signals_archive \
             (id, source_agent, target_agent, signal_type, priority, payload, \
              message, status, consumed_by, consumed_at, expires_at, created_at, archived_at) \
             SELECT id, source_agent, target_agent, signal_type, priority, payload, \
                    message, status, consumed_by, consumed_at, expires_at, created_at, ?1 \
             FROM agent_signals \
             WHERE created_at < ?2 AND (status != 'active' OR expires_at < ?3)",
            params![archived_at, cutoff, now],
        )?;
        conn.execute(
            "DELETE FROM agent_signals \
             WHERE created_at < ?1 AND (status != 'active' OR expires_at < ?2)",
            params![cutoff, now],
        )?;
        let remaining: i64 =
            conn.query_row("SELECT COUNT(*) FROM agent_signals", [], |row| row.get(0))?;
        Ok(PruneStats {
            archived,
            remaining: remaining as usize,
        })
    })
}

//! Row operations on the `agent_signals` table.
//!
//! Pure storage bindings: filters, ordering, and the one-way status guards
//! live here. Defaults, fail-soft behavior, and logging policy belong to the
//! bus layer.

use rusqlite::params;
use serde_json::Value;

use super::{DbError, SignalDb};
use crate::agents::AgentId;
use crate::types::{Payload, Signal, SignalStatus, SignalType};

/// Column list shared by every SELECT so `map_signal_row` indexes stay valid.
const SIGNAL_COLUMNS: &str = "id, source_agent, target_agent, signal_type, priority, payload, \
     message, status, consumed_by, consumed_at, expires_at, created_at";

impl SignalDb {
    /// Insert one signal row with `status = 'active'`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_signal(
        &self,
        id: &str,
        source: AgentId,
        target: Option<AgentId>,
        signal_type: SignalType,
        priority: i64,
        payload_json: &str,
        message: &str,
        expires_at: &str,
        created_at: &str,
    ) -> Result<(), DbError> {
        self.conn().execute(
            "INSERT INTO agent_signals
             (id, source_agent, target_agent, signal_type, priority, payload, message,
              status, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8, ?9)",
            params![
                id,
                source.as_str(),
                target.map(|a| a.as_str()),
                signal_type.as_str(),
                priority,
                payload_json,
                message,
                expires_at,
                created_at
            ],
        )?;
        Ok(())
    }

    /// Active signals visible to `caller`: targeted at it or broadcast.
    /// Ordered most urgent first, then newest first.
    pub(crate) fn consumable_signals(
        &self,
        caller: AgentId,
        types: Option<&[SignalType]>,
        min_priority: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Signal>, DbError> {
        let mut sql = format!(
            "SELECT {SIGNAL_COLUMNS} FROM agent_signals
             WHERE status = 'active' AND (target_agent = ?1 OR target_agent IS NULL)"
        );
        let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(caller.as_str().to_string())];
        let mut idx = 2;

        if let Some(types) = types {
            if !types.is_empty() {
                let placeholders: Vec<String> =
                    (idx..idx + types.len()).map(|i| format!("?{i}")).collect();
                sql.push_str(&format!(" AND signal_type IN ({})", placeholders.join(", ")));
                for t in types {
                    sql_params.push(Box::new(t.as_str().to_string()));
                }
                idx += types.len();
            }
        }
        if let Some(ceiling) = min_priority {
            sql.push_str(&format!(" AND priority <= ?{idx}"));
            sql_params.push(Box::new(ceiling));
            idx += 1;
        }
        sql.push_str(&format!(
            " ORDER BY priority ASC, created_at DESC LIMIT ?{idx}"
        ));
        sql_params.push(Box::new(limit as i64));

        self.query_signals(&sql, &sql_params)
    }

    /// Active signals in the recency window, regardless of target.
    /// Same ordering as `consumable_signals`.
    pub(crate) fn recent_signals(
        &self,
        cutoff: &str,
        types: Option<&[SignalType]>,
        source: Option<AgentId>,
        limit: usize,
    ) -> Result<Vec<Signal>, DbError> {
        let mut sql = format!(
            "SELECT {SIGNAL_COLUMNS} FROM agent_signals
             WHERE status = 'active' AND created_at >= ?1"
        );
        let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(cutoff.to_string())];
        let mut idx = 2;

        if let Some(types) = types {
            if !types.is_empty() {
                let placeholders: Vec<String> =
                    (idx..idx + types.len()).map(|i| format!("?{i}")).collect();
                sql.push_str(&format!(" AND signal_type IN ({})", placeholders.join(", ")));
                for t in types {
                    sql_params.push(Box::new(t.as_str().to_string()));
                }
                idx += types.len();
            }
        }
        if let Some(source) = source {
            sql.push_str(&format!(" AND source_agent = ?{idx}"));
            sql_params.push(Box::new(source.as_str().to_string()));
            idx += 1;
        }
        sql.push_str(&format!(
            " ORDER BY priority ASC, created_at DESC LIMIT ?{idx}"
        ));
        sql_params.push(Box::new(limit as i64));

        self.query_signals(&sql, &sql_params)
    }

    /// Batch-transition the given ids to consumed. The `status = 'active'`
    /// guard keeps terminal states terminal; rows another consumer marked
    /// first are simply skipped. Returns the number of rows changed.
    pub(crate) fn mark_consumed(
        &self,
        ids: &[String],
        caller: AgentId,
        consumed_at: &str,
    ) -> Result<usize, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders: Vec<String> = (3..3 + ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "UPDATE agent_signals
             SET status = 'consumed', consumed_by = ?1, consumed_at = ?2
             WHERE id IN ({}) AND status = 'active'",
            placeholders.join(", ")
        );

        let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
            Box::new(caller.as_str().to_string()),
            Box::new(consumed_at.to_string()),
        ];
        for id in ids {
            sql_params.push(Box::new(id.clone()));
        }

        let changed = self.conn().execute(
            &sql,
            rusqlite::params_from_iter(sql_params.iter().map(|p| p.as_ref())),
        )?;
        Ok(changed)
    }

    /// One-way transition to dismissed. Unknown ids and already-terminal
    /// rows change nothing. Returns whether a row changed.
    pub(crate) fn dismiss_signal(&self, id: &str, caller: AgentId) -> Result<bool, DbError> {
        let changed = self.conn().execute(
            "UPDATE agent_signals
             SET status = 'dismissed', consumed_by = ?1
             WHERE id = ?2 AND status = 'active'",
            params![caller.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    /// True iff an active signal of `signal_type` exists at or after `cutoff`.
    pub(crate) fn has_recent_signal(
        &self,
        signal_type: SignalType,
        cutoff: &str,
    ) -> Result<bool, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT 1 FROM agent_signals
             WHERE status = 'active' AND signal_type = ?1 AND created_at >= ?2
             LIMIT 1",
        )?;
        Ok(stmt.exists(params![signal_type.as_str(), cutoff])?)
    }

    /// Most recent active signal of `signal_type`, regardless of target or
    /// window.
    pub(crate) fn latest_signal(&self, signal_type: SignalType) -> Result<Option<Signal>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM agent_signals
             WHERE status = 'active' AND signal_type = ?1
             ORDER BY created_at DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![signal_type.as_str()], map_signal_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Fetch one signal by id. Used by tests and diagnostics.
    pub(crate) fn signal_by_id(&self, id: &str) -> Result<Option<Signal>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM agent_signals WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], map_signal_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Run a SELECT over `SIGNAL_COLUMNS`, skipping unreadable rows. A row
    /// written by a newer fleet build (unknown agent or tag) degrades to a
    /// warning instead of failing the whole read.
    fn query_signals(
        &self,
        sql: &str,
        sql_params: &[Box<dyn rusqlite::types::ToSql>],
    ) -> Result<Vec<Signal>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(sql_params.iter().map(|p| p.as_ref())),
            map_signal_row,
        )?;

        let mut signals = Vec::new();
        for row in rows {
            match row {
                Ok(signal) => signals.push(signal),
                Err(e) => log::warn!("SignalDb: skipping unreadable signal row: {}", e),
            }
        }
        Ok(signals)
    }
}

/// Map one `SIGNAL_COLUMNS` row into a `Signal`.
fn map_signal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Signal> {
    let source_raw: String = row.get(1)?;
    let target_raw: Option<String> = row.get(2)?;
    let type_raw: String = row.get(3)?;
    let payload_raw: String = row.get(5)?;
    let status_raw: String = row.get(7)?;
    let consumed_by_raw: Option<String> = row.get(8)?;

    let source_agent =
        AgentId::parse(&source_raw).ok_or_else(|| column_parse_err(1, "agent", &source_raw))?;
    let target_agent = match target_raw {
        Some(raw) => Some(AgentId::parse(&raw).ok_or_else(|| column_parse_err(2, "agent", &raw))?),
        None => None,
    };
    let signal_type =
        SignalType::parse(&type_raw).ok_or_else(|| column_parse_err(3, "signal type", &type_raw))?;
    let status =
        SignalStatus::parse(&status_raw).ok_or_else(|| column_parse_err(7, "status", &status_raw))?;
    let consumed_by = match consumed_by_raw {
        Some(raw) => Some(AgentId::parse(&raw).ok_or_else(|| column_parse_err(8, "agent", &raw))?),
        None => None,
    };

    // Corrupt payload text degrades to an empty map; the message still means
    // something to the consumer.
    let payload = match serde_json::from_str::<Value>(&payload_raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            log::warn!("SignalDb: replacing unparseable payload with an empty map");
            Payload::new()
        }
    };

    Ok(Signal {
        id: row.get(0)?,
        source_agent,
        target_agent,
        signal_type,
        priority: row.get(4)?,
        payload,
        message: row.get(6)?,
        status,
        consumed_by,
        consumed_at: row.get(9)?,
        expires_at: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn column_parse_err(idx: usize, what: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unknown {what} '{raw}'").into(),
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::util;

    fn insert_basic(
        db: &SignalDb,
        id: &str,
        source: AgentId,
        target: Option<AgentId>,
        signal_type: SignalType,
        priority: i64,
    ) {
        let now = util::now_rfc3339();
        db.insert_signal(
            id,
            source,
            target,
            signal_type,
            priority,
            "{}",
            "test message",
            &now,
            &now,
        )
        .expect("insert");
    }

    #[test]
    fn test_insert_and_map_round_trip() {
        let db = test_db();
        let now = util::now_rfc3339();
        db.insert_signal(
            "sig-rt",
            AgentId::Finance,
            Some(AgentId::Health),
            SignalType::BudgetAlert,
            1,
            r#"{"category":"restaurant","over":42.5}"#,
            "Restaurant over budget",
            &now,
            &now,
        )
        .expect("insert");

        let signal = db
            .signal_by_id("sig-rt")
            .expect("query")
            .expect("row should exist");
        assert_eq!(signal.id, "sig-rt");
        assert_eq!(signal.source_agent, AgentId::Finance);
        assert_eq!(signal.target_agent, Some(AgentId::Health));
        assert_eq!(signal.signal_type, SignalType::BudgetAlert);
        assert_eq!(signal.priority, 1);
        assert_eq!(signal.message, "Restaurant over budget");
        assert_eq!(signal.status, SignalStatus::Active);
        assert_eq!(signal.payload["category"], "restaurant");
        assert_eq!(signal.payload["over"], 42.5);
        assert!(signal.consumed_by.is_none());
        assert!(signal.consumed_at.is_none());
        assert_eq!(signal.created_at, now);
    }

    #[test]
    fn test_unreadable_rows_are_skipped() {
        let db = test_db();
        insert_basic(
            &db,
            "sig-good",
            AgentId::Health,
            None,
            SignalType::WorkoutMissed,
            3,
        );
        // A row from some future fleet build with an unknown agent name
        db.conn()
            .execute(
                "INSERT INTO agent_signals (id, source_agent, signal_type, message,
                 expires_at, created_at)
                 VALUES ('sig-alien', 'gardening', 'workout_missed', 'm', ?1, ?1)",
                params![util::now_rfc3339()],
            )
            .expect("raw insert");

        let signals = db
            .consumable_signals(AgentId::Health, None, None, 20)
            .expect("query");
        assert_eq!(signals.len(), 1, "unknown-agent row should be skipped");
        assert_eq!(signals[0].id, "sig-good");
    }

    #[test]
    fn test_corrupt_payload_degrades_to_empty_map() {
        let db = test_db();
        let now = util::now_rfc3339();
        db.conn()
            .execute(
                "INSERT INTO agent_signals (id, source_agent, signal_type, payload, message,
                 expires_at, created_at)
                 VALUES ('sig-bad-payload', 'trading', 'trade_executed', 'not json', 'm', ?1, ?1)",
                params![now],
            )
            .expect("raw insert");

        let signal = db
            .signal_by_id("sig-bad-payload")
            .expect("query")
            .expect("row should exist");
        assert!(signal.payload.is_empty());
        assert_eq!(signal.message, "m");
    }

    #[test]
    fn test_type_filter_uses_in_clause() {
        let db = test_db();
        insert_basic(&db, "sig-b", AgentId::Finance, None, SignalType::BudgetAlert, 3);
        insert_basic(&db, "sig-s", AgentId::Learning, None, SignalType::StudyStreak, 3);
        insert_basic(&db, "sig-t", AgentId::Trading, None, SignalType::TradeExecuted, 3);

        let signals = db
            .consumable_signals(
                AgentId::Health,
                Some(&[SignalType::BudgetAlert, SignalType::StudyStreak]),
                None,
                20,
            )
            .expect("query");
        let ids: Vec<&str> = signals.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"sig-b") && ids.contains(&"sig-s"));
    }

    #[test]
    fn test_empty_type_list_means_no_filter() {
        let db = test_db();
        insert_basic(&db, "sig-b", AgentId::Finance, None, SignalType::BudgetAlert, 3);
        let signals = db
            .consumable_signals(AgentId::Health, Some(&[]), None, 20)
            .expect("query");
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn test_mark_consumed_respects_active_guard() {
        let db = test_db();
        insert_basic(&db, "sig-1", AgentId::Finance, None, SignalType::BudgetAlert, 3);
        insert_basic(&db, "sig-2", AgentId::Finance, None, SignalType::BudgetAlert, 3);

        let now = util::now_rfc3339();
        let ids = vec!["sig-1".to_string(), "sig-2".to_string()];
        let changed = db
            .mark_consumed(&ids, AgentId::Health, &now)
            .expect("first mark");
        assert_eq!(changed, 2);

        // Second mark by another agent touches nothing
        let changed = db
            .mark_consumed(&ids, AgentId::Trading, &now)
            .expect("second mark");
        assert_eq!(changed, 0);

        let signal = db.signal_by_id("sig-1").expect("query").expect("row");
        assert_eq!(signal.status, SignalStatus::Consumed);
        assert_eq!(signal.consumed_by, Some(AgentId::Health), "first marker wins");
        assert_eq!(signal.consumed_at.as_deref(), Some(now.as_str()));
    }

    #[test]
    fn test_mark_consumed_empty_ids_is_noop() {
        let db = test_db();
        let changed = db
            .mark_consumed(&[], AgentId::Health, &util::now_rfc3339())
            .expect("mark");
        assert_eq!(changed, 0);
    }

    #[test]
    fn test_dismiss_guard() {
        let db = test_db();
        insert_basic(&db, "sig-d", AgentId::Career, None, SignalType::OfferReceived, 2);

        assert!(db.dismiss_signal("sig-d", AgentId::Career).expect("dismiss"));
        let signal = db.signal_by_id("sig-d").expect("query").expect("row");
        assert_eq!(signal.status, SignalStatus::Dismissed);
        assert_eq!(signal.consumed_by, Some(AgentId::Career));
        assert!(signal.consumed_at.is_none(), "dismiss does not stamp consumed_at");

        // Terminal rows and unknown ids change nothing
        assert!(!db.dismiss_signal("sig-d", AgentId::Health).expect("re-dismiss"));
        assert!(!db.dismiss_signal("sig-missing", AgentId::Health).expect("unknown id"));
        let signal = db.signal_by_id("sig-d").expect("query").expect("row");
        assert_eq!(signal.consumed_by, Some(AgentId::Career));
    }
}

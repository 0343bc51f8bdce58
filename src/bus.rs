//! The pub/sub surface one agent talks to.
//!
//! Delivery is best-effort by contract: every public operation catches store
//! errors, logs a diagnostic, and returns a neutral value (`None`, an empty
//! vec, `false`). A failed emit is a lost signal and a failed read means "no
//! signals this time"; the caller's primary workflow is never aborted and
//! there is no retry or dead-letter path. Callers that need the error itself
//! are holding the wrong layer: that is what `SignalDb` returns.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::agents::AgentId;
use crate::config::BusConfig;
use crate::db::{DbError, SignalDb};
use crate::types::{
    ActiveSummary, ConsumeOptions, EmitOptions, Payload, PeekOptions, Signal, SignalStatus,
    SignalType, SUMMARY_LIMIT, SUMMARY_WINDOW_HOURS,
};
use crate::util;

/// Signal bus handle for one agent.
pub struct SignalBus {
    agent: AgentId,
    db: Arc<SignalDb>,
}

impl SignalBus {
    /// Bus handle for `agent` over a shared store.
    pub fn new(agent: AgentId, db: Arc<SignalDb>) -> Self {
        Self { agent, db }
    }

    /// Open the store this config points at and wrap it for `agent`.
    pub fn open(agent: AgentId, config: &BusConfig) -> Result<Self, DbError> {
        Ok(Self::new(agent, Arc::new(config.open_db()?)))
    }

    /// The agent this handle emits and consumes as.
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Publish a signal. Returns the generated id, or None after a logged
    /// store failure. `expires_at` is stamped as `now + ttl_hours` from a
    /// single clock read, so the TTL arithmetic is exact.
    pub fn emit(
        &self,
        signal_type: SignalType,
        message: &str,
        payload: Payload,
        opts: EmitOptions,
    ) -> Option<String> {
        match self.try_emit(signal_type, message, &payload, &opts) {
            Ok(id) => {
                log::debug!("SignalBus: {} emitted {} as {}", self.agent, signal_type, id);
                Some(id)
            }
            Err(e) => {
                log::warn!(
                    "SignalBus: emit {} from {} failed: {}",
                    signal_type,
                    self.agent,
                    e
                );
                None
            }
        }
    }

    fn try_emit(
        &self,
        signal_type: SignalType,
        message: &str,
        payload: &Payload,
        opts: &EmitOptions,
    ) -> Result<String, DbError> {
        let id = format!("sig-{}", Uuid::new_v4());
        let now = Utc::now();
        let created_at = now.to_rfc3339();
        let expires_at = (now + Duration::hours(opts.ttl_hours)).to_rfc3339();
        let payload_json = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());

        self.db.insert_signal(
            &id,
            self.agent,
            opts.target,
            signal_type,
            opts.priority,
            &payload_json,
            message,
            &expires_at,
            &created_at,
        )?;
        Ok(id)
    }

    /// Active signals addressed to this agent (targeted or broadcast), most
    /// urgent first, newest first within equal priority. With
    /// `mark_consumed`, matches are transitioned to consumed in one batched
    /// update after the read; the two steps are deliberately not atomic, so
    /// concurrent overlapping consumers may both observe a row
    /// (at-least-once observation).
    pub fn consume(&self, opts: ConsumeOptions) -> Vec<Signal> {
        match self.try_consume(&opts) {
            Ok(signals) => signals,
            Err(e) => {
                log::warn!("SignalBus: consume for {} failed: {}", self.agent, e);
                Vec::new()
            }
        }
    }

    fn try_consume(&self, opts: &ConsumeOptions) -> Result<Vec<Signal>, DbError> {
        let mut signals = self.db.consumable_signals(
            self.agent,
            opts.types.as_deref(),
            opts.min_priority,
            opts.limit,
        )?;

        if opts.mark_consumed && !signals.is_empty() {
            let ids: Vec<String> = signals.iter().map(|s| s.id.clone()).collect();
            let consumed_at = util::now_rfc3339();
            let changed = self.db.mark_consumed(&ids, self.agent, &consumed_at)?;
            if changed < ids.len() {
                log::debug!(
                    "SignalBus: {} of {} consumed signals were already terminal",
                    ids.len() - changed,
                    ids.len()
                );
            }
            for signal in &mut signals {
                signal.status = SignalStatus::Consumed;
                signal.consumed_by = Some(self.agent);
                signal.consumed_at = Some(consumed_at.clone());
            }
        }

        Ok(signals)
    }

    /// Active signals in the recency window, without consuming. Not filtered
    /// by target: peek is an observability read over the whole window. Safe
    /// to call repeatedly.
    pub fn peek(&self, opts: PeekOptions) -> Vec<Signal> {
        match self.try_peek(&opts) {
            Ok(signals) => signals,
            Err(e) => {
                log::warn!("SignalBus: peek for {} failed: {}", self.agent, e);
                Vec::new()
            }
        }
    }

    fn try_peek(&self, opts: &PeekOptions) -> Result<Vec<Signal>, DbError> {
        let cutoff = util::rfc3339_hours_ago(opts.hours_back);
        self.db
            .recent_signals(&cutoff, opts.types.as_deref(), opts.source, opts.limit)
    }

    /// Transition one signal to dismissed with this agent recorded as the
    /// dismisser. Silently a no-op when the id is unknown or the signal is
    /// already terminal.
    pub fn dismiss(&self, signal_id: &str) {
        match self.db.dismiss_signal(signal_id, self.agent) {
            Ok(true) => log::debug!("SignalBus: {} dismissed {}", self.agent, signal_id),
            Ok(false) => {}
            Err(e) => log::warn!("SignalBus: dismiss {} failed: {}", signal_id, e),
        }
    }

    /// True iff at least one active signal of `signal_type` was created in
    /// the last `hours_back` hours. Used as a cheap dedup probe before
    /// re-emitting.
    pub fn has_recent(&self, signal_type: SignalType, hours_back: i64) -> bool {
        let cutoff = util::rfc3339_hours_ago(hours_back);
        match self.db.has_recent_signal(signal_type, &cutoff) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("SignalBus: has_recent {} failed: {}", signal_type, e);
                false
            }
        }
    }

    /// Most recent active signal of `signal_type`, or None.
    pub fn get_latest(&self, signal_type: SignalType) -> Option<Signal> {
        match self.db.latest_signal(signal_type) {
            Ok(signal) => signal,
            Err(e) => {
                log::warn!("SignalBus: get_latest {} failed: {}", signal_type, e);
                None
            }
        }
    }

    /// Reduce the last 24 hours of active signals (cap 50) into counts for
    /// the briefing agents. Inherits peek's fail-soft behavior: on store
    /// failure the summary is empty.
    pub fn active_summary(&self) -> ActiveSummary {
        let window = self.peek(PeekOptions {
            hours_back: SUMMARY_WINDOW_HOURS,
            limit: SUMMARY_LIMIT,
            ..Default::default()
        });
        ActiveSummary::from_signals(&window)
    }
}

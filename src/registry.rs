//! Process-wide bus cache.
//!
//! A host process that drives several agents (the scheduler, the Telegram
//! frontend) opens the store once and hands out one `SignalBus` per agent.
//! Handles are cached, so repeated `get` calls for the same agent return the
//! same instance.

use std::sync::Arc;

use dashmap::DashMap;

use crate::agents::AgentId;
use crate::bus::SignalBus;
use crate::config::BusConfig;
use crate::db::{DbError, SignalDb};

pub struct BusRegistry {
    db: Arc<SignalDb>,
    buses: DashMap<AgentId, Arc<SignalBus>>,
}

impl BusRegistry {
    /// Open the store this config points at and build an empty registry
    /// around it.
    pub fn open(config: &BusConfig) -> Result<Self, DbError> {
        Ok(Self::with_db(Arc::new(config.open_db()?)))
    }

    /// Registry over an already-open store. All buses handed out share it.
    pub fn with_db(db: Arc<SignalDb>) -> Self {
        Self {
            db,
            buses: DashMap::new(),
        }
    }

    /// The bus for `agent`, created on first request.
    pub fn get(&self, agent: AgentId) -> Arc<SignalBus> {
        if let Some(bus) = self.buses.get(&agent) {
            return bus.clone();
        }
        self.buses
            .entry(agent)
            .or_insert_with(|| Arc::new(SignalBus::new(agent, self.db.clone())))
            .clone()
    }

    /// Number of buses created so far.
    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }
}

//! Inter-agent signal bus for the LifeOS automation fleet.
//!
//! Agents (finance, health, career, ...) run on independent schedules and
//! never call each other directly. Instead they publish signals to a shared
//! SQLite-backed log and pick up what concerns them on their next run:
//!
//! - [`SignalBus::emit`] publishes, targeted at one agent or broadcast.
//! - [`SignalBus::consume`] reads the caller's active signals, most urgent
//!   first, optionally marking them consumed.
//! - [`SignalBus::peek`], [`SignalBus::has_recent`], [`SignalBus::get_latest`],
//!   and [`SignalBus::active_summary`] observe without consuming.
//!
//! Signal delivery is best-effort: bus operations log store failures and
//! return neutral values rather than erroring, so a broken bus never takes
//! an agent's primary workflow down with it.

pub mod agents;
pub mod bus;
pub mod config;
pub mod db;
pub mod housekeeping;
mod migrations;
pub mod registry;
pub mod types;
pub mod util;

pub use agents::AgentId;
pub use bus::SignalBus;
pub use config::BusConfig;
pub use db::{DbError, SignalDb};
pub use registry::BusRegistry;
pub use types::{
    ActiveSummary, ConsumeOptions, EmitOptions, Payload, PeekOptions, Signal, SignalStatus,
    SignalType,
};

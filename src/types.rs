//! Signal vocabulary and bus option types.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::AgentId;
use crate::util;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Priority applied when an emitter does not pick one. Midpoint of the 1-5
/// convention; 1 is most critical. The bus never enforces a bound.
pub const DEFAULT_PRIORITY: i64 = 3;

/// TTL applied at emit when not overridden.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Result cap for `consume` when not overridden.
pub const DEFAULT_CONSUME_LIMIT: usize = 20;

/// Result cap for `peek` when not overridden.
pub const DEFAULT_PEEK_LIMIT: usize = 10;

/// Window scanned by `active_summary`.
pub const SUMMARY_WINDOW_HOURS: i64 = 24;

/// Result cap for the `active_summary` scan.
pub const SUMMARY_LIMIT: usize = 50;

/// Signals at or below this priority count as critical in summaries.
pub const CRITICAL_PRIORITY_CEILING: i64 = 2;

// ---------------------------------------------------------------------------
// Signal vocabulary
// ---------------------------------------------------------------------------

/// Event tag carried by every signal, grouped by originating domain. Purely
/// a filtering vocabulary: the bus compares tags for equality/membership and
/// nothing else. Payload shape per tag is a convention between emitter and
/// consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    // career
    InterviewScheduled,
    ApplicationUpdate,
    OfferReceived,
    // finance
    BudgetAlert,
    LargeExpense,
    SavingsMilestone,
    // trading
    TradeExecuted,
    PortfolioDrawdown,
    // health
    WorkoutMissed,
    SleepDeficit,
    HealthMilestone,
    // learning
    StudyStreak,
    StudyLapse,
    CourseCompleted,
    // growth
    GoalMilestone,
    GoalStalled,
    // tasks and briefings
    TaskOverdue,
    DigestReady,
}

impl SignalType {
    /// Every known tag, in declaration order.
    pub const ALL: [SignalType; 18] = [
        SignalType::InterviewScheduled,
        SignalType::ApplicationUpdate,
        SignalType::OfferReceived,
        SignalType::BudgetAlert,
        SignalType::LargeExpense,
        SignalType::SavingsMilestone,
        SignalType::TradeExecuted,
        SignalType::PortfolioDrawdown,
        SignalType::WorkoutMissed,
        SignalType::SleepDeficit,
        SignalType::HealthMilestone,
        SignalType::StudyStreak,
        SignalType::StudyLapse,
        SignalType::CourseCompleted,
        SignalType::GoalMilestone,
        SignalType::GoalStalled,
        SignalType::TaskOverdue,
        SignalType::DigestReady,
    ];

    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::InterviewScheduled => "interview_scheduled",
            SignalType::ApplicationUpdate => "application_update",
            SignalType::OfferReceived => "offer_received",
            SignalType::BudgetAlert => "budget_alert",
            SignalType::LargeExpense => "large_expense",
            SignalType::SavingsMilestone => "savings_milestone",
            SignalType::TradeExecuted => "trade_executed",
            SignalType::PortfolioDrawdown => "portfolio_drawdown",
            SignalType::WorkoutMissed => "workout_missed",
            SignalType::SleepDeficit => "sleep_deficit",
            SignalType::HealthMilestone => "health_milestone",
            SignalType::StudyStreak => "study_streak",
            SignalType::StudyLapse => "study_lapse",
            SignalType::CourseCompleted => "course_completed",
            SignalType::GoalMilestone => "goal_milestone",
            SignalType::GoalStalled => "goal_stalled",
            SignalType::TaskOverdue => "task_overdue",
            SignalType::DigestReady => "digest_ready",
        }
    }

    /// Parse from a SQL string. None for unknown tags.
    pub fn parse(s: &str) -> Option<Self> {
        SignalType::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a signal. Transitions are one-way: `active` to
/// `consumed` or `dismissed`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Active,
    Consumed,
    Dismissed,
}

impl SignalStatus {
    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Active => "active",
            SignalStatus::Consumed => "consumed",
            SignalStatus::Dismissed => "dismissed",
        }
    }

    /// Parse from a SQL string. None for unknown labels.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SignalStatus::Active),
            "consumed" => Some(SignalStatus::Consumed),
            "dismissed" => Some(SignalStatus::Dismissed),
            _ => None,
        }
    }
}

/// Event-specific structured data carried by a signal. The bus stores it as
/// JSON text and never validates its shape.
pub type Payload = Map<String, Value>;

/// A row from the `agent_signals` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    pub source_agent: AgentId,
    /// None means broadcast: visible to every consumer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<AgentId>,
    pub signal_type: SignalType,
    pub priority: i64,
    #[serde(default)]
    pub payload: Payload,
    pub message: String,
    pub status: SignalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_by: Option<AgentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<String>,
    pub expires_at: String,
    pub created_at: String,
}

impl Signal {
    /// True when the signal has no designated recipient.
    pub fn is_broadcast(&self) -> bool {
        self.target_agent.is_none()
    }

    /// True when priority is at or below the critical ceiling.
    pub fn is_critical(&self) -> bool {
        self.priority <= CRITICAL_PRIORITY_CEILING
    }

    /// True when `expires_at` is in the past. Advisory only: expired rows
    /// stay in the store until housekeeping archives them.
    pub fn is_expired(&self) -> bool {
        match util::parse_rfc3339(&self.expires_at) {
            Some(expires) => expires < Utc::now(),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Operation options
// ---------------------------------------------------------------------------

/// Options for `SignalBus::emit`.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Recipient agent; None broadcasts to all agents.
    pub target: Option<AgentId>,
    /// Lower is more urgent; 1 is most critical.
    pub priority: i64,
    /// Hours until the signal counts as stale.
    pub ttl_hours: i64,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            target: None,
            priority: DEFAULT_PRIORITY,
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

/// Options for `SignalBus::consume`.
#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    /// Restrict to these tags; None means any tag. An empty list is treated
    /// the same as None.
    pub types: Option<Vec<SignalType>>,
    /// Urgency ceiling: only signals with `priority <= min_priority`.
    pub min_priority: Option<i64>,
    pub limit: usize,
    /// When true, returned signals are transitioned to consumed in one
    /// batched update after the read.
    pub mark_consumed: bool,
}

impl Default for ConsumeOptions {
    fn default() -> Self {
        Self {
            types: None,
            min_priority: None,
            limit: DEFAULT_CONSUME_LIMIT,
            mark_consumed: false,
        }
    }
}

/// Options for `SignalBus::peek`.
#[derive(Debug, Clone)]
pub struct PeekOptions {
    /// Recency window over `created_at`.
    pub hours_back: i64,
    /// Restrict to these tags; None means any tag. An empty list is treated
    /// the same as None.
    pub types: Option<Vec<SignalType>>,
    /// Restrict to one emitting agent.
    pub source: Option<AgentId>,
    pub limit: usize,
}

impl Default for PeekOptions {
    fn default() -> Self {
        Self {
            hours_back: SUMMARY_WINDOW_HOURS,
            types: None,
            source: None,
            limit: DEFAULT_PEEK_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Aggregate view of the recent active window, serializable for the
/// briefing agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSummary {
    pub total: usize,
    /// Signals with `priority <= CRITICAL_PRIORITY_CEILING`.
    pub critical: usize,
    pub by_source: BTreeMap<AgentId, usize>,
    pub by_type: BTreeMap<SignalType, usize>,
}

impl ActiveSummary {
    /// Reduce a window of signals, as returned by peek, into counts.
    pub fn from_signals(signals: &[Signal]) -> Self {
        let mut critical = 0;
        let mut by_source: BTreeMap<AgentId, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<SignalType, usize> = BTreeMap::new();
        for signal in signals {
            if signal.is_critical() {
                critical += 1;
            }
            *by_source.entry(signal.source_agent).or_default() += 1;
            *by_type.entry(signal.signal_type).or_default() += 1;
        }
        Self {
            total: signals.len(),
            critical,
            by_source,
            by_type,
        }
    }
}

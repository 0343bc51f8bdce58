//! Agent identity for the LifeOS fleet.
//!
//! Participants are a closed, compile-time list. The bus is agnostic to what
//! each agent does; every signal row just names its emitter (and optionally
//! one recipient) from this enumeration. Adding a participant means adding a
//! variant here and nothing else.

use serde::{Deserialize, Serialize};

/// A scheduled agent participating in the signal bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentId {
    Career,
    Higrow,
    Trading,
    Health,
    Learning,
    Finance,
    MorningBriefing,
    EveningReview,
    TaskReminder,
    TelegramBot,
}

impl AgentId {
    /// Every known participant, in declaration order.
    pub const ALL: [AgentId; 10] = [
        AgentId::Career,
        AgentId::Higrow,
        AgentId::Trading,
        AgentId::Health,
        AgentId::Learning,
        AgentId::Finance,
        AgentId::MorningBriefing,
        AgentId::EveningReview,
        AgentId::TaskReminder,
        AgentId::TelegramBot,
    ];

    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Career => "career",
            AgentId::Higrow => "higrow",
            AgentId::Trading => "trading",
            AgentId::Health => "health",
            AgentId::Learning => "learning",
            AgentId::Finance => "finance",
            AgentId::MorningBriefing => "morning-briefing",
            AgentId::EveningReview => "evening-review",
            AgentId::TaskReminder => "task-reminder",
            AgentId::TelegramBot => "telegram-bot",
        }
    }

    /// Parse from a SQL string. Returns None for unknown names; the store
    /// layer skips such rows instead of failing the whole query.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "career" => Some(AgentId::Career),
            "higrow" => Some(AgentId::Higrow),
            "trading" => Some(AgentId::Trading),
            "health" => Some(AgentId::Health),
            "learning" => Some(AgentId::Learning),
            "finance" => Some(AgentId::Finance),
            "morning-briefing" => Some(AgentId::MorningBriefing),
            "evening-review" => Some(AgentId::EveningReview),
            "task-reminder" => Some(AgentId::TaskReminder),
            "telegram-bot" => Some(AgentId::TelegramBot),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

use serde::{Deserialize, Serialize};

use crate::storage::Configuration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Focus, Phase::ShortBreak, Phase::LongBreak];

    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Focus)
    }

    /// Stable identifier used in storage and the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Focus => "focus",
            Phase::ShortBreak => "short_break",
            Phase::LongBreak => "long_break",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Phase::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::ShortBreak => "Short break",
            Phase::LongBreak => "Long break",
        }
    }

    /// Configured length of this phase in minutes.
    pub fn duration_min(self, config: &Configuration) -> u32 {
        match self {
            Phase::Focus => config.focus_minutes,
            Phase::ShortBreak => config.short_break_minutes,
            Phase::LongBreak => config.long_break_minutes,
        }
    }

    /// Configured length of this phase in seconds.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn duration_secs(self, config: &Configuration) -> u64 {
        u64::from(self.duration_min(config)).saturating_mul(60)
    }

    /// Whether entering this phase should start the countdown on its own.
    pub fn auto_starts(self, config: &Configuration) -> bool {
        if self.is_break() {
            config.auto_start_breaks
        } else {
            config.auto_start_focus
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Phase that follows `current` once it expires naturally.
///
/// `completed_focus` is the counter value *after* the increment for a
/// finished focus phase.
pub fn next_phase(current: Phase, completed_focus: u64, long_break_interval: u32) -> Phase {
    match current {
        Phase::Focus => {
            let interval = u64::from(long_break_interval.max(1));
            if completed_focus % interval == 0 {
                Phase::LongBreak
            } else {
                Phase::ShortBreak
            }
        }
        Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
    }
}

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

/// How hard a single bot search may work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchLimits {
    pub max_depth: u32,
    pub time_budget: Duration,
    /// Probability of skipping the search and playing a random legal move.
    pub random_move_chance: f64,
}

impl Difficulty {
    pub fn limits(&self) -> SearchLimits {
        let (max_depth, budget_ms, random_move_chance) = match self {
            Difficulty::Easy => (5, 1_000, 0.25),
            Difficulty::Medium => (8, 2_000, 0.10),
            Difficulty::Hard => (12, 3_000, 0.0),
            Difficulty::Expert => (20, 5_000, 0.0),
        };
        SearchLimits {
            max_depth,
            time_budget: Duration::from_millis(budget_ms),
            random_move_chance,
        }
    }

    /// Pause a front end may insert before showing a bot move. The engine never waits on it.
    pub fn thinking_delay(&self) -> Duration {
        Duration::from_millis(match self {
            Difficulty::Easy => 500,
            Difficulty::Medium => 800,
            Difficulty::Hard => 1_200,
            Difficulty::Expert => 1_500,
        })
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            _ => Err(ConfigError::UnknownDifficulty(s.to_string())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum number of cached positions shared by all bot searches.
    pub tt_capacity: usize,

    /// Extra capture-only plies searched past the nominal depth.
    pub quiescence_depth: u32,

    /// Time a participant has for each turn before forfeiting.
    pub turn_time: Duration,

    /// Whether bots may play pre-registered opening moves.
    pub opening_book: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tt_capacity: 200_000,
            quiescence_depth: 6,
            turn_time: Duration::from_secs(30),
            opening_book: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            tt_capacity: lookup("CHECKERS_TT_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tt_capacity),
            quiescence_depth: lookup("CHECKERS_QUIESCENCE_DEPTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.quiescence_depth),
            turn_time: lookup("CHECKERS_TURN_SECONDS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.turn_time),
            opening_book: lookup("CHECKERS_OPENING_BOOK")
                .map(|v| !matches!(v.trim(), "0" | "false" | "off"))
                .unwrap_or(defaults.opening_book),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn tiers_match_published_limits() {
        let easy = Difficulty::Easy.limits();
        assert_eq!(easy.max_depth, 5);
        assert_eq!(easy.time_budget, Duration::from_secs(1));
        assert_eq!(easy.random_move_chance, 0.25);

        let expert = Difficulty::Expert.limits();
        assert_eq!(expert.max_depth, 20);
        assert_eq!(expert.time_budget, Duration::from_secs(5));
        assert_eq!(expert.random_move_chance, 0.0);
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(Difficulty::Medium.to_string(), "medium");
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn lookup_overrides_and_falls_back() {
        let vars: HashMap<&str, &str> = [
            ("CHECKERS_TT_CAPACITY", "1024"),
            ("CHECKERS_TURN_SECONDS", "soon"),
            ("CHECKERS_OPENING_BOOK", "false"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.tt_capacity, 1024);
        assert_eq!(config.quiescence_depth, 6);
        assert_eq!(config.turn_time, Duration::from_secs(30));
        assert!(!config.opening_book);
    }
}

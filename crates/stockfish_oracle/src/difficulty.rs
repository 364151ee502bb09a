//! Difficulty presets for the move oracle
//!
//! Each named difficulty maps to a fixed [`DifficultyProfile`]: the engine's
//! `Skill Level`, a search-time budget and a depth cap. The search stops at
//! whichever limit is reached first.
//!
//! | Difficulty | Skill Level | Time/Move | Depth Cap |
//! |------------|-------------|-----------|-----------|
//! | Easy       | 1           | 0.01s     | 5         |
//! | Medium     | 10          | 0.1s      | 12        |
//! | Hard       | 15          | 0.3s      | 16        |
//!
//! Unknown names fall back to `Medium`:
//!
//! ```rust,ignore
//! let profile = Difficulty::parse_or_default("HARD").profile();
//! assert_eq!(profile.skill_level, 15);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Search parameters for this difficulty
    pub fn profile(self) -> DifficultyProfile {
        let (skill_level, search_time, depth_cap) = match self {
            Difficulty::Easy => (1, 0.01, 5),
            Difficulty::Medium => (10, 0.1, 12),
            Difficulty::Hard => (15, 0.3, 16),
        };
        DifficultyProfile {
            name: self.name(),
            skill_level,
            search_time,
            depth_cap,
        }
    }

    /// Parse a difficulty name, falling back to [`Difficulty::Medium`]
    pub fn parse_or_default(name: &str) -> Difficulty {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Oracle search parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    pub name: &'static str,
    /// Engine `Skill Level` option (0-20)
    pub skill_level: u8,
    /// Time budget per move, seconds
    pub search_time: f32,
    pub depth_cap: u8,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Difficulty::default().profile()
    }
}

impl DifficultyProfile {
    pub fn search_time(&self) -> Duration {
        Duration::from_secs_f32(self.search_time.max(0.0))
    }

    /// Limits for one `go` command
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            movetime_ms: ((self.search_time * 1000.0).round() as u64).max(1),
            depth: self.depth_cap,
        }
    }
}

/// Bounds of a single engine search; whichever is hit first ends it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub movetime_ms: u64,
    pub depth: u8,
}

impl SearchLimits {
    /// UCI `go` command for these limits
    pub fn go_command(&self) -> String {
        format!("go movetime {} depth {}", self.movetime_ms, self.depth)
    }
}

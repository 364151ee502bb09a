//! Service settings
//!
//! [`Settings`] are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. a JSON settings file: `--config <path>` if given (must exist and
//!    parse), otherwise `settings.json` in the platform config directory
//!    (e.g. `~/.config/robochess/settings.json`) when present
//! 3. environment (`.env` is loaded first): `ROBOCHESS_HOST`,
//!    `ROBOCHESS_PORT`, `STOCKFISH_PATH`, `ROBOCHESS_FRAMES`
//! 4. command-line flags ([`Cli`])
//!
//! # File format
//!
//! ```json
//! {
//!   "control": { "host": "127.0.0.1", "port": 8080, "ai_id": "chess_vision_ai" },
//!   "engine":  { "path": "/usr/games/stockfish", "default_difficulty": "medium", "grace_ms": 2000 },
//!   "vision":  { "frames": "-" },
//!   "session": { "robot_color": "black", "orientation": "white_bottom",
//!                "corner_timeout_secs": 30, "verify_timeout_secs": 10 }
//! }
//! ```
//!
//! Every field is optional.

use crate::error::ConfigError;
use board_reconciler::{Color, Orientation};
use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stockfish_oracle::Difficulty;
use tracing::{info, warn};

/// Settings filename
const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "robochess")]
#[command(about = "Vision-driven chess robot game service")]
pub struct Cli {
    /// Settings file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Control server host
    #[arg(long)]
    pub host: Option<String>,

    /// Control server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Path of the UCI engine binary
    #[arg(long)]
    pub engine: Option<PathBuf>,

    /// Frame stream from the board mapper ('-' for stdin)
    #[arg(long)]
    pub frames: Option<String>,

    /// Side played by the robot
    #[arg(long)]
    pub robot_color: Option<Color>,

    /// Log filter, e.g. `debug` or `robochess=debug,stockfish_oracle=info`
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub control: ControlSettings,
    pub engine: EngineSettings,
    pub vision: VisionSettings,
    pub session: SessionSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ControlSettings {
    pub host: String,
    pub port: u16,
    /// Sent in the `ai_identify` handshake
    pub ai_id: String,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ai_id: "chess_vision_ai".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub path: PathBuf,
    /// Used when a start request names no (or an unknown) difficulty
    pub default_difficulty: Difficulty,
    /// Allowance beyond the search budget before a search counts as hung
    pub grace_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/usr/games/stockfish"),
            default_difficulty: Difficulty::Medium,
            grace_ms: 2000,
        }
    }
}

impl EngineSettings {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VisionSettings {
    /// Newline-delimited JSON frames; `-` reads stdin
    pub frames: String,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            frames: "-".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Side played by the robot; `null` leaves both sides to humans
    pub robot_color: Option<Color>,
    pub orientation: Orientation,
    pub corner_timeout_secs: u64,
    pub verify_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            robot_color: Some(Color::Black),
            orientation: Orientation::WhiteBottom,
            corner_timeout_secs: 30,
            verify_timeout_secs: 10,
        }
    }
}

impl SessionSettings {
    pub fn corner_timeout(&self) -> Duration {
        Duration::from_secs(self.corner_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

/// `settings.json` in the platform config directory, if one can be resolved
pub fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "trilltino", "robochess")
        .map(|dirs| dirs.config_dir().join(SETTINGS_FILENAME))
}

impl Settings {
    /// Read and parse one settings file
    pub fn from_file(path: &Path) -> Result<Settings, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File layer: an explicit file must load; the implicit one is optional
    pub fn load(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
        if let Some(path) = explicit {
            let settings = Settings::from_file(path)?;
            info!("[SETTINGS] Loaded settings from {:?}", path);
            return Ok(settings);
        }

        let Some(path) = default_settings_path() else {
            return Ok(Settings::default());
        };
        if !path.exists() {
            info!("[SETTINGS] No settings file found at {:?}. Using defaults.", path);
            return Ok(Settings::default());
        }
        match Settings::from_file(&path) {
            Ok(settings) => {
                info!("[SETTINGS] Loaded settings from {:?}", path);
                Ok(settings)
            }
            Err(e) => {
                warn!("[SETTINGS] {e}. Using defaults.");
                Ok(Settings::default())
            }
        }
    }

    /// Apply environment overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from `lookup`
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("ROBOCHESS_HOST") {
            self.control.host = host;
        }
        if let Some(port) = lookup("ROBOCHESS_PORT") {
            self.control.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "ROBOCHESS_PORT",
                value: port,
            })?;
        }
        if let Some(path) = lookup("STOCKFISH_PATH") {
            self.engine.path = PathBuf::from(path);
        }
        if let Some(frames) = lookup("ROBOCHESS_FRAMES") {
            self.vision.frames = frames;
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.control.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.control.port = port;
        }
        if let Some(engine) = &cli.engine {
            self.engine.path = engine.clone();
        }
        if let Some(frames) = &cli.frames {
            self.vision.frames = frames.clone();
        }
        if let Some(color) = cli.robot_color {
            self.session.robot_color = Some(color);
        }
    }

    /// All layers, in order
    pub fn resolve(cli: &Cli) -> Result<Settings, ConfigError> {
        let mut settings = Settings::load(cli.config.as_deref())?;
        settings.apply_env()?;
        settings.apply_cli(cli);
        Ok(settings)
    }

    /// `host:port` of the control server
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.control.host, self.control.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.control_addr(), "127.0.0.1:8080");
        assert_eq!(settings.control.ai_id, "chess_vision_ai");
        assert_eq!(settings.engine.grace(), Duration::from_secs(2));
        assert_eq!(settings.session.robot_color, Some(Color::Black));
        assert_eq!(settings.session.corner_timeout(), Duration::from_secs(30));
        assert_eq!(settings.session.verify_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let json = r#"{"engine":{"default_difficulty":"hard"},"session":{"orientation":"black_bottom"}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.engine.default_difficulty, Difficulty::Hard);
        assert_eq!(settings.engine.grace_ms, 2000);
        assert_eq!(settings.session.orientation, Orientation::BlackBottom);
        assert_eq!(settings.control, ControlSettings::default());

        let spectator: Settings = serde_json::from_str(r#"{"session":{"robot_color":null}}"#).unwrap();
        assert_eq!(spectator.session.robot_color, None);
    }

    #[test]
    fn test_explicit_file_errors() {
        let missing = Path::new("/nonexistent/robochess/settings.json");
        assert!(matches!(
            Settings::load(Some(missing)),
            Err(ConfigError::Read { .. })
        ));

        let path = std::env::temp_dir().join(format!("robochess-bad-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_env_then_cli_overrides() {
        let env: HashMap<&str, &str> = [
            ("ROBOCHESS_HOST", "10.0.0.5"),
            ("ROBOCHESS_PORT", "9000"),
            ("STOCKFISH_PATH", "/opt/sf"),
        ]
        .into_iter()
        .collect();
        let mut settings = Settings::default();
        settings
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.control_addr(), "10.0.0.5:9000");
        assert_eq!(settings.engine.path, PathBuf::from("/opt/sf"));

        let cli = Cli::parse_from(["robochess", "--port", "7000", "--robot-color", "white"]);
        settings.apply_cli(&cli);
        assert_eq!(settings.control_addr(), "10.0.0.5:7000");
        assert_eq!(settings.session.robot_color, Some(Color::White));
        assert_eq!(settings.vision.frames, "-");
    }

    #[test]
    fn test_bad_env_port() {
        let mut settings = Settings::default();
        let result = settings.apply_env_from(|key| (key == "ROBOCHESS_PORT").then(|| "eighty".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "ROBOCHESS_PORT", .. })
        ));
    }
}

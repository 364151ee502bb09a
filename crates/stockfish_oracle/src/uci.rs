//! Minimal asynchronous UCI driver
//!
//! Speaks just enough of the Universal Chess Interface to configure an engine
//! and run bounded searches: `uci`/`uciok`, `isready`/`readyok`,
//! `setoption`, `position fen`, `go`, and reading `info ... pv` and
//! `bestmove` lines.
//!
//! The child process is killed when the [`UciEngine`] is dropped.

use crate::difficulty::SearchLimits;
use crate::error::{OracleError, OracleResult};
use log::{debug, trace};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Answer of one `go` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// `None` for `bestmove (none)`
    pub best_move: Option<String>,
    /// Principal variation of the last `info` line that carried one
    pub pv: Vec<String>,
}

pub struct UciEngine {
    // Held so the process lives (and is killed) with the driver
    _child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl UciEngine {
    /// Start the engine binary at `path`
    pub fn spawn(path: &Path) -> OracleResult<Self> {
        let spawn_error = |source| OracleError::Spawn {
            path: path.display().to_string(),
            source,
        };
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;
        let stdin = child.stdin.take().ok_or(OracleError::Closed)?;
        let stdout = child.stdout.take().ok_or(OracleError::Closed)?;
        Ok(UciEngine {
            _child: child,
            stdin,
            lines: BufReader::new(stdout).lines(),
        })
    }

    pub async fn send(&mut self, command: &str) -> OracleResult<()> {
        trace!("[ORACLE] > {command}");
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> OracleResult<String> {
        let line = self.lines.next_line().await?.ok_or(OracleError::Closed)?;
        trace!("[ORACLE] < {line}");
        Ok(line)
    }

    async fn wait_for(&mut self, token: &str) -> OracleResult<()> {
        loop {
            if self.read_line().await?.trim() == token {
                return Ok(());
            }
        }
    }

    /// `uci` → `uciok`, then `isready` → `readyok`
    pub async fn handshake(&mut self) -> OracleResult<()> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;
        self.sync().await?;
        debug!("[ORACLE] Engine ready");
        Ok(())
    }

    /// `isready` → `readyok`
    pub async fn sync(&mut self) -> OracleResult<()> {
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    pub async fn set_option(&mut self, name: &str, value: &str) -> OracleResult<()> {
        self.send(&format!("setoption name {name} value {value}")).await
    }

    /// Search `fen` within `limits` and wait for `bestmove`
    pub async fn search(&mut self, fen: &str, limits: SearchLimits) -> OracleResult<SearchOutcome> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&limits.go_command()).await?;

        let mut pv = Vec::new();
        loop {
            let line = self.read_line().await?;
            if let Some(moves) = parse_info_pv(&line) {
                pv = moves;
            } else if let Some(best_move) = parse_bestmove(&line) {
                return Ok(SearchOutcome { best_move, pv });
            }
        }
    }

    pub async fn quit(&mut self) -> OracleResult<()> {
        self.send("quit").await
    }
}

/// Parse a `bestmove` line.
///
/// Returns `None` for any other line, `Some(None)` for `bestmove (none)`.
pub fn parse_bestmove(line: &str) -> Option<Option<String>> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "bestmove" {
        return None;
    }
    Some(
        parts
            .next()
            .filter(|mv| *mv != "(none)" && *mv != "0000")
            .map(str::to_string),
    )
}

/// Parse the principal variation of an `info` line, if it has one
pub fn parse_info_pv(line: &str) -> Option<Vec<String>> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "info" {
        return None;
    }
    parts.by_ref().find(|token| *token == "pv")?;
    let moves: Vec<String> = parts.map(str::to_string).collect();
    (!moves.is_empty()).then_some(moves)
}

//! Leaderboard file persistence.
//!
//! One JSON file of `{name, best}` records, ordered by best descending.
//! Names are keyed case-insensitively and a resubmission only ever raises
//! an entry. Writes land in a temp file in the same directory and are
//! renamed over the destination, so readers never observe a partial file.

use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

/// Longest accepted player name; longer submissions are truncated.
pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub best: f64,
}

#[derive(Debug)]
pub struct Leaderboard {
    path: PathBuf,
}

impl Leaderboard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the board, best first. A missing file is an empty board;
    /// rows that do not parse as `{name, best}` are dropped.
    pub fn load(&self) -> Result<Vec<LeaderboardEntry>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading leaderboard at {}", self.path.display()));
            }
        };
        let rows: Vec<serde_json::Value> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing leaderboard at {}", self.path.display()))?;
        let mut entries: Vec<LeaderboardEntry> = rows
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .filter(|entry: &LeaderboardEntry| entry.best.is_finite())
            .collect();
        sort_best_first(&mut entries);
        Ok(entries)
    }

    /// Record `score` for `name`, returning the updated board.
    ///
    /// Empty names and non-finite scores are ignored; an existing entry
    /// (matched case-insensitively) is only raised, never lowered.
    pub fn submit(&self, name: &str, score: f64) -> Result<Vec<LeaderboardEntry>> {
        let name = name.trim();
        if name.is_empty() || !score.is_finite() {
            return self.load();
        }
        let name: String = name.chars().take(MAX_NAME_LEN).collect();
        let key = name.to_lowercase();

        let mut entries = self.load()?;
        match entries
            .iter_mut()
            .find(|entry| entry.name.to_lowercase() == key)
        {
            Some(entry) => {
                if score > entry.best {
                    entry.best = score;
                }
            }
            None => entries.push(LeaderboardEntry { name, best: score }),
        }
        sort_best_first(&mut entries);
        self.write(&entries)?;
        Ok(entries)
    }

    fn write(&self, entries: &[LeaderboardEntry]) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating leaderboard directory {}", dir.display()))?;
        }
        let mut tmp = NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))
            .context("creating leaderboard temp file")?;
        serde_json::to_writer_pretty(&mut tmp, entries).context("encoding leaderboard")?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing leaderboard at {}", self.path.display()))?;
        debug!(path = %self.path.display(), entries = entries.len(), "leaderboard written");
        Ok(())
    }
}

fn sort_best_first(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| b.best.partial_cmp(&a.best).unwrap_or(Ordering::Equal));
}

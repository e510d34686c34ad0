// Cleaning of raw CSV rows into validated, ingestion-ordered match records.
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use crate::error::{Result, TennisError};
use crate::io::RawMatchRow;

/// Court surface. Hard is the baseline of the one-hot encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Surface {
    Hard,
    Clay,
    Grass,
}

impl Surface {
    pub const ALL: [Surface; 3] = [Surface::Hard, Surface::Clay, Surface::Grass];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Hard => "Hard",
            Surface::Clay => "Clay",
            Surface::Grass => "Grass",
        }
    }
}

impl FromStr for Surface {
    type Err = TennisError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(Surface::Hard),
            "clay" => Ok(Surface::Clay),
            "grass" => Ok(Surface::Grass),
            _ => Err(TennisError::UnknownSurface(s.to_string())),
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event category, ordered by prestige.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TournamentTier {
    GrandSlam,
    Masters1000,
    Atp500,
    Atp250,
    /// Any series label outside the ordinal map; kept for display.
    Other(String),
}

impl TournamentTier {
    /// Parse a series label. Never fails: unrecognised labels become `Other`.
    pub fn parse(label: &str) -> Self {
        let compact: String = label
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match compact.as_str() {
            "grandslam" => TournamentTier::GrandSlam,
            "masters1000" => TournamentTier::Masters1000,
            "atp500" => TournamentTier::Atp500,
            "atp250" => TournamentTier::Atp250,
            _ => TournamentTier::Other(label.trim().to_string()),
        }
    }

    /// Ordinal importance 4/3/2/1; unknown tiers count as 1.
    pub fn importance(&self) -> u8 {
        match self {
            TournamentTier::GrandSlam => 4,
            TournamentTier::Masters1000 => 3,
            TournamentTier::Atp500 => 2,
            TournamentTier::Atp250 => 1,
            TournamentTier::Other(label) => {
                debug!(tier = %label, "tier outside importance map, defaulting to 1");
                1
            }
        }
    }
}

impl fmt::Display for TournamentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TournamentTier::GrandSlam => f.write_str("Grand Slam"),
            TournamentTier::Masters1000 => f.write_str("Masters 1000"),
            TournamentTier::Atp500 => f.write_str("ATP 500"),
            TournamentTier::Atp250 => f.write_str("ATP 250"),
            TournamentTier::Other(label) => f.write_str(label),
        }
    }
}

/// A finished match. `seq` is the ingestion position and breaks date ties.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub seq: usize,
    pub date: NaiveDate,
    pub player1: String,
    pub player2: String,
    pub surface: Surface,
    pub tier: TournamentTier,
    /// 0 when unknown.
    pub rank1: u32,
    pub rank2: u32,
    pub winner: String,
}

impl MatchRecord {
    /// Reject records whose winner is not one of the two participants.
    pub fn validate(&self) -> Result<()> {
        if self.winner == self.player1 || self.winner == self.player2 {
            Ok(())
        } else {
            Err(TennisError::InvalidMatchRecord {
                index: self.seq,
                player1: self.player1.clone(),
                player2: self.player2.clone(),
                winner: self.winner.clone(),
            })
        }
    }

    pub fn player1_won(&self) -> bool {
        self.winner == self.player1
    }

    pub fn involves(&self, player: &str) -> bool {
        self.player1 == player || self.player2 == player
    }
}

fn clean_rank(rank: Option<i64>) -> u32 {
    match rank {
        Some(r) if r > 0 => u32::try_from(r).unwrap_or(0),
        _ => 0,
    }
}

/// Turn raw rows into match records, dropping rows without a date or winner,
/// rows before `min_year`, and rows on surfaces outside Hard/Clay/Grass.
pub fn clean(rows: Vec<RawMatchRow>, min_year: i32) -> Vec<MatchRecord> {
    let total = rows.len();
    let mut skipped_surface = 0usize;
    let mut cleaned = Vec::with_capacity(total);

    for row in rows {
        let Some(date) = row.date else { continue };
        if date.year() < min_year {
            continue;
        }
        let winner = match row.winner.as_deref().map(str::trim) {
            Some(w) if !w.is_empty() => w.to_string(),
            _ => continue,
        };
        let surface = match row.surface.parse::<Surface>() {
            Ok(s) => s,
            Err(_) => {
                skipped_surface += 1;
                continue;
            }
        };

        cleaned.push(MatchRecord {
            seq: cleaned.len(),
            date,
            player1: row.player1.trim().to_string(),
            player2: row.player2.trim().to_string(),
            surface,
            tier: TournamentTier::parse(row.series.as_deref().unwrap_or("")),
            rank1: clean_rank(row.rank1),
            rank2: clean_rank(row.rank2),
            winner,
        });
    }

    if skipped_surface > 0 {
        warn!(skipped_surface, "dropped matches on unsupported surfaces");
    }
    info!(kept = cleaned.len(), total, min_year, "cleaned match rows");
    cleaned
}

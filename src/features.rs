//! Feature pipeline.
//!
//! Replays the match history once in chronological order, computing each
//! match's features from the aggregators before recording its result. The
//! state left at the end of the pass answers snapshot queries for matchups
//! that have not been played yet.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::aggregate::{HeadToHeadAggregator, PlayerSurfaceAggregator, RecentFormAggregator};
use crate::error::{Result, TennisError};
use crate::preprocess::{MatchRecord, Surface, TournamentTier};

/// Column names, in `FeatureVector::to_array` order.
pub const FEATURE_NAMES: [&str; FeatureVector::DIM] = [
    "rank_diff",
    "recent_form_diff",
    "surface_clay",
    "surface_grass",
    "h2h_ratio",
    "surface_advantage",
    "tournament_importance",
];

/// Model inputs for one matchup, from player 1's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVector {
    pub rank_diff: f64,
    pub recent_form_diff: f64,
    pub surface_clay: f64,
    pub surface_grass: f64,
    pub h2h_ratio: f64,
    pub surface_advantage: f64,
    pub tournament_importance: f64,
}

impl FeatureVector {
    pub const DIM: usize = 7;

    pub fn to_array(&self) -> [f64; Self::DIM] {
        [
            self.rank_diff,
            self.recent_form_diff,
            self.surface_clay,
            self.surface_grass,
            self.h2h_ratio,
            self.surface_advantage,
            self.tournament_importance,
        ]
    }
}

/// Features of a historical match together with its outcome label.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub seq: usize,
    pub date: NaiveDate,
    pub player1: String,
    pub player2: String,
    pub features: FeatureVector,
    /// 1 if player 1 won.
    pub target: u8,
}

/// Current-form summary of one player, as of the end of the history.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProfile {
    /// Rank at the player's most recent match, 0 if unknown.
    pub rank: u32,
    pub recent_form: f64,
    pub surface_win_rate: f64,
    pub surface_played: u32,
    pub matches_played: u32,
}

/// Aggregator state owned by one pipeline run.
#[derive(Debug, Clone)]
pub struct HistoryState {
    surface: PlayerSurfaceAggregator,
    h2h: HeadToHeadAggregator,
    form: RecentFormAggregator,
    last_rank: HashMap<String, u32>,
}

impl HistoryState {
    pub fn new(form_window: usize) -> Self {
        Self {
            surface: PlayerSurfaceAggregator::new(),
            h2h: HeadToHeadAggregator::new(),
            form: RecentFormAggregator::new(form_window),
            last_rank: HashMap::new(),
        }
    }

    /// The single place features are computed, for both historical rows and
    /// snapshot queries.
    fn features(
        &self,
        p1: &str,
        p2: &str,
        rank1: u32,
        rank2: u32,
        surface: Surface,
        tier: &TournamentTier,
    ) -> FeatureVector {
        FeatureVector {
            rank_diff: f64::from(rank1) - f64::from(rank2),
            recent_form_diff: self.form.recent_form_rate(p1) - self.form.recent_form_rate(p2),
            surface_clay: if surface == Surface::Clay { 1.0 } else { 0.0 },
            surface_grass: if surface == Surface::Grass { 1.0 } else { 0.0 },
            h2h_ratio: self.h2h.h2h_ratio(p1, p2),
            surface_advantage: self.surface.surface_advantage(p1, p2, surface),
            tournament_importance: f64::from(tier.importance()),
        }
    }

    fn record(&mut self, m: &MatchRecord) {
        self.surface.record(m);
        self.h2h.record(m);
        self.form.record(m);
        self.last_rank.insert(m.player1.clone(), m.rank1);
        self.last_rank.insert(m.player2.clone(), m.rank2);
    }

    pub fn knows(&self, player: &str) -> bool {
        self.last_rank.contains_key(player)
    }

    /// Features for a hypothetical future match between two players.
    /// Ranks come from each player's most recent match; unseen players get
    /// rank 0 and the neutral defaults.
    pub fn snapshot(
        &self,
        p1: &str,
        p2: &str,
        surface: Surface,
        tier: &TournamentTier,
    ) -> Result<FeatureVector> {
        if p1 == p2 {
            return Err(TennisError::SamePlayer(p1.to_string()));
        }
        for player in [p1, p2] {
            if !self.knows(player) {
                debug!(player, "snapshot for player without history");
            }
        }
        let rank1 = self.last_rank.get(p1).copied().unwrap_or(0);
        let rank2 = self.last_rank.get(p2).copied().unwrap_or(0);
        Ok(self.features(p1, p2, rank1, rank2, surface, tier))
    }

    pub fn player_profile(&self, player: &str, surface: Surface) -> Result<PlayerProfile> {
        let rank = *self
            .last_rank
            .get(player)
            .ok_or_else(|| TennisError::UnknownPlayer(player.to_string()))?;
        let on_surface = self.surface.tally(player, surface);
        let matches_played = Surface::ALL
            .iter()
            .map(|&s| self.surface.tally(player, s).played)
            .sum();
        Ok(PlayerProfile {
            rank,
            recent_form: self.form.recent_form_rate(player),
            surface_win_rate: self.surface.win_rate(player, surface),
            surface_played: on_surface.played,
            matches_played,
        })
    }

    /// Win rate per surface for display. A surface the player never played
    /// on shows as 0.0, unlike the 0.5 prior used for features.
    pub fn surface_rates(&self, player: &str) -> [(Surface, f64); 3] {
        Surface::ALL.map(|surface| {
            let rate = self.surface.tally(player, surface).rate().unwrap_or(0.0);
            (surface, rate)
        })
    }

    /// Wins of `p1` over `p2` and of `p2` over `p1` across the whole history.
    pub fn head_to_head(&self, p1: &str, p2: &str) -> (u32, u32) {
        self.h2h.record_between(p1, p2)
    }

    pub fn players(&self) -> Vec<&str> {
        let mut players: Vec<&str> = self.last_rank.keys().map(String::as_str).collect();
        players.sort_unstable();
        players
    }
}

/// Output of a completed run.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// One row per input match, in chronological order.
    pub rows: Vec<FeatureRow>,
    pub history: HistoryState,
}

#[derive(Debug, Clone, Copy)]
pub struct FeaturePipeline {
    form_window: usize,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new(5)
    }
}

impl FeaturePipeline {
    pub fn new(form_window: usize) -> Self {
        Self {
            form_window: form_window.max(1),
        }
    }

    /// Validate, sort by `(date, seq)` and replay all matches.
    /// Fails on the first record whose winner is not a participant, before
    /// any features are produced.
    pub fn run(&self, records: &[MatchRecord]) -> Result<FeatureTable> {
        for record in records {
            record.validate()?;
        }

        let mut ordered: Vec<(usize, &MatchRecord)> = records.iter().enumerate().collect();
        ordered.sort_by_key(|(pos, m)| (m.date, m.seq, *pos));

        let mut history = HistoryState::new(self.form_window);
        let mut rows = Vec::with_capacity(records.len());
        for (_, m) in ordered {
            let features = history.features(
                &m.player1, &m.player2, m.rank1, m.rank2, m.surface, &m.tier,
            );
            history.record(m);
            rows.push(FeatureRow {
                seq: m.seq,
                date: m.date,
                player1: m.player1.clone(),
                player2: m.player2.clone(),
                features,
                target: u8::from(m.player1_won()),
            });
        }

        info!(
            rows = rows.len(),
            players = history.last_rank.len(),
            form_window = self.form_window,
            "feature pass complete"
        );
        Ok(FeatureTable { rows, history })
    }
}

//! Incremental per-player statistics.
//!
//! Each aggregator answers queries from the matches recorded so far and is
//! advanced one match at a time with `record`. Callers read first and record
//! afterwards, so a query for a match never sees that match's own result.
//! Reads never insert keys.

use std::collections::{HashMap, VecDeque};

use crate::preprocess::{MatchRecord, Surface};

/// Neutral prior for win rates and head-to-head ratios without history.
pub const NEUTRAL_RATE: f64 = 0.5;
/// Recent form of a player with no prior matches.
pub const NO_FORM_RATE: f64 = 0.0;

/// Running win count over a number of matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WinTally {
    pub wins: u32,
    pub played: u32,
}

impl WinTally {
    fn add(&mut self, won: bool) {
        self.played += 1;
        if won {
            self.wins += 1;
        }
    }

    /// `wins / played`, or `None` before the first match.
    pub fn rate(&self) -> Option<f64> {
        if self.played == 0 {
            None
        } else {
            Some(f64::from(self.wins) / f64::from(self.played))
        }
    }
}

fn surface_slot(surface: Surface) -> usize {
    match surface {
        Surface::Hard => 0,
        Surface::Clay => 1,
        Surface::Grass => 2,
    }
}

/// Wins and matches played per (player, surface).
#[derive(Debug, Clone, Default)]
pub struct PlayerSurfaceAggregator {
    tallies: HashMap<String, [WinTally; 3]>,
}

impl PlayerSurfaceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tally(&self, player: &str, surface: Surface) -> WinTally {
        self.tallies
            .get(player)
            .map(|t| t[surface_slot(surface)])
            .unwrap_or_default()
    }

    /// Win rate on `surface`, 0.5 without prior matches there.
    pub fn win_rate(&self, player: &str, surface: Surface) -> f64 {
        self.tally(player, surface).rate().unwrap_or(NEUTRAL_RATE)
    }

    pub fn surface_advantage(&self, p1: &str, p2: &str, surface: Surface) -> f64 {
        self.win_rate(p1, surface) - self.win_rate(p2, surface)
    }

    pub fn record(&mut self, m: &MatchRecord) {
        let slot = surface_slot(m.surface);
        for player in [&m.player1, &m.player2] {
            self.tallies.entry(player.clone()).or_default()[slot].add(m.winner == *player);
        }
    }
}

/// Meetings per unordered pair, counted from the side of the
/// lexicographically smaller player.
#[derive(Debug, Clone, Default)]
pub struct HeadToHeadAggregator {
    meetings: HashMap<String, HashMap<String, WinTally>>,
}

impl HeadToHeadAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn canonical<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn pair(&self, a: &str, b: &str) -> WinTally {
        let (low, high) = Self::canonical(a, b);
        self.meetings
            .get(low)
            .and_then(|m| m.get(high))
            .copied()
            .unwrap_or_default()
    }

    /// Prior wins of `a` over `b` and of `b` over `a`.
    pub fn record_between(&self, a: &str, b: &str) -> (u32, u32) {
        let tally = self.pair(a, b);
        let low_wins = tally.wins;
        let high_wins = tally.played - tally.wins;
        if a <= b {
            (low_wins, high_wins)
        } else {
            (high_wins, low_wins)
        }
    }

    /// Fraction of prior meetings won by `a`, 0.5 if they never met.
    pub fn h2h_ratio(&self, a: &str, b: &str) -> f64 {
        let (a_wins, b_wins) = self.record_between(a, b);
        let played = a_wins + b_wins;
        if played == 0 {
            NEUTRAL_RATE
        } else {
            f64::from(a_wins) / f64::from(played)
        }
    }

    pub fn record(&mut self, m: &MatchRecord) {
        let (low, high) = Self::canonical(&m.player1, &m.player2);
        let low_won = m.winner == low;
        self.meetings
            .entry(low.to_string())
            .or_default()
            .entry(high.to_string())
            .or_default()
            .add(low_won);
    }
}

/// Last `window` outcomes per player, oldest first.
#[derive(Debug, Clone)]
pub struct RecentFormAggregator {
    window: usize,
    outcomes: HashMap<String, VecDeque<bool>>,
}

impl RecentFormAggregator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            outcomes: HashMap::new(),
        }
    }

    /// Mean of the retained outcomes; divides by the number actually
    /// available, not the window size. 0.0 without prior matches.
    pub fn recent_form_rate(&self, player: &str) -> f64 {
        match self.outcomes.get(player) {
            Some(recent) if !recent.is_empty() => {
                let wins = recent.iter().filter(|&&won| won).count();
                wins as f64 / recent.len() as f64
            }
            _ => NO_FORM_RATE,
        }
    }

    pub fn record(&mut self, m: &MatchRecord) {
        for player in [&m.player1, &m.player2] {
            let recent = self.outcomes.entry(player.clone()).or_default();
            recent.push_back(m.winner == *player);
            while recent.len() > self.window {
                recent.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::TournamentTier;
    use chrono::NaiveDate;

    fn make_match(day: u32, p1: &str, p2: &str, winner: &str, surface: Surface) -> MatchRecord {
        MatchRecord {
            seq: day as usize,
            date: NaiveDate::from_ymd_opt(2022, 1, day).unwrap(),
            player1: p1.into(),
            player2: p2.into(),
            surface,
            tier: TournamentTier::Atp250,
            rank1: 0,
            rank2: 0,
            winner: winner.into(),
        }
    }

    #[test]
    fn unseen_keys_use_defaults() {
        let surface = PlayerSurfaceAggregator::new();
        let h2h = HeadToHeadAggregator::new();
        let form = RecentFormAggregator::new(5);
        assert_eq!(surface.win_rate("Nobody", Surface::Grass), 0.5);
        assert_eq!(h2h.h2h_ratio("A", "B"), 0.5);
        assert_eq!(h2h.h2h_ratio("B", "A"), 0.5);
        assert_eq!(form.recent_form_rate("Nobody"), 0.0);
    }

    #[test]
    fn surface_rate_after_clay_loss() {
        let mut agg = PlayerSurfaceAggregator::new();
        assert_eq!(agg.win_rate("P1", Surface::Clay), 0.5);
        agg.record(&make_match(1, "P1", "P2", "P2", Surface::Clay));
        assert_eq!(agg.win_rate("P1", Surface::Clay), 0.0);
        assert_eq!(agg.win_rate("P2", Surface::Clay), 1.0);
        // other surfaces untouched
        assert_eq!(agg.win_rate("P1", Surface::Hard), 0.5);
        assert_eq!(agg.surface_advantage("P1", "P2", Surface::Clay), -1.0);
    }

    #[test]
    fn h2h_split_meetings() {
        let mut agg = HeadToHeadAggregator::new();
        agg.record(&make_match(1, "P1", "P2", "P1", Surface::Hard));
        agg.record(&make_match(10, "P2", "P1", "P2", Surface::Hard));
        assert_eq!(agg.h2h_ratio("P1", "P2"), 0.5);
        assert_eq!(agg.record_between("P1", "P2"), (1, 1));
    }

    #[test]
    fn h2h_is_complementary_once_played() {
        let mut agg = HeadToHeadAggregator::new();
        agg.record(&make_match(1, "Zverev A.", "Alcaraz C.", "Zverev A.", Surface::Hard));
        agg.record(&make_match(2, "Alcaraz C.", "Zverev A.", "Zverev A.", Surface::Clay));
        agg.record(&make_match(3, "Alcaraz C.", "Zverev A.", "Alcaraz C.", Surface::Grass));
        let ab = agg.h2h_ratio("Alcaraz C.", "Zverev A.");
        let ba = agg.h2h_ratio("Zverev A.", "Alcaraz C.");
        assert!((ab - 1.0 / 3.0).abs() < 1e-12);
        assert!((ab + ba - 1.0).abs() < 1e-12);
        assert_eq!(agg.record_between("Zverev A.", "Alcaraz C."), (2, 1));
    }

    #[test]
    fn recent_form_divides_by_available_matches() {
        let mut agg = RecentFormAggregator::new(5);
        agg.record(&make_match(1, "P1", "X", "P1", Surface::Hard));
        agg.record(&make_match(2, "P1", "Y", "Y", Surface::Hard));
        agg.record(&make_match(3, "Z", "P1", "P1", Surface::Hard));
        assert!((agg.recent_form_rate("P1") - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn recent_form_keeps_only_last_window() {
        let mut agg = RecentFormAggregator::new(2);
        agg.record(&make_match(1, "P1", "X", "X", Surface::Hard));
        agg.record(&make_match(2, "P1", "X", "X", Surface::Hard));
        agg.record(&make_match(3, "P1", "X", "P1", Surface::Hard));
        agg.record(&make_match(4, "P1", "X", "P1", Surface::Hard));
        assert_eq!(agg.recent_form_rate("P1"), 1.0);
        assert_eq!(agg.recent_form_rate("X"), 0.0);
    }
}

// Module for loading the ATP match CSV and exporting the enriched feature table.
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::features::FeatureRow;

mod date_format {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer};
    const FMT: &str = "%Y-%m-%d";

    /// Unparseable or empty dates become `None` and are dropped during cleaning.
    pub fn deserialize<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        let s = s.trim();
        let day = s.get(..10).unwrap_or(s);
        Ok(NaiveDate::parse_from_str(day, FMT).ok())
    }
}

/// One row of the raw ATP file; columns not listed here are ignored.
#[derive(Debug, Deserialize)]
pub struct RawMatchRow {
    #[serde(rename = "Date", default, deserialize_with = "date_format::deserialize")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Series", default)]
    pub series: Option<String>,
    #[serde(rename = "Surface", default)]
    pub surface: String,
    #[serde(rename = "Player_1")]
    pub player1: String,
    #[serde(rename = "Player_2")]
    pub player2: String,
    #[serde(rename = "Winner", default)]
    pub winner: Option<String>,
    #[serde(rename = "Rank_1", default, deserialize_with = "csv::invalid_option")]
    pub rank1: Option<i64>,
    #[serde(rename = "Rank_2", default, deserialize_with = "csv::invalid_option")]
    pub rank2: Option<i64>,
}

pub fn load_csv(path: &Path) -> Result<Vec<RawMatchRow>> {
    let file = File::open(path)?;
    let rows = read_matches(file)?;
    info!(path = %path.display(), rows = rows.len(), "loaded match file");
    Ok(rows)
}

pub fn read_matches<R: Read>(reader: R) -> Result<Vec<RawMatchRow>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let expected_len = headers.len();

    let mut out = Vec::new();
    for result in rdr.records() {
        let raw: StringRecord = result?;
        let line = raw.position().map(|p| p.line()).unwrap_or(0);

        if raw.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        if raw.len() != expected_len {
            warn!(line, expected = expected_len, found = raw.len(), "skipping row with wrong field count");
            continue;
        }

        match raw.deserialize::<RawMatchRow>(Some(&headers)) {
            Ok(rec) => out.push(rec),
            Err(e) => warn!(line, error = %e, "skipping malformed row"),
        }
    }

    Ok(out)
}

#[derive(Debug, Serialize)]
struct FeatureCsvRow<'a> {
    date: NaiveDate,
    player1: &'a str,
    player2: &'a str,
    rank_diff: f64,
    recent_form_diff: f64,
    surface_clay: f64,
    surface_grass: f64,
    h2h_ratio: f64,
    surface_advantage: f64,
    tournament_importance: f64,
    target: u8,
}

/// Write the feature table as CSV, one row per match in pipeline order.
pub fn write_features<W: Write>(writer: W, rows: &[FeatureRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        let f = &row.features;
        wtr.serialize(FeatureCsvRow {
            date: row.date,
            player1: &row.player1,
            player2: &row.player2,
            rank_diff: f.rank_diff,
            recent_form_diff: f.recent_form_diff,
            surface_clay: f.surface_clay,
            surface_grass: f.surface_grass,
            h2h_ratio: f.h2h_ratio,
            surface_advantage: f.surface_advantage,
            tournament_importance: f.tournament_importance,
            target: row.target,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

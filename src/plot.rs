// Charts for predictions, player comparisons and the trained model.
use std::path::Path;

use chrono::NaiveDate;
use plotters::prelude::*;

use crate::error::{Result, TennisError};
use crate::features::HistoryState;
use crate::preprocess::{MatchRecord, Surface};

const PLAYER1_COLOR: RGBColor = RGBColor(135, 206, 235);
const PLAYER2_COLOR: RGBColor = RGBColor(144, 238, 144);

fn plot_err<E: std::fmt::Display>(e: E) -> TennisError {
    TennisError::Plot(e.to_string())
}

/// Up to `n` most recent `(date, won)` results for `player`, oldest first.
pub fn recent_results(records: &[MatchRecord], player: &str, n: usize) -> Vec<(NaiveDate, bool)> {
    let mut played: Vec<&MatchRecord> = records.iter().filter(|m| m.involves(player)).collect();
    played.sort_by_key(|m| (m.date, m.seq));
    let skip = played.len().saturating_sub(n);
    played
        .into_iter()
        .skip(skip)
        .map(|m| (m.date, m.winner == player))
        .collect()
}

/// Two bars with each player's win probability, annotated in percent.
pub fn plot_win_probability(path: &Path, player1: &str, player2: &str, proba: (f64, f64)) -> Result<()> {
    let (p2_win, p1_win) = proba;
    let names = [player1.to_string(), player2.to_string()];

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Win Probability", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0usize..2usize).into_segmented(), 0f64..1f64)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|v| match v {
            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
                names.get(*i).cloned().unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        })
        .y_desc("Probability")
        .draw()
        .map_err(plot_err)?;

    for (i, (p, color)) in [(p1_win, PLAYER1_COLOR), (p2_win, PLAYER2_COLOR)].into_iter().enumerate() {
        chart
            .draw_series(
                Histogram::vertical(&chart)
                    .style(color.filled())
                    .margin(60)
                    .data(std::iter::once((i, p))),
            )
            .map_err(plot_err)?;
        chart
            .draw_series(std::iter::once(Text::new(
                format!("{:.1}%", p * 100.0),
                (SegmentValue::CenterOf(i), (p + 0.03).min(0.97)),
                ("sans-serif", 18).into_font(),
            )))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Surface win rates side by side (left) and the last ten results of each
/// player (right).
pub fn plot_player_stats(
    path: &Path,
    history: &HistoryState,
    records: &[MatchRecord],
    player1: &str,
    player2: &str,
) -> Result<()> {
    let root = BitMapBackend::new(path, (1500, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let (left, right) = root.split_horizontally(750);

    let rates = [history.surface_rates(player1), history.surface_rates(player2)];
    let mut surfaces = ChartBuilder::on(&left)
        .caption("Surface Performance", ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..3f64, 0f64..1f64)
        .map_err(plot_err)?;
    surfaces
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(7)
        .x_label_formatter(&|x| {
            let slot = x.floor();
            if (x - slot - 0.5).abs() < 1e-6 && (0.0..3.0).contains(&slot) {
                Surface::ALL[slot as usize].to_string()
            } else {
                String::new()
            }
        })
        .y_desc("Win Rate")
        .draw()
        .map_err(plot_err)?;

    for (offset, (player, color)) in [(player1, PLAYER1_COLOR), (player2, PLAYER2_COLOR)].into_iter().enumerate() {
        let per_surface = rates[offset];
        surfaces
            .draw_series(per_surface.iter().enumerate().map(|(i, &(_, rate))| {
                let x0 = i as f64 + 0.15 + 0.35 * offset as f64;
                Rectangle::new([(x0, 0.0), (x0 + 0.35, rate)], color.filled())
            }))
            .map_err(plot_err)?
            .label(player)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }
    surfaces
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    let form = [recent_results(records, player1, 10), recent_results(records, player2, 10)];
    let longest = form.iter().map(Vec::len).max().unwrap_or(0).max(1) as i32;
    let mut recent = ChartBuilder::on(&right)
        .caption("Recent Form", ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(1i32..longest + 1, -0.1f64..1.1f64)
        .map_err(plot_err)?;
    recent
        .configure_mesh()
        .x_desc("Match (oldest to latest)")
        .y_desc("Win/Loss")
        .draw()
        .map_err(plot_err)?;

    for (results, (player, color)) in form.iter().zip([(player1, BLUE), (player2, GREEN)]) {
        let points: Vec<(i32, f64)> = results
            .iter()
            .enumerate()
            .map(|(i, &(_, won))| (i as i32 + 1, if won { 1.0 } else { 0.0 }))
            .collect();
        recent
            .draw_series(LineSeries::new(points, color.stroke_width(2)).point_size(4))
            .map_err(plot_err)?
            .label(player)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    recent
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Draws a horizontal bar chart of feature importances.
pub fn plot_importances(path: &Path, results: &[(String, f64)]) -> Result<()> {
    let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    let values: Vec<f64> = results.iter().map(|(_, v)| *v).collect();
    let count = results.len();

    let max_x = values.iter().cloned().fold(0.0_f64, f64::max);
    let x_range = 0.0..(max_x * 1.1).max(1e-6);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Importances", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(200)
        .build_cartesian_2d(x_range, 0..count)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .y_labels(count)
        .y_label_formatter(&|idx| names.get(*idx).map(|n| n.to_string()).unwrap_or_default())
        .x_desc("|Coefficient|")
        .y_desc("Feature")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, &v)| {
            Rectangle::new([(0.0, i), (v, i + 1)], BLUE.mix(0.5).filled())
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Fill opacity of a confusion cell, scaled to the largest count.
fn cell_shade(count: usize, max: usize) -> f64 {
    if max == 0 {
        0.0
    } else {
        0.15 + 0.85 * count as f64 / max as f64
    }
}

/// 2x2 confusion heatmap, actual label on the y axis and predicted on x.
pub fn plot_confusion(path: &Path, confusion: &[[usize; 2]; 2]) -> Result<()> {
    let max = confusion.iter().flatten().copied().max().unwrap_or(0);

    let root = BitMapBackend::new(path, (600, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Confusion Matrix", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..2f64, 0f64..2f64)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .y_labels(5)
        .x_label_formatter(&|v| cell_label(*v))
        .y_label_formatter(&|v| cell_label(*v))
        .x_desc("Predicted")
        .y_desc("Actual")
        .draw()
        .map_err(plot_err)?;

    let cells = (0..2).flat_map(|actual| (0..2).map(move |predicted| (actual, predicted)));
    for (actual, predicted) in cells {
        let count = confusion[actual][predicted];
        let (x, y) = (predicted as f64, actual as f64);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x, y), (x + 1.0, y + 1.0)],
                BLUE.mix(cell_shade(count, max)).filled(),
            )))
            .map_err(plot_err)?;
        chart
            .draw_series(std::iter::once(Text::new(
                count.to_string(),
                (x + 0.45, y + 0.55),
                ("sans-serif", 28).into_font(),
            )))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Class name at a cell centre, blank elsewhere.
fn cell_label(v: f64) -> String {
    if (v - 0.5).abs() < 1e-6 {
        "Player 2 wins".to_string()
    } else if (v - 1.5).abs() < 1e-6 {
        "Player 1 wins".to_string()
    } else {
        String::new()
    }
}

/// Load ATP match history, build causal features, train the classifier and
/// answer prediction requests from the command line.
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod aggregate;
mod config;
mod error;
mod features;
mod io;
mod model;
mod plot;
mod preprocess;

use config::Config;
use features::{FeaturePipeline, FeatureTable, FEATURE_NAMES};
use preprocess::{MatchRecord, Surface, TournamentTier};

#[derive(Parser)]
#[command(name = "tennis")]
#[command(about = "Predict ATP match winners from historical results", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "tennis.toml")]
    config: PathBuf,

    /// Match CSV, overrides the config file
    #[arg(long)]
    data: Option<PathBuf>,

    /// Keep matches from this year on, overrides the config file
    #[arg(long)]
    min_year: Option<i32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every player in the loaded history
    Players,
    /// Predict the winner of a match between two players
    Predict {
        player1: String,
        player2: String,
        /// Hard, Clay or Grass
        #[arg(long, default_value = "Hard")]
        surface: String,
        /// Grand Slam, Masters 1000, ATP 500 or ATP 250
        #[arg(long, default_value = "Grand Slam")]
        tier: String,
    },
    /// Show held-out accuracy, confusion matrix and feature importances
    Evaluate,
    /// Export the feature table as CSV
    Features {
        #[arg(short, long, default_value = "features.csv")]
        out: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Read, clean and replay the match history.
fn load_history(config: &Config) -> Result<(Vec<MatchRecord>, FeatureTable)> {
    let path = Path::new(&config.data.path);
    let raw = io::load_csv(path).with_context(|| format!("loading {}", path.display()))?;
    let records = preprocess::clean(raw, config.data.min_year);
    if records.is_empty() {
        return Err(error::TennisError::EmptyDataset.into());
    }
    let table = FeaturePipeline::new(config.features.form_window)
        .run(&records)
        .context("building feature table")?;
    Ok((records, table))
}

fn run_predict(config: &Config, player1: &str, player2: &str, surface: &str, tier: &str) -> Result<()> {
    let surface: Surface = surface.parse()?;
    let tier = TournamentTier::parse(tier);
    let (records, table) = load_history(config)?;
    let history = &table.history;

    let p1 = history.player_profile(player1, surface)?;
    let p2 = history.player_profile(player2, surface)?;
    let features = history.snapshot(player1, player2, surface, &tier)?;
    let clf = model::train_model(&table.rows, &config.model)?;
    let proba = clf.predict_proba(&features);
    let (h2h_wins, h2h_losses) = history.head_to_head(player1, player2);

    println!("\n{} vs {} ({}, {})", player1, player2, surface, tier);
    println!("\nFeatures:");
    for (name, value) in FEATURE_NAMES.iter().zip(features.to_array()) {
        println!("{:<24} {:>8.3}", name, value);
    }
    println!("\nWin probability:");
    println!("{:<24} {:>7.1}%", player1, proba.1 * 100.0);
    println!("{:<24} {:>7.1}%", player2, proba.0 * 100.0);

    println!("\nPlayer statistics:");
    println!("{:<18} {:>16} {:>16}", "Metric", player1, player2);
    println!("{:<18} {:>16} {:>16}", "Current Rank", p1.rank, p2.rank);
    println!("{:<18} {:>16.3} {:>16.3}", "Recent Form", p1.recent_form, p2.recent_form);
    println!("{:<18} {:>16.3} {:>16.3}", "Surface Win Rate", p1.surface_win_rate, p2.surface_win_rate);
    println!("{:<18} {:>16} {:>16}", "Surface Matches", p1.surface_played, p2.surface_played);
    println!("{:<18} {:>16} {:>16}", "Matches Played", p1.matches_played, p2.matches_played);
    println!("{:<18} {:>16} {:>16}", "H2H Wins", h2h_wins, h2h_losses);

    let out_dir = Path::new(&config.output.dir);
    let prob_path = out_dir.join("win_probability.png");
    let stats_path = out_dir.join("player_stats.png");
    plot::plot_win_probability(&prob_path, player1, player2, proba)?;
    plot::plot_player_stats(&stats_path, history, &records, player1, player2)?;
    println!("\nWrote {} and {}", prob_path.display(), stats_path.display());
    Ok(())
}

fn run_evaluate(config: &Config) -> Result<()> {
    let (_, table) = load_history(config)?;
    let clf = model::train_model(&table.rows, &config.model)?;
    let eval = clf.evaluate()?;

    println!("Model accuracy: {:.2}%", eval.accuracy * 100.0);
    println!("Train/test rows: {}/{}", eval.train_size, eval.test_size);
    println!("\nConfusion matrix (rows actual, columns predicted):");
    println!("{:>12} {:>8} {:>8}", "", "0", "1");
    for (label, row) in eval.confusion.iter().enumerate() {
        println!("{:>12} {:>8} {:>8}", label, row[0], row[1]);
    }

    let importances = clf.feature_importances();
    println!("\nFeature importances:");
    for (name, value) in &importances {
        println!("{:<30} {:>8.4}", name, value);
    }

    let out_dir = Path::new(&config.output.dir);
    let importance_path = out_dir.join("feature_importances.png");
    let confusion_path = out_dir.join("confusion_matrix.png");
    plot::plot_importances(&importance_path, &importances)?;
    plot::plot_confusion(&confusion_path, &eval.confusion)?;
    println!("\nWrote {} and {}", importance_path.display(), confusion_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(&cli.config).context("loading configuration")?;
    if let Some(data) = cli.data {
        config.data.path = data.display().to_string();
    }
    if let Some(year) = cli.min_year {
        config.data.min_year = year;
    }

    match cli.command {
        Commands::Players => {
            let (_, table) = load_history(&config)?;
            for player in table.history.players() {
                println!("{}", player);
            }
        }
        Commands::Predict {
            player1,
            player2,
            surface,
            tier,
        } => run_predict(&config, &player1, &player2, &surface, &tier)?,
        Commands::Evaluate => run_evaluate(&config)?,
        Commands::Features { out } => {
            let (_, table) = load_history(&config)?;
            let file = File::create(&out).with_context(|| format!("creating {}", out.display()))?;
            io::write_features(BufWriter::new(file), &table.rows)?;
            info!(rows = table.rows.len(), path = %out.display(), "exported feature table");
        }
    }

    Ok(())
}

/// the test functions
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Tournament,Date,Series,Court,Surface,Round,Best of,Player_1,Player_2,Winner,Rank_1,Rank_2,Pts_1,Pts_2,Odd_1,Odd_2,Score";

    fn write_history(dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join("atp_tennis.csv");
        let mut f = File::create(&path)?;
        writeln!(f, "{}", HEADER)?;
        // out of date order on purpose; the 2019 row is filtered by min_year
        writeln!(f, "Rome,2021-05-10,Masters 1000,Outdoor,Clay,1st Round,3,Nadal R.,Thiem D.,Nadal R.,3,4,0,0,1.2,4.0,6-4 6-4")?;
        writeln!(f, "Doha,2019-01-01,ATP250,Outdoor,Hard,1st Round,3,Nadal R.,Thiem D.,Thiem D.,2,8,0,0,1.2,4.0,6-4 6-4")?;
        writeln!(f, "Australian Open,2021-02-08,Grand Slam,Outdoor,Hard,1st Round,5,Thiem D.,Nadal R.,Thiem D.,4,2,0,0,2.0,1.8,6-4 6-4 6-4")?;
        writeln!(f, "Halle,2021-06-14,ATP500,Outdoor,Grass,1st Round,3,Federer R.,Nadal R.,Federer R.,7,3,0,0,1.5,2.5,7-6 6-4")?;
        writeln!(f, "Paris,2021-11-01,Masters 1000,Indoor,Hard,2nd Round,3,Thiem D.,Federer R.,,5,9,0,0,1.5,2.5,")?;
        Ok(path)
    }

    fn config_for(path: &Path) -> Config {
        let mut config = Config::default();
        config.data.path = path.display().to_string();
        config
    }

    #[test]
    fn history_loads_cleans_and_sorts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_history(dir.path())?;
        let (records, table) = load_history(&config_for(&path))?;

        assert_eq!(records.len(), 3);
        assert_eq!(table.rows.len(), 3);
        let dates: Vec<_> = table.rows.iter().map(|r| r.date).collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));

        // Rome: Nadal lost the February meeting with Thiem
        let rome = &table.rows[1];
        assert_eq!(rome.player1, "Nadal R.");
        assert_eq!(rome.features.h2h_ratio, 0.0);
        assert_eq!(rome.features.recent_form_diff, -1.0);
        assert_eq!(rome.features.surface_clay, 1.0);
        assert_eq!(rome.features.tournament_importance, 3.0);
        assert_eq!(rome.target, 1);
        Ok(())
    }

    #[test]
    fn snapshot_after_history() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_history(dir.path())?;
        let (_, table) = load_history(&config_for(&path))?;

        let features = table
            .history
            .snapshot("Thiem D.", "Nadal R.", Surface::Grass, &TournamentTier::parse("Grand Slam"))?;
        assert_eq!(features.h2h_ratio, 0.5);
        assert_eq!(features.surface_grass, 1.0);
        // Thiem ranked 4 at Rome, Nadal 3 at Halle
        assert_eq!(features.rank_diff, 1.0);
        assert_eq!(features.tournament_importance, 4.0);
        assert_eq!(table.history.players(), vec!["Federer R.", "Nadal R.", "Thiem D."]);
        Ok(())
    }

    #[test]
    fn exported_table_has_feature_columns() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_history(dir.path())?;
        let (_, table) = load_history(&config_for(&path))?;

        let mut buf = Vec::new();
        io::write_features(&mut buf, &table.rows)?;
        let text = String::from_utf8(buf)?;
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("date,player1,player2,rank_diff,recent_form_diff,surface_clay,surface_grass,h2h_ratio,surface_advantage,tournament_importance,target")
        );
        assert_eq!(lines.count(), 3);
        Ok(())
    }

    #[test]
    fn empty_history_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, format!("{}\n", HEADER))?;
        assert!(load_history(&config_for(&path)).is_err());
        Ok(())
    }
}

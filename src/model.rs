/// Train a logistic regression classifier on the feature table.
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{arr2, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::config::ModelConfig;
use crate::error::{Result, TennisError};
use crate::features::{FeatureRow, FeatureVector, FEATURE_NAMES};

/// Held-out performance of a trained classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    /// `[[true_neg, false_pos], [false_neg, true_pos]]`, rows are actual labels.
    pub confusion: [[usize; 2]; 2],
    pub train_size: usize,
    pub test_size: usize,
}

pub struct Classifier {
    model: FittedLogisticRegression<f64, usize>,
    test_x: Array2<f64>,
    test_y: Array1<usize>,
    train_size: usize,
}

/// Design matrix in `FEATURE_NAMES` column order and the 0/1 labels.
pub fn design_matrix(rows: &[FeatureRow]) -> (Array2<f64>, Array1<usize>) {
    let mut x = Array2::<f64>::zeros((rows.len(), FeatureVector::DIM));
    let mut y = Array1::<usize>::zeros(rows.len());
    for (i, row) in rows.iter().enumerate() {
        for (j, v) in row.features.to_array().into_iter().enumerate() {
            x[(i, j)] = v;
        }
        y[i] = usize::from(row.target);
    }
    (x, y)
}

pub fn train_model(rows: &[FeatureRow], cfg: &ModelConfig) -> Result<Classifier> {
    if rows.is_empty() {
        return Err(TennisError::EmptyDataset);
    }
    let (x, y) = design_matrix(rows);

    let mut idx: Vec<usize> = (0..rows.len()).collect();
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    idx.shuffle(&mut rng);
    let n_test = ((rows.len() as f64) * cfg.test_fraction).round() as usize;
    let (test_idx, train_idx) = idx.split_at(n_test.min(rows.len()));

    let train_x = x.select(Axis(0), train_idx);
    let train_y = y.select(Axis(0), train_idx);
    let wins = train_y.iter().filter(|&&t| t == 1).count();
    if wins == 0 || wins == train_y.len() {
        return Err(TennisError::Model(
            "training split needs both wins and losses for player 1".into(),
        ));
    }

    let ds = Dataset::new(train_x, train_y);
    let model = LogisticRegression::default()
        .max_iterations(cfg.max_iterations)
        .fit(&ds)
        .map_err(|e| TennisError::Model(e.to_string()))?;

    info!(
        train = train_idx.len(),
        test = test_idx.len(),
        "trained logistic regression"
    );
    Ok(Classifier {
        model,
        test_x: x.select(Axis(0), test_idx),
        test_y: y.select(Axis(0), test_idx),
        train_size: train_idx.len(),
    })
}

impl Classifier {
    /// `(P(player 2 wins), P(player 1 wins))`.
    pub fn predict_proba(&self, features: &FeatureVector) -> (f64, f64) {
        let x = arr2(&[features.to_array()]);
        // probability of the fitted positive class, which is the majority label
        let p_pos = self.model.predict_probabilities(&x)[0];
        if self.model.labels().pos.class == 1 {
            (1.0 - p_pos, p_pos)
        } else {
            (p_pos, 1.0 - p_pos)
        }
    }

    pub fn evaluate(&self) -> Result<Evaluation> {
        if self.test_y.is_empty() {
            return Err(TennisError::Model("test split is empty".into()));
        }
        let predicted = self.model.predict(&self.test_x);
        let mut confusion = [[0usize; 2]; 2];
        for (&actual, &guess) in self.test_y.iter().zip(predicted.iter()) {
            confusion[actual.min(1)][guess.min(1)] += 1;
        }
        let correct = confusion[0][0] + confusion[1][1];
        Ok(Evaluation {
            accuracy: correct as f64 / self.test_y.len() as f64,
            confusion,
            train_size: self.train_size,
            test_size: self.test_y.len(),
        })
    }

    /// Absolute coefficients per feature, largest first.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = FEATURE_NAMES
            .iter()
            .zip(self.model.params().iter())
            .map(|(&n, &c)| (n.to_string(), c.abs()))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rows(n: usize) -> Vec<FeatureRow> {
        (0..n)
            .map(|i| {
                let diff = (i % 40) as f64 - 19.5;
                FeatureRow {
                    seq: i,
                    date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                    player1: format!("A{}", i),
                    player2: format!("B{}", i),
                    features: FeatureVector {
                        rank_diff: diff,
                        h2h_ratio: 0.5,
                        tournament_importance: 1.0,
                        ..Default::default()
                    },
                    target: u8::from(diff < 0.0),
                }
            })
            .collect()
    }

    #[test]
    fn better_ranked_player_is_favoured() {
        let clf = train_model(&rows(200), &ModelConfig::default()).expect("training failed");
        let favourite = FeatureVector {
            rank_diff: -30.0,
            h2h_ratio: 0.5,
            tournament_importance: 1.0,
            ..Default::default()
        };
        let (p2, p1) = clf.predict_proba(&favourite);
        assert!(p1 > 0.5, "expected player 1 favoured, got {}", p1);
        assert!((p1 + p2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn probabilities_follow_player1_when_losses_dominate() {
        // 150 player-2 wins and 50 player-1 wins
        let data: Vec<FeatureRow> = (0..200)
            .map(|i| {
                let won = i % 4 == 0;
                let diff = if won { -((i % 30) as f64) - 5.0 } else { (i % 30) as f64 + 5.0 };
                FeatureRow {
                    seq: i,
                    date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                    player1: format!("A{}", i),
                    player2: format!("B{}", i),
                    features: FeatureVector {
                        rank_diff: diff,
                        h2h_ratio: 0.5,
                        tournament_importance: 1.0,
                        ..Default::default()
                    },
                    target: u8::from(won),
                }
            })
            .collect();
        let clf = train_model(&data, &ModelConfig::default()).unwrap();

        let favourite = FeatureVector {
            rank_diff: -30.0,
            h2h_ratio: 0.5,
            tournament_importance: 1.0,
            ..Default::default()
        };
        let (p2, p1) = clf.predict_proba(&favourite);
        assert!(p1 > 0.5, "expected player 1 favoured, got {}", p1);
        assert!((p1 + p2 - 1.0).abs() < 1e-12);

        let underdog = FeatureVector { rank_diff: 30.0, ..favourite };
        let (p2, p1) = clf.predict_proba(&underdog);
        assert!(p2 > p1);
        assert!(clf.evaluate().unwrap().accuracy > 0.9);
    }

    #[test]
    fn evaluation_on_separable_data() {
        let clf = train_model(&rows(200), &ModelConfig::default()).unwrap();
        let eval = clf.evaluate().unwrap();
        assert_eq!(eval.train_size + eval.test_size, 200);
        assert_eq!(eval.test_size, 40);
        let total: usize = eval.confusion.iter().flatten().sum();
        assert_eq!(total, 40);
        assert!(eval.accuracy > 0.9, "accuracy {}", eval.accuracy);

        let importances = clf.feature_importances();
        assert_eq!(importances.len(), FeatureVector::DIM);
        assert_eq!(importances[0].0, "rank_diff");
        assert!(importances.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn single_class_is_rejected() {
        let mut data = rows(50);
        for row in &mut data {
            row.target = 1;
        }
        assert!(matches!(
            train_model(&data, &ModelConfig::default()),
            Err(TennisError::Model(_))
        ));
        assert!(matches!(
            train_model(&[], &ModelConfig::default()),
            Err(TennisError::EmptyDataset)
        ));
    }
}

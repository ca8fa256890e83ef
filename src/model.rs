//! Baseline home-win probability model.
//!
//! A logistic regression over the canonical pre-game feature columns, fit
//! with plain gradient descent and serialized as a JSON artifact under the
//! artifact directory (`{model_version}.json`). Scoring loads the artifact,
//! projects the feature row onto the artifact's column order and returns
//! the positive-class probability.

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::features::FeatureRow;

/// Canonical feature column order for training and scoring.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "team_win_loss_home_away",
    "recent_form_last_n",
    "head_to_head",
    "rest_days_density",
    "off_def_efficiency",
    "home_court_advantage",
];

const MAX_ITERS: usize = 400;
const LEARNING_RATE: f64 = 0.1;
const L2: f64 = 1e-3;
const EPS: f64 = 1e-6;

/// Serialized form of a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub model_version: String,
    pub feature_columns: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

/// One reliability-diagram bucket over the holdout predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bin: usize,
    pub avg_pred: f64,
    pub empirical: f64,
    pub count: usize,
}

/// Holdout metrics stored alongside the artifact reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainMetrics {
    pub n_samples: usize,
    pub trained_at: DateTime<Utc>,
    pub holdout_size: usize,
    pub log_loss: f64,
    pub brier_score_loss: f64,
    pub accuracy: f64,
    pub calibration_bins: Vec<CalibrationBin>,
}

fn clamp_prob(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn logloss(p: f64, y: f64) -> f64 {
    let p = clamp_prob(p);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

fn feature_value(row: &FeatureRow, column: &str) -> Option<f64> {
    match column {
        "team_win_loss_home_away" => Some(row.team_win_loss_home_away),
        "recent_form_last_n" => Some(row.recent_form_last_n),
        "head_to_head" => Some(row.head_to_head),
        "rest_days_density" => Some(row.rest_days_density),
        "off_def_efficiency" => Some(row.off_def_efficiency),
        "home_court_advantage" => Some(row.home_court_advantage),
        _ => None,
    }
}

fn feature_vector(row: &FeatureRow) -> [f64; 6] {
    [
        row.team_win_loss_home_away,
        row.recent_form_last_n,
        row.head_to_head,
        row.rest_days_density,
        row.off_def_efficiency,
        row.home_court_advantage,
    ]
}

fn predict_with(model: &LogisticModel, row: &FeatureRow) -> Result<f64> {
    ensure!(
        model.feature_columns.len() == model.weights.len(),
        "artifact weight count does not match its feature columns"
    );
    let mut z = model.bias;
    for (column, weight) in model.feature_columns.iter().zip(&model.weights) {
        let value = feature_value(row, column)
            .with_context(|| format!("artifact references unknown feature column '{column}'"))?;
        z += weight * value;
    }
    Ok(sigmoid(z))
}

fn calibration_bins(y_true: &[f64], y_prob: &[f64], bins: usize) -> Vec<CalibrationBin> {
    let mut out = Vec::new();
    for idx in 0..bins {
        let left = idx as f64 / bins as f64;
        let right = (idx + 1) as f64 / bins as f64;
        let members: Vec<usize> = y_prob
            .iter()
            .enumerate()
            .filter(|(_, &p)| {
                if idx < bins - 1 {
                    p >= left && p < right
                } else {
                    p >= left && p <= right
                }
            })
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        let count = members.len();
        let avg_pred = members.iter().map(|&i| y_prob[i]).sum::<f64>() / count as f64;
        let empirical = members.iter().map(|&i| y_true[i]).sum::<f64>() / count as f64;
        out.push(CalibrationBin {
            bin: idx,
            avg_pred,
            empirical,
            count,
        });
    }
    out
}

/// Fit the baseline logistic model on a chronological 80/20 split, write
/// the artifact JSON under `artifact_dir` and return its path plus the
/// holdout metrics.
pub fn train_baseline_model(
    rows: &[FeatureRow],
    labels: &[u8],
    model_version: &str,
    artifact_dir: &Path,
) -> Result<(String, TrainMetrics)> {
    ensure!(rows.len() == labels.len(), "rows and labels length mismatch");
    ensure!(rows.len() >= 2, "need at least two training samples");

    let n = rows.len();
    let mut split_idx = std::cmp::max(1, (n as f64 * 0.8) as usize);
    if split_idx >= n {
        split_idx = n - 1;
    }

    let x: Vec<[f64; 6]> = rows.iter().map(feature_vector).collect();
    let y: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
    let (x_train, x_test) = x.split_at(split_idx);
    let (y_train, y_test) = y.split_at(split_idx);

    let mut weights = [0.0f64; 6];
    let mut bias = 0.0f64;
    let train_n = x_train.len() as f64;

    for i in 0..MAX_ITERS {
        let lr = LEARNING_RATE / (1.0 + 0.01 * i as f64);
        let mut grad_w = [0.0f64; 6];
        let mut grad_b = 0.0f64;
        for (features, &label) in x_train.iter().zip(y_train) {
            let mut z = bias;
            for (w, f) in weights.iter().zip(features) {
                z += w * f;
            }
            let err = sigmoid(z) - label;
            for (g, f) in grad_w.iter_mut().zip(features) {
                *g += err * f;
            }
            grad_b += err;
        }
        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= lr * (g / train_n + L2 * *w);
        }
        bias -= lr * (grad_b / train_n);
    }

    let model = LogisticModel {
        model_version: model_version.to_string(),
        feature_columns: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
        weights: weights.to_vec(),
        bias,
    };

    std::fs::create_dir_all(artifact_dir)
        .with_context(|| format!("failed to create artifact dir {}", artifact_dir.display()))?;
    let artifact_path = artifact_dir.join(format!("{model_version}.json"));
    std::fs::write(&artifact_path, serde_json::to_string_pretty(&model)?)
        .with_context(|| format!("failed to write artifact {}", artifact_path.display()))?;

    let probs: Vec<f64> = x_test
        .iter()
        .map(|features| {
            let mut z = bias;
            for (w, f) in weights.iter().zip(features) {
                z += w * f;
            }
            sigmoid(z)
        })
        .collect();
    let holdout_size = y_test.len();
    let log_loss =
        probs.iter().zip(y_test).map(|(&p, &y)| logloss(p, y)).sum::<f64>() / holdout_size as f64;
    let brier = probs
        .iter()
        .zip(y_test)
        .map(|(&p, &y)| (p - y).powi(2))
        .sum::<f64>()
        / holdout_size as f64;
    let accuracy = probs
        .iter()
        .zip(y_test)
        .filter(|&(&p, &y)| (p >= 0.5) == (y > 0.5))
        .count() as f64
        / holdout_size as f64;

    let metrics = TrainMetrics {
        n_samples: n,
        trained_at: Utc::now(),
        holdout_size,
        log_loss,
        brier_score_loss: brier,
        accuracy,
        calibration_bins: calibration_bins(y_test, &probs, 10),
    };

    Ok((artifact_path.to_string_lossy().into_owned(), metrics))
}

/// Score a feature row against a serialized artifact, returning the
/// home-win probability.
pub fn predict_home_win_probability(row: &FeatureRow, artifact_path: &str) -> Result<f64> {
    let raw = std::fs::read_to_string(artifact_path)
        .with_context(|| format!("failed to read model artifact {artifact_path}"))?;
    let model: LogisticModel = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse model artifact {artifact_path}"))?;
    predict_with(&model, row)
}

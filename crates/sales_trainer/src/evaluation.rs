//! Regression metrics and best-model selection

use crate::errors::{Result, TrainerError};
use salescast_core::{EvaluationMetrics, Regressor, TrainedModel};

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean_squared_error(y_true, y_pred).sqrt()
}

/// Coefficient of determination
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// RMSE and R² of `model` on a held-out set
pub fn evaluate(model: &impl Regressor, features: &[Vec<f64>], targets: &[f64]) -> Result<EvaluationMetrics> {
    if features.is_empty() || features.len() != targets.len() {
        return Err(TrainerError::Dataset(format!(
            "cannot evaluate on {} rows with {} targets",
            features.len(),
            targets.len()
        )));
    }
    let predictions = model.predict_batch(features)?;
    Ok(EvaluationMetrics {
        rmse: rmse(targets, &predictions),
        r2: r2_score(targets, &predictions),
    })
}

/// Model with the strictly highest held-out R²; earlier models win ties
///
/// Models without metrics or with a NaN R² are never selected.
pub fn select_best(models: &[TrainedModel]) -> Option<&TrainedModel> {
    let mut best: Option<(&TrainedModel, f64)> = None;
    for model in models {
        let Some(r2) = model.metrics.map(|m| m.r2).filter(|r2| !r2.is_nan()) else {
            continue;
        };
        if best.map_or(true, |(_, best_r2)| r2 > best_r2) {
            best = Some((model, r2));
        }
    }
    best.map(|(model, _)| model)
}

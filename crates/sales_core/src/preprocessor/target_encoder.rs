//! Smoothed target encoding for high-cardinality categories

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Smoothing parameters for target encoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetEncoderConfig {
    /// Category size at which the category mean and the prior weigh equally
    pub min_samples_leaf: f64,
    /// Steepness of the sigmoid blending the two; larger is smoother
    pub smoothing: f64,
}

impl Default for TargetEncoderConfig {
    fn default() -> Self {
        Self {
            min_samples_leaf: 20.0,
            smoothing: 10.0,
        }
    }
}

/// Fitted category → statistic mapping for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub column: String,
    pub values: BTreeMap<String, f64>,
}

/// Fitted target encoder over one or more categorical columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEncoder {
    config: TargetEncoderConfig,
    /// Mean of the training target; the value of every unseen category
    prior: f64,
    columns: Vec<CategoryEncoding>,
}

impl TargetEncoder {
    /// Fit on `(column name, categories)` pairs against `target`
    ///
    /// Callers guarantee every column has `target.len()` entries and that
    /// `target` is not empty.
    pub fn fit(config: TargetEncoderConfig, columns: &[(&str, &[String])], target: &[f64]) -> Self {
        let prior = target.iter().sum::<f64>() / target.len() as f64;

        let columns = columns
            .iter()
            .map(|(name, categories)| {
                let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
                for (category, &y) in categories.iter().zip(target) {
                    let entry = sums.entry(category.as_str()).or_insert((0.0, 0));
                    entry.0 += y;
                    entry.1 += 1;
                }

                let values = sums
                    .into_iter()
                    .map(|(category, (sum, count))| {
                        let value = smoothed_mean(&config, prior, sum / count as f64, count);
                        (category.to_string(), value)
                    })
                    .collect();

                CategoryEncoding {
                    column: name.to_string(),
                    values,
                }
            })
            .collect();

        Self {
            config,
            prior,
            columns,
        }
    }

    /// Encoded value of `category` in the `idx`-th fitted column
    pub fn encode(&self, idx: usize, category: &str) -> f64 {
        self.columns[idx]
            .values
            .get(category)
            .copied()
            .unwrap_or(self.prior)
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn config(&self) -> &TargetEncoderConfig {
        &self.config
    }

    pub fn columns(&self) -> &[CategoryEncoding] {
        &self.columns
    }
}

/// Blend a category mean with the prior by a sigmoid of the category size.
/// Singleton categories carry no usable signal and encode to the prior.
fn smoothed_mean(config: &TargetEncoderConfig, prior: f64, mean: f64, count: usize) -> f64 {
    if count <= 1 {
        return prior;
    }
    let weight = 1.0 / (1.0 + (-(count as f64 - config.min_samples_leaf) / config.smoothing).exp());
    prior * (1.0 - weight) + mean * weight
}

//! Standard scaling of numeric columns

use serde::{Deserialize, Serialize};

/// Learned location and scale of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation; stored as 1.0 for constant columns
    pub std_dev: f64,
}

/// Fitted standard scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    scales: Vec<ColumnScale>,
}

impl StandardScaler {
    /// Callers guarantee every column is non-empty.
    pub fn fit(columns: &[(&str, &[f64])]) -> Self {
        let scales = columns
            .iter()
            .map(|(name, values)| {
                // Summation rounding would leave a constant column with a
                // tiny non-zero spread.
                if values.windows(2).all(|w| w[0] == w[1]) {
                    return ColumnScale {
                        column: name.to_string(),
                        mean: values.first().copied().unwrap_or(0.0),
                        std_dev: 1.0,
                    };
                }
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std_dev = variance.sqrt();
                ColumnScale {
                    column: name.to_string(),
                    mean,
                    std_dev: if std_dev > f64::EPSILON { std_dev } else { 1.0 },
                }
            })
            .collect();
        Self { scales }
    }

    pub fn scale(&self, idx: usize, value: f64) -> f64 {
        let s = &self.scales[idx];
        (value - s.mean) / s.std_dev
    }

    pub fn scales(&self) -> &[ColumnScale] {
        &self.scales
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_to_zero_mean_unit_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let scaler = StandardScaler::fit(&[("x", &values[..])]);
        assert_eq!(scaler.scales()[0].mean, 5.0);
        assert_eq!(scaler.scales()[0].std_dev, 2.0);
        assert_eq!(scaler.scale(0, 9.0), 2.0);
    }

    #[test]
    fn test_constant_column_is_only_centered() {
        let values = [3.0, 3.0, 3.0];
        let scaler = StandardScaler::fit(&[("x", &values[..])]);
        assert_eq!(scaler.scale(0, 3.0), 0.0);
        assert_eq!(scaler.scale(0, 5.0), 2.0);

        let tenths = [0.1; 7];
        let scaler = StandardScaler::fit(&[("x", &tenths[..])]);
        assert_eq!(scaler.scales()[0].std_dev, 1.0);
        assert_eq!(scaler.scale(0, 0.1), 0.0);
    }
}

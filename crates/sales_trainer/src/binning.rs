//! Histogram binning of feature columns
//!
//! Each feature is reduced to at most [`MAX_BINS`] ordered bins. Tree
//! growing then works on `u8` bin codes, and a split "bin <= b" maps back to
//! the raw-space rule "value <= cuts[b]".

/// Upper bound on bins per feature
pub const MAX_BINS: usize = 256;

/// Column-major bin codes plus the cut points that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedMatrix {
    n_rows: usize,
    codes: Vec<u8>,
    cuts: Vec<Vec<f64>>,
}

impl BinnedMatrix {
    /// Bin row-major `rows`, each of length `n_features`
    pub fn from_rows(rows: &[Vec<f64>], n_features: usize, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, MAX_BINS);
        let n_rows = rows.len();
        let mut codes = Vec::with_capacity(n_rows * n_features);
        let mut cuts = Vec::with_capacity(n_features);

        for feature in 0..n_features {
            let column: Vec<f64> = rows.iter().map(|row| row[feature]).collect();
            let feature_cuts = cut_points(&column, max_bins);
            codes.extend(column.iter().map(|&x| bin_of(&feature_cuts, x)));
            cuts.push(feature_cuts);
        }

        Self {
            n_rows,
            codes,
            cuts,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    /// Bin codes of one feature, indexed by row
    pub fn column(&self, feature: usize) -> &[u8] {
        &self.codes[feature * self.n_rows..(feature + 1) * self.n_rows]
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }

    /// Raw-space threshold equivalent to "bin <= `bin`"
    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.cuts[feature][bin]
    }
}

/// Midpoints between distinct values when they fit in `max_bins`,
/// otherwise distinct quantiles.
fn cut_points(column: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted = column.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();

    if distinct.len() <= max_bins {
        return distinct.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect();
    }

    let n = sorted.len();
    let mut cuts: Vec<f64> = (1..max_bins).map(|q| sorted[q * n / max_bins]).collect();
    cuts.dedup();
    // The maximum must stay right of the last cut.
    if cuts.last().is_some_and(|&c| c >= sorted[n - 1]) {
        cuts.pop();
    }
    cuts
}

fn bin_of(cuts: &[f64], x: f64) -> u8 {
    cuts.partition_point(|&c| c < x) as u8
}

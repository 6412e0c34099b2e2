//! One-hot encoding over a fixed, fitted vocabulary

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted vocabulary of one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub column: String,
    pub categories: Vec<String>,
}

impl Vocabulary {
    /// Position of `category`, or `None` for a category unseen during fit
    pub fn index_of(&self, category: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(category))
            .ok()
    }
}

/// Fitted one-hot encoder over one or more categorical columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    vocabularies: Vec<Vocabulary>,
}

impl OneHotEncoder {
    pub fn fit(columns: &[(&str, &[String])]) -> Self {
        let vocabularies = columns
            .iter()
            .map(|(name, values)| Vocabulary {
                column: name.to_string(),
                categories: values
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect(),
            })
            .collect();
        Self { vocabularies }
    }

    /// Append the indicator block for `category` of the `idx`-th column.
    ///
    /// Unseen categories produce an all-zero block.
    pub fn encode_into(&self, idx: usize, category: &str, out: &mut Vec<f64>) {
        let vocabulary = &self.vocabularies[idx];
        let start = out.len();
        out.resize(start + vocabulary.categories.len(), 0.0);
        if let Some(pos) = vocabulary.index_of(category) {
            out[start + pos] = 1.0;
        }
    }

    /// Total number of indicator columns
    pub fn width(&self) -> usize {
        self.vocabularies.iter().map(|v| v.categories.len()).sum()
    }

    /// Indicator labels, `<column>_<category>`
    pub fn feature_names(&self) -> impl Iterator<Item = String> + '_ {
        self.vocabularies.iter().flat_map(|v| {
            v.categories
                .iter()
                .map(move |category| format!("{}_{}", v.column, category))
        })
    }

    pub fn vocabularies(&self) -> &[Vocabulary] {
        &self.vocabularies
    }
}

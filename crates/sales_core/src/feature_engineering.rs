//! Derived sales features
//!
//! Adds three numeric columns to the sales table:
//! - `Total_Known_Sales`: row-wise sum of the four regional sales columns
//! - `Publisher_Avg`: mean global sales of the row's publisher
//! - `Platform_Count`: number of titles released on the row's platform
//!
//! The two group statistics are fitted on a reference set of rows and then
//! applied to any table. Fitting them on the training partition only keeps
//! the evaluation rows' targets out of `Publisher_Avg`; see [`LeakagePolicy`].

use crate::errors::{Result, SalesError};
use crate::record::SalesRecord;
use crate::table::{col, Column, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Which rows the group statistics are fitted on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeakagePolicy {
    /// Fit on the training partition only
    #[default]
    TrainOnly,
    /// Fit on every row, evaluation rows included
    WholeTable,
}

/// Group statistics backing the derived columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatureStats {
    /// Mean target per publisher
    pub publisher_means: BTreeMap<String, f64>,
    /// Row count per platform
    pub platform_counts: BTreeMap<String, u64>,
    /// Mean target over the reference rows; used for unseen publishers
    pub global_mean: f64,
    /// Number of reference rows the statistics were fitted on
    pub reference_rows: usize,
}

impl DerivedFeatureStats {
    /// Fit the group statistics on `rows` of `table`
    ///
    /// `target` names the numeric column averaged per publisher.
    #[instrument(skip(table, rows), fields(reference_rows = rows.len()))]
    pub fn fit(table: &Table, target: &str, rows: &[usize]) -> Result<Self> {
        if rows.is_empty() {
            return Err(SalesError::InvalidParameters(
                "derived features need at least one reference row".into(),
            ));
        }

        let publishers = table.categorical(col::PUBLISHER)?;
        let platforms = table.categorical(col::PLATFORM)?;
        let targets = table.numeric(target)?;

        let mut sums: BTreeMap<&str, (f64, u64)> = BTreeMap::new();
        let mut platform_counts = BTreeMap::new();
        let mut total = 0.0;

        for &row in rows {
            let entry = sums.entry(publishers[row].as_str()).or_insert((0.0, 0));
            entry.0 += targets[row];
            entry.1 += 1;
            *platform_counts.entry(platforms[row].clone()).or_insert(0) += 1;
            total += targets[row];
        }

        let publisher_means = sums
            .into_iter()
            .map(|(publisher, (sum, count))| (publisher.to_string(), sum / count as f64))
            .collect::<BTreeMap<_, _>>();

        debug!(
            "Fitted derived features: {} publishers, {} platforms",
            publisher_means.len(),
            platform_counts.len()
        );

        Ok(Self {
            publisher_means,
            platform_counts,
            global_mean: total / rows.len() as f64,
            reference_rows: rows.len(),
        })
    }

    pub fn publisher_avg(&self, publisher: &str) -> f64 {
        self.publisher_means
            .get(publisher)
            .copied()
            .unwrap_or(self.global_mean)
    }

    pub fn platform_count(&self, platform: &str) -> f64 {
        self.platform_counts.get(platform).copied().unwrap_or(0) as f64
    }

    /// Return a copy of `table` with the three derived columns appended
    pub fn apply(&self, table: &Table) -> Result<Table> {
        let regional = col::REGIONAL_SALES
            .iter()
            .map(|name| table.numeric(name))
            .collect::<Result<Vec<_>>>()?;
        let publishers = table.categorical(col::PUBLISHER)?;
        let platforms = table.categorical(col::PLATFORM)?;

        let total: Vec<f64> = (0..table.n_rows())
            .map(|row| regional.iter().map(|values| values[row]).sum::<f64>())
            .collect();
        let publisher_avg: Vec<f64> = publishers.iter().map(|p| self.publisher_avg(p)).collect();
        let platform_count: Vec<f64> = platforms.iter().map(|p| self.platform_count(p)).collect();

        let mut augmented = table.clone();
        augmented.push_column(col::TOTAL_KNOWN_SALES, Column::Numeric(total))?;
        augmented.push_column(col::PUBLISHER_AVG, Column::Numeric(publisher_avg))?;
        augmented.push_column(col::PLATFORM_COUNT, Column::Numeric(platform_count))?;
        Ok(augmented)
    }

    /// One-row augmented table for a single record (inference path)
    pub fn apply_record(&self, record: &SalesRecord) -> Result<Table> {
        self.apply(&Table::from_records(std::slice::from_ref(record)))
    }
}

/// Fit derived-feature statistics under `policy` and augment the whole table
///
/// `train_rows` are the training partition's row indices; they are ignored
/// under [`LeakagePolicy::WholeTable`].
pub fn engineer_features(
    table: &Table,
    target: &str,
    train_rows: &[usize],
    policy: LeakagePolicy,
) -> Result<(Table, DerivedFeatureStats)> {
    let stats = match policy {
        LeakagePolicy::TrainOnly => DerivedFeatureStats::fit(table, target, train_rows)?,
        LeakagePolicy::WholeTable => {
            let all_rows = (0..table.n_rows()).collect::<Vec<_>>();
            DerivedFeatureStats::fit(table, target, &all_rows)?
        }
    };
    let augmented = stats.apply(table)?;
    Ok((augmented, stats))
}

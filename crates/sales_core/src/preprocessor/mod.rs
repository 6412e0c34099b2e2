//! Composite preprocessor
//!
//! One fit/transform unit made of three typed sub-encoders, each bound to a
//! disjoint set of input columns:
//! - [`TargetEncoder`] for high-cardinality categoricals
//! - [`OneHotEncoder`] for low-cardinality categoricals
//! - [`StandardScaler`] for numeric columns
//!
//! The output matrix is the horizontal concatenation of the three blocks in
//! that order. The fitted preprocessor is the unit persisted and reused at
//! inference time.

pub mod one_hot;
pub mod scaler;
pub mod target_encoder;

pub use one_hot::{OneHotEncoder, Vocabulary};
pub use scaler::{ColumnScale, StandardScaler};
pub use target_encoder::{CategoryEncoding, TargetEncoder, TargetEncoderConfig};

use crate::errors::{Result, SalesError};
use crate::feature_engineering::DerivedFeatureStats;
use crate::record::SalesRecord;
use crate::table::{col, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Partition of input columns into the three encoder roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRoles {
    target_encoded: Vec<String>,
    one_hot: Vec<String>,
    numeric: Vec<String>,
}

impl ColumnRoles {
    /// Validate and build a role assignment
    ///
    /// Fails when a column appears twice, within one role or across roles,
    /// or when no column is declared at all.
    pub fn new<S: Into<String>>(
        target_encoded: impl IntoIterator<Item = S>,
        one_hot: impl IntoIterator<Item = S>,
        numeric: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let roles = Self {
            target_encoded: target_encoded.into_iter().map(Into::into).collect(),
            one_hot: one_hot.into_iter().map(Into::into).collect(),
            numeric: numeric.into_iter().map(Into::into).collect(),
        };
        roles.validate()?;
        Ok(roles)
    }

    /// Role assignment of the sales model
    pub fn sales_default() -> Self {
        Self {
            target_encoded: vec![col::PUBLISHER.to_string()],
            one_hot: vec![col::PLATFORM.to_string(), col::GENRE.to_string()],
            numeric: [
                col::YEAR,
                col::NA_SALES,
                col::EU_SALES,
                col::JP_SALES,
                col::OTHER_SALES,
                col::TOTAL_KNOWN_SALES,
                col::PUBLISHER_AVG,
                col::PLATFORM_COUNT,
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for column in self.all_columns() {
            if !seen.insert(column) {
                return Err(SalesError::InvalidColumnRoles(format!(
                    "column {} is declared more than once",
                    column
                )));
            }
        }
        if seen.is_empty() {
            return Err(SalesError::InvalidColumnRoles(
                "at least one column must be declared".into(),
            ));
        }
        Ok(())
    }

    pub fn target_encoded(&self) -> &[String] {
        &self.target_encoded
    }

    pub fn one_hot(&self) -> &[String] {
        &self.one_hot
    }

    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    /// Every declared column, in output role order
    pub fn all_columns(&self) -> impl Iterator<Item = &str> {
        self.target_encoded
            .iter()
            .chain(&self.one_hot)
            .chain(&self.numeric)
            .map(String::as_str)
    }
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self::sales_default()
    }
}

/// State learned by `fit`; read-only afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedState {
    pub target_encoder: TargetEncoder,
    pub one_hot: OneHotEncoder,
    pub scaler: StandardScaler,
    pub fitted_rows: usize,
}

/// Target encoder, one-hot encoder and scaler behind one fit/transform API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositePreprocessor {
    roles: ColumnRoles,
    target_config: TargetEncoderConfig,
    state: Option<FittedState>,
}

impl CompositePreprocessor {
    pub fn new(roles: ColumnRoles) -> Self {
        Self::with_target_config(roles, TargetEncoderConfig::default())
    }

    pub fn with_target_config(roles: ColumnRoles, target_config: TargetEncoderConfig) -> Self {
        Self {
            roles,
            target_config,
            state: None,
        }
    }

    /// Fit all three sub-encoders; re-fitting replaces any earlier state
    #[instrument(skip(self, table, target), fields(rows = table.n_rows()))]
    pub fn fit(&mut self, table: &Table, target: &[f64]) -> Result<()> {
        if table.n_rows() == 0 {
            return Err(SalesError::InvalidParameters(
                "cannot fit preprocessor on an empty table".into(),
            ));
        }
        if target.len() != table.n_rows() {
            return Err(SalesError::InvalidParameters(format!(
                "target has {} values, table has {} rows",
                target.len(),
                table.n_rows()
            )));
        }

        let te_columns = categorical_columns(table, &self.roles.target_encoded)?;
        let oh_columns = categorical_columns(table, &self.roles.one_hot)?;
        let num_columns = numeric_columns(table, &self.roles.numeric)?;

        let state = FittedState {
            target_encoder: TargetEncoder::fit(self.target_config, &te_columns, target),
            one_hot: OneHotEncoder::fit(&oh_columns),
            scaler: StandardScaler::fit(&num_columns),
            fitted_rows: table.n_rows(),
        };

        info!(
            "Fitted preprocessor on {} rows: {} target-encoded, {} one-hot indicators, {} numeric",
            table.n_rows(),
            te_columns.len(),
            state.one_hot.width(),
            num_columns.len()
        );
        self.state = Some(state);
        Ok(())
    }

    /// Encode `table` into a row-major feature matrix
    #[instrument(skip(self, table), fields(rows = table.n_rows()))]
    pub fn transform(&self, table: &Table) -> Result<Vec<Vec<f64>>> {
        let state = self.state.as_ref().ok_or(SalesError::NotFitted)?;

        let te_columns = categorical_columns(table, &self.roles.target_encoded)?;
        let oh_columns = categorical_columns(table, &self.roles.one_hot)?;
        let num_columns = numeric_columns(table, &self.roles.numeric)?;

        let width = self.output_width(state);
        let mut matrix = Vec::with_capacity(table.n_rows());
        for row in 0..table.n_rows() {
            let mut features = Vec::with_capacity(width);
            for (idx, (_, values)) in te_columns.iter().enumerate() {
                features.push(state.target_encoder.encode(idx, &values[row]));
            }
            for (idx, (_, values)) in oh_columns.iter().enumerate() {
                state.one_hot.encode_into(idx, &values[row], &mut features);
            }
            for (idx, (_, values)) in num_columns.iter().enumerate() {
                features.push(state.scaler.scale(idx, values[row]));
            }
            matrix.push(features);
        }

        debug!("Transformed {} rows into {} features", matrix.len(), width);
        Ok(matrix)
    }

    pub fn fit_transform(&mut self, table: &Table, target: &[f64]) -> Result<Vec<Vec<f64>>> {
        self.fit(table, target)?;
        self.transform(table)
    }

    /// Encode one raw record, recomputing its derived columns from `derived`
    pub fn transform_record(
        &self,
        record: &SalesRecord,
        derived: &DerivedFeatureStats,
    ) -> Result<Vec<f64>> {
        let table = derived.apply_record(record)?;
        let mut matrix = self.transform(&table)?;
        matrix
            .pop()
            .ok_or_else(|| SalesError::InvalidParameters("record produced no feature row".into()))
    }

    /// Output column labels in matrix order
    pub fn feature_names(&self) -> Result<Vec<String>> {
        let state = self.state.as_ref().ok_or(SalesError::NotFitted)?;
        let mut names = Vec::with_capacity(self.output_width(state));
        names.extend(self.roles.target_encoded.iter().cloned());
        names.extend(state.one_hot.feature_names());
        names.extend(self.roles.numeric.iter().cloned());
        Ok(names)
    }

    /// Number of output columns, once fitted
    pub fn n_features(&self) -> Option<usize> {
        self.state.as_ref().map(|state| self.output_width(state))
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    pub fn state(&self) -> Option<&FittedState> {
        self.state.as_ref()
    }

    fn output_width(&self, state: &FittedState) -> usize {
        self.roles.target_encoded.len() + state.one_hot.width() + self.roles.numeric.len()
    }
}

fn categorical_columns<'a>(
    table: &'a Table,
    names: &'a [String],
) -> Result<Vec<(&'a str, &'a [String])>> {
    names
        .iter()
        .map(|name| -> Result<_> { Ok((name.as_str(), table.categorical(name)?)) })
        .collect()
}

fn numeric_columns<'a>(table: &'a Table, names: &'a [String]) -> Result<Vec<(&'a str, &'a [f64])>> {
    names
        .iter()
        .map(|name| -> Result<_> { Ok((name.as_str(), table.numeric(name)?)) })
        .collect()
}

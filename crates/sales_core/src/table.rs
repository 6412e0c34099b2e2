//! Column-oriented table of mixed categorical and numeric columns
//!
//! This is the in-memory shape every stage of the pipeline consumes: the
//! ingested sales records, the table augmented with derived features, and
//! the one-row tables built at inference time.

use crate::errors::{Result, SalesError};
use crate::record::SalesRecord;

/// Column names of the input schema and of the derived features.
pub mod col {
    pub const NAME: &str = "Name";
    pub const PLATFORM: &str = "Platform";
    pub const GENRE: &str = "Genre";
    pub const PUBLISHER: &str = "Publisher";
    pub const YEAR: &str = "Year";
    pub const NA_SALES: &str = "NA_Sales";
    pub const EU_SALES: &str = "EU_Sales";
    pub const JP_SALES: &str = "JP_Sales";
    pub const OTHER_SALES: &str = "Other_Sales";
    pub const GLOBAL_SALES: &str = "Global_Sales";

    pub const TOTAL_KNOWN_SALES: &str = "Total_Known_Sales";
    pub const PUBLISHER_AVG: &str = "Publisher_Avg";
    pub const PLATFORM_COUNT: &str = "Platform_Count";

    /// Regional sales columns summed into `Total_Known_Sales`
    pub const REGIONAL_SALES: [&str; 4] = [NA_SALES, EU_SALES, JP_SALES, OTHER_SALES];
}

/// A single named column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Categorical(Vec<String>),
    Numeric(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Categorical(values) => values.len(),
            Column::Numeric(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Categorical(values) => {
                Column::Categorical(indices.iter().map(|&i| values[i].clone()).collect())
            }
            Column::Numeric(values) => Column::Numeric(indices.iter().map(|&i| values[i]).collect()),
        }
    }
}

/// Table with named columns of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the input-schema table from validated records
    pub fn from_records(records: &[SalesRecord]) -> Self {
        let text = |f: fn(&SalesRecord) -> &str| {
            Column::Categorical(records.iter().map(|r| f(r).to_string()).collect())
        };
        let number = |f: fn(&SalesRecord) -> f64| Column::Numeric(records.iter().map(f).collect());

        let columns = vec![
            (col::NAME, text(|r| r.name.as_str())),
            (col::PLATFORM, text(|r| r.platform.as_str())),
            (col::GENRE, text(|r| r.genre.as_str())),
            (col::PUBLISHER, text(|r| r.publisher.as_str())),
            (col::YEAR, number(|r| f64::from(r.year))),
            (col::NA_SALES, number(|r| r.na_sales)),
            (col::EU_SALES, number(|r| r.eu_sales)),
            (col::JP_SALES, number(|r| r.jp_sales)),
            (col::OTHER_SALES, number(|r| r.other_sales)),
            (col::GLOBAL_SALES, number(|r| r.global_sales)),
        ];

        Self {
            names: columns.iter().map(|(name, _)| name.to_string()).collect(),
            columns: columns.into_iter().map(|(_, column)| column).collect(),
            n_rows: records.len(),
        }
    }

    /// Add a column, replacing any existing column of the same name
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.n_rows {
            return Err(SalesError::InvalidParameters(format!(
                "column {} has {} rows, table has {}",
                name,
                column.len(),
                self.n_rows
            )));
        }
        if self.columns.is_empty() {
            self.n_rows = column.len();
        }

        match self.names.iter().position(|n| *n == name) {
            Some(idx) => self.columns[idx] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| SalesError::ColumnMissing(name.to_string()))
    }

    pub fn categorical(&self, name: &str) -> Result<&[String]> {
        match self.column(name)? {
            Column::Categorical(values) => Ok(values),
            Column::Numeric(_) => Err(SalesError::ColumnTypeMismatch {
                column: name.to_string(),
                expected: "categorical",
            }),
        }
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Categorical(_) => Err(SalesError::ColumnTypeMismatch {
                column: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// New table holding the given rows, in the given order
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            n_rows: indices.len(),
        }
    }
}

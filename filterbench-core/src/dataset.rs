//! Synthetic dataset generation.
//!
//! Datasets come in two layouts carrying the same logical content:
//!
//! - **Rows**: one record per row, mapping dimension name to value
//! - **Columnar**: one fixed-width array per dimension plus a shared row count
//!
//! Cells are drawn uniformly from `[min, max)` in row-major order regardless
//! of layout, so the same seed yields value-identical datasets in both forms.

use std::collections::BTreeMap;

use crate::{BenchError, BenchResult, RandomProvider};

/// One row record: dimension name to value.
pub type Row = BTreeMap<String, f64>;

/// One dimension's values in columnar form.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Dimension name.
    pub name: String,
    /// One value per row.
    pub values: Vec<f64>,
}

/// Physical layout of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Sequence of row records.
    Rows,
    /// One array per dimension.
    Columnar,
}

impl Layout {
    /// Label used in sample names, e.g. `Ingest (columnar)`.
    pub fn label(self) -> &'static str {
        match self {
            Layout::Rows => "rows",
            Layout::Columnar => "columnar",
        }
    }
}

/// A generated dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    /// Row-oriented form.
    Rows {
        /// Dimension names in generation order.
        dimensions: Vec<String>,
        /// One record per row.
        records: Vec<Row>,
    },
    /// Column-oriented form.
    Columnar {
        /// Number of rows; every column has exactly this many values.
        row_count: usize,
        /// One column per dimension, in generation order.
        columns: Vec<Column>,
    },
}

impl Dataset {
    /// Layout of this dataset.
    pub fn layout(&self) -> Layout {
        match self {
            Dataset::Rows { .. } => Layout::Rows,
            Dataset::Columnar { .. } => Layout::Columnar,
        }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        match self {
            Dataset::Rows { records, .. } => records.len(),
            Dataset::Columnar { row_count, .. } => *row_count,
        }
    }

    /// Dimension names in generation order.
    pub fn dimension_names(&self) -> Vec<&str> {
        match self {
            Dataset::Rows { dimensions, .. } => dimensions.iter().map(String::as_str).collect(),
            Dataset::Columnar { columns, .. } => columns.iter().map(|c| c.name.as_str()).collect(),
        }
    }

    /// Number of values present for `name`, or `None` if the dimension is unknown.
    pub fn value_count(&self, name: &str) -> Option<usize> {
        match self {
            Dataset::Rows {
                dimensions,
                records,
            } => {
                if !dimensions.iter().any(|d| d == name) {
                    return None;
                }
                Some(records.iter().filter(|r| r.contains_key(name)).count())
            }
            Dataset::Columnar { columns, .. } => columns
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.values.len()),
        }
    }

    /// Values of one dimension in row order, or `None` if the dimension is unknown.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        match self {
            Dataset::Rows {
                dimensions,
                records,
            } => {
                if !dimensions.iter().any(|d| d == name) {
                    return None;
                }
                Some(
                    records
                        .iter()
                        .map(|r| r.get(name).copied().unwrap_or(f64::NAN))
                        .collect(),
                )
            }
            Dataset::Columnar { columns, .. } => columns
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.values.clone()),
        }
    }

    /// Iterate over every cell value, in no particular order.
    pub fn values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            Dataset::Rows { records, .. } => {
                Box::new(records.iter().flat_map(|r| r.values().copied()))
            }
            Dataset::Columnar { columns, .. } => {
                Box::new(columns.iter().flat_map(|c| c.values.iter().copied()))
            }
        }
    }

    /// Convert to columnar form, consuming the dataset.
    ///
    /// Row records missing a dimension contribute `NaN`, which never falls
    /// inside a filter range.
    pub fn into_columns(self) -> (usize, Vec<Column>) {
        match self {
            Dataset::Columnar { row_count, columns } => (row_count, columns),
            Dataset::Rows {
                dimensions,
                records,
            } => {
                let row_count = records.len();
                let columns = dimensions
                    .into_iter()
                    .map(|name| {
                        let values = records
                            .iter()
                            .map(|r| r.get(&name).copied().unwrap_or(f64::NAN))
                            .collect();
                        Column { name, values }
                    })
                    .collect();
                (row_count, columns)
            }
        }
    }
}

/// Deterministic dimension name for index `i` (`dim0`, `dim1`, ...).
pub fn dimension_name(i: usize) -> String {
    format!("dim{i}")
}

/// Shape and value range of a dataset to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    /// Number of rows.
    pub rows: usize,
    /// Number of dimensions.
    pub dimensions: usize,
    /// Inclusive lower bound of cell values.
    pub min: f64,
    /// Exclusive upper bound of cell values.
    pub max: f64,
    /// Output layout.
    pub layout: Layout,
}

impl DatasetSpec {
    /// Row-layout spec over the default range `[0, 1000)`.
    pub fn new(rows: usize, dimensions: usize) -> Self {
        Self {
            rows,
            dimensions,
            min: 0.0,
            max: 1000.0,
            layout: Layout::Rows,
        }
    }

    /// Set the value range `[min, max)`.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the output layout.
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Check that the value range is usable.
    pub fn validate(&self) -> BenchResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(BenchError::InvalidConfig(format!(
                "value range must be finite, got [{}, {})",
                self.min, self.max
            )));
        }
        if self.max <= self.min {
            return Err(BenchError::InvalidConfig(format!(
                "max ({}) must be greater than min ({})",
                self.max, self.min
            )));
        }
        Ok(())
    }
}

/// Generates synthetic datasets from a [`RandomProvider`].
#[derive(Debug, Clone)]
pub struct DatasetGenerator<R: RandomProvider> {
    random: R,
}

impl<R: RandomProvider> DatasetGenerator<R> {
    /// Create a generator drawing from `random`.
    pub fn new(random: R) -> Self {
        Self { random }
    }

    /// Generate a dataset matching `spec`.
    pub fn generate(&self, spec: &DatasetSpec) -> BenchResult<Dataset> {
        spec.validate()?;
        tracing::debug!(
            "Generating {} rows x {} dims ({}) in [{}, {})",
            spec.rows,
            spec.dimensions,
            spec.layout.label(),
            spec.min,
            spec.max
        );

        let names: Vec<String> = (0..spec.dimensions).map(dimension_name).collect();
        let dataset = match spec.layout {
            Layout::Rows => {
                let records = (0..spec.rows)
                    .map(|_| {
                        names
                            .iter()
                            .map(|name| (name.clone(), self.draw(spec)))
                            .collect::<Row>()
                    })
                    .collect();
                Dataset::Rows {
                    dimensions: names,
                    records,
                }
            }
            Layout::Columnar => {
                let mut columns: Vec<Column> = names
                    .into_iter()
                    .map(|name| Column {
                        name,
                        values: Vec::with_capacity(spec.rows),
                    })
                    .collect();
                for _ in 0..spec.rows {
                    for column in columns.iter_mut() {
                        column.values.push(self.draw(spec));
                    }
                }
                Dataset::Columnar {
                    row_count: spec.rows,
                    columns,
                }
            }
        };
        Ok(dataset)
    }

    fn draw(&self, spec: &DatasetSpec) -> f64 {
        self.random.random_range(spec.min..spec.max)
    }
}

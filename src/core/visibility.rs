//! Column-oriented visibility dataset.
//!
//! Rows keep insertion order. Every row shares the dataset's frequency
//! vector. Row selection always produces an independent copy.

use crate::core::error::{FacetError, FacetResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// One baseline sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisRow {
    /// Baseline coordinates (u, v, w) in wavelengths.
    pub uvw: [f64; 3],
    /// Sample timestamp.
    pub time: f64,
    /// First antenna of the baseline.
    pub antenna1: usize,
    /// Second antenna of the baseline.
    pub antenna2: usize,
    /// Complex visibility.
    pub vis: Complex64,
    /// Sample weight.
    pub weight: f64,
}

/// An ordered set of visibility rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Visibility {
    /// Baseline coordinates per row.
    pub uvw: Vec<[f64; 3]>,
    /// Timestamp per row.
    pub time: Vec<f64>,
    /// First antenna id per row.
    pub antenna1: Vec<usize>,
    /// Second antenna id per row.
    pub antenna2: Vec<usize>,
    /// Visibility sample per row.
    pub vis: Vec<Complex64>,
    /// Weight per row.
    pub weight: Vec<f64>,
    /// Channel frequencies shared by all rows.
    pub frequency: Vec<f64>,
}

impl Visibility {
    /// An empty dataset with the given frequency vector.
    pub fn new(frequency: Vec<f64>) -> Self {
        Self {
            frequency,
            ..Self::default()
        }
    }

    /// Build a dataset from rows.
    pub fn from_rows(frequency: Vec<f64>, rows: impl IntoIterator<Item = VisRow>) -> Self {
        let mut vis = Self::new(frequency);
        for row in rows {
            vis.push_row(row);
        }
        vis
    }

    /// Append a row.
    pub fn push_row(&mut self, row: VisRow) {
        self.uvw.push(row.uvw);
        self.time.push(row.time);
        self.antenna1.push(row.antenna1);
        self.antenna2.push(row.antenna2);
        self.vis.push(row.vis);
        self.weight.push(row.weight);
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.time.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.nrows() == 0
    }

    /// Read a single row.
    pub fn row(&self, index: usize) -> Option<VisRow> {
        if index >= self.nrows() {
            return None;
        }
        Some(VisRow {
            uvw: self.uvw[index],
            time: self.time[index],
            antenna1: self.antenna1[index],
            antenna2: self.antenna2[index],
            vis: self.vis[index],
            weight: self.weight[index],
        })
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = VisRow> + '_ {
        (0..self.nrows()).filter_map(move |i| self.row(i))
    }

    /// Copy the given rows, in the given order, into a new dataset.
    pub fn select_rows(&self, rows: &[usize]) -> FacetResult<Visibility> {
        let mut out = Visibility::new(self.frequency.clone());
        for &index in rows {
            let row = self.row(index).ok_or_else(|| {
                FacetError::InvalidInput(format!(
                    "row {} out of range for {} rows",
                    index,
                    self.nrows()
                ))
            })?;
            out.push_row(row);
        }
        Ok(out)
    }

    /// Set every `vis` sample to zero.
    pub fn zero_vis(&mut self) {
        self.vis.iter_mut().for_each(|v| *v = Complex64::new(0.0, 0.0));
    }

    /// Check that all per-row columns have the same length.
    pub fn validate(&self) -> FacetResult<()> {
        let n = self.nrows();
        let columns = [
            ("uvw", self.uvw.len()),
            ("antenna1", self.antenna1.len()),
            ("antenna2", self.antenna2.len()),
            ("vis", self.vis.len()),
            ("weight", self.weight.len()),
        ];
        for (name, len) in columns {
            if len != n {
                return Err(FacetError::InvalidInput(format!(
                    "column '{}' has {} entries, expected {}",
                    name, len, n
                )));
            }
        }
        Ok(())
    }
}

//! Records and datasets.
//!
//! A [`Dataset`] is an immutable, ordered collection of [`Record`]s that all
//! carry the same number of numeric attributes. Queries hold it by shared
//! reference only.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while assembling a dataset
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    /// A record's attribute count differs from the dataset width
    #[error("record `{id}` has {got} attributes, expected {expected}")]
    Ragged {
        id: String,
        expected: usize,
        got: usize,
    },
    /// A record carries a NaN or infinite attribute value
    #[error("record `{id}` has a non-finite value at attribute {attribute}")]
    NonFinite { id: String, attribute: usize },
    /// Two records share an identifier
    #[error("duplicate record id `{0}`")]
    DuplicateId(String),
    /// Input could not be parsed
    #[error("failed to parse dataset: {0}")]
    Parse(String),
}

/// One row: an identifier plus fixed-width numeric attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    values: Vec<f64>,
}

impl Record {
    pub fn new(id: impl Into<String>, values: Vec<f64>) -> Self {
        Record {
            id: id.into(),
            values,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Attribute value, or `None` when the index is past the record width
    pub fn get(&self, attribute: usize) -> Option<f64> {
        self.values.get(attribute).copied()
    }
}

/// Serialized form accepted by [`Dataset::from_json_str`]
#[derive(Debug, Deserialize, Serialize)]
struct DatasetFile {
    #[serde(default)]
    width: Option<usize>,
    records: Vec<Record>,
}

/// Ordered, fixed-width collection of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    width: usize,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset, taking the width from the first record
    pub fn new(records: Vec<Record>) -> Result<Self, DatasetError> {
        let width = records.first().map_or(0, |r| r.values.len());
        Self::with_width(width, records)
    }

    /// Build a dataset with a declared width (needed for empty datasets).
    ///
    /// Every attribute value must be finite.
    pub fn with_width(width: usize, records: Vec<Record>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if record.values.len() != width {
                return Err(DatasetError::Ragged {
                    id: record.id.clone(),
                    expected: width,
                    got: record.values.len(),
                });
            }
            if let Some(attribute) = record.values.iter().position(|v| !v.is_finite()) {
                return Err(DatasetError::NonFinite {
                    id: record.id.clone(),
                    attribute,
                });
            }
            if !seen.insert(record.id.as_str()) {
                return Err(DatasetError::DuplicateId(record.id.clone()));
            }
        }
        Ok(Dataset { width, records })
    }

    /// An empty dataset with a declared schema width
    pub fn empty(width: usize) -> Self {
        Dataset {
            width,
            records: Vec::new(),
        }
    }

    /// Parse `{"width": 2, "records": [{"id": "a", "values": [1.0, 2.0]}]}`
    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        let file: DatasetFile =
            serde_json::from_str(json).map_err(|e| DatasetError::Parse(e.to_string()))?;
        match file.width {
            Some(width) => Self::with_width(width, file.records),
            None => Self::new(file.records),
        }
    }

    pub fn to_json_string(&self) -> Result<String, DatasetError> {
        serde_json::to_string_pretty(self).map_err(|e| DatasetError::Parse(e.to_string()))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// All values of one attribute, or `None` if it is outside the schema
    pub fn column(&self, attribute: usize) -> Option<Vec<f64>> {
        if attribute >= self.width {
            return None;
        }
        Some(self.records.iter().map(|r| r.values[attribute]).collect())
    }

    /// Observed (min, max) of an attribute; `None` when empty or out of schema
    pub fn column_range(&self, attribute: usize) -> Option<(f64, f64)> {
        let column = self.column(attribute)?;
        let first = *column.first()?;
        Some(
            column
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }
}

mod columns;
mod parser;

pub use columns::{Column, ColumnKind};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Identifier of an insured subscriber (`Versnr`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub String);

impl PolicyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PolicyId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl From<&str> for PolicyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for PolicyId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// A typed grouping key value. Years group numerically, codes group as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum GroupValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Integer(value) => write!(f, "{value}"),
            GroupValue::Text(value) => f.write_str(value),
        }
    }
}

/// One line item of healthcare spending.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseRecord {
    pub policy_id: PolicyId,
    pub year: i32,
    pub amount: f64,
    pub birth_year: i32,
    pub drug: Option<String>,
    pub procedure: Option<String>,
    pub diagnosis: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Option<String>>,
}

impl ExpenseRecord {
    pub fn new(policy_id: impl Into<PolicyId>, year: i32, amount: f64, birth_year: i32) -> Self {
        Self {
            policy_id: policy_id.into(),
            year,
            amount,
            birth_year,
            drug: None,
            procedure: None,
            diagnosis: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_drug(mut self, code: impl Into<String>) -> Self {
        self.drug = Some(code.into());
        self
    }

    pub fn with_procedure(mut self, code: impl Into<String>) -> Self {
        self.procedure = Some(code.into());
        self
    }

    pub fn with_diagnosis(mut self, code: impl Into<String>) -> Self {
        self.diagnosis = Some(code.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.attributes
            .insert(name.into(), value.map(str::to_string));
        self
    }

    /// Value of `column` as a grouping key, `None` when the cell is null or the
    /// column is not categorical.
    pub fn group_value(&self, column: &Column) -> Option<GroupValue> {
        match column.kind() {
            ColumnKind::PolicyId => Some(GroupValue::Text(self.policy_id.0.clone())),
            ColumnKind::Year => Some(GroupValue::Integer(i64::from(self.year))),
            ColumnKind::BirthYear => Some(GroupValue::Integer(i64::from(self.birth_year))),
            ColumnKind::Amount => None,
            ColumnKind::Drug => self.drug.clone().map(GroupValue::Text),
            ColumnKind::Procedure => self.procedure.clone().map(GroupValue::Text),
            ColumnKind::Diagnosis => self.diagnosis.clone().map(GroupValue::Text),
            ColumnKind::Attribute(_) => self
                .attribute(column)
                .map(|value| GroupValue::Text(value.to_string())),
        }
    }

    pub fn has_value(&self, column: &Column) -> bool {
        match column.kind() {
            ColumnKind::Amount => true,
            _ => self.group_value(column).is_some(),
        }
    }

    fn attribute(&self, column: &Column) -> Option<&str> {
        if let Some(value) = self.attributes.get(column.name()) {
            return value.as_deref();
        }

        self.attributes
            .iter()
            .find(|(name, _)| column.matches_key(name))
            .and_then(|(_, value)| value.as_deref())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to read expense table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid expense CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("expense table is missing required column {0}")]
    MissingColumn(&'static str),
    #[error("column {column} appears more than once in the header")]
    DuplicateColumn { column: String },
    #[error("line {line}: required column {column} is empty")]
    MissingValue { line: u64, column: &'static str },
    #[error("line {line}: column {column} holds {value:?}, expected a number")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
}

/// The in-memory expense table every report reads from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseTable {
    records: Vec<ExpenseRecord>,
    attribute_columns: BTreeSet<String>,
}

impl ExpenseTable {
    pub fn from_records(records: Vec<ExpenseRecord>) -> Self {
        let attribute_columns = records
            .iter()
            .flat_map(|record| record.attributes.keys().cloned())
            .collect();

        Self {
            records,
            attribute_columns,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let parsed = parser::parse_table(reader)?;
        debug!(
            rows = parsed.records.len(),
            attributes = parsed.attribute_columns.len(),
            "parsed expense table"
        );

        Ok(Self {
            records: parsed.records,
            attribute_columns: parsed.attribute_columns.into_iter().collect(),
        })
    }

    pub fn records(&self) -> &[ExpenseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Names of the additional categorical columns, sorted.
    pub fn attribute_columns(&self) -> impl Iterator<Item = &str> {
        self.attribute_columns.iter().map(String::as_str)
    }

    pub fn has_column(&self, column: &Column) -> bool {
        match column.kind() {
            ColumnKind::Attribute(_) => self
                .attribute_columns
                .iter()
                .any(|name| column.matches_key(name)),
            _ => true,
        }
    }

    pub fn rows_for<'a>(
        &'a self,
        policy_id: &'a PolicyId,
    ) -> impl Iterator<Item = (usize, &'a ExpenseRecord)> + 'a {
        self.records
            .iter()
            .enumerate()
            .filter(move |(_, record)| record.policy_id == *policy_id)
    }
}

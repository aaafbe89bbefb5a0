use super::columns::{Column, ColumnKind};
use super::{ExpenseRecord, PolicyId, TableError};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Debug)]
pub(crate) struct ParsedTable {
    pub(crate) records: Vec<ExpenseRecord>,
    pub(crate) attribute_columns: Vec<String>,
}

pub(crate) fn parse_table<R: Read>(reader: R) -> Result<ParsedTable, TableError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let layout = HeaderLayout::resolve(&headers)?;
    let mut records = Vec::new();

    for (offset, row) in csv_reader.records().enumerate() {
        let row = row?;
        let line = row
            .position()
            .map(|position| position.line())
            .unwrap_or(offset as u64 + 2);
        records.push(layout.record(&row, line)?);
    }

    Ok(ParsedTable {
        records,
        attribute_columns: layout
            .attributes
            .into_iter()
            .map(|(name, _)| name)
            .collect(),
    })
}

#[derive(Debug, Default)]
struct HeaderLayout {
    policy_id: Option<usize>,
    year: Option<usize>,
    amount: Option<usize>,
    birth_year: Option<usize>,
    drug: Option<usize>,
    procedure: Option<usize>,
    diagnosis: Option<usize>,
    attributes: Vec<(String, usize)>,
}

impl HeaderLayout {
    fn resolve(headers: &StringRecord) -> Result<Self, TableError> {
        let mut layout = Self::default();

        for (index, header) in headers.iter().enumerate() {
            let column = Column::parse(header);
            let slot = match column.kind() {
                ColumnKind::PolicyId => &mut layout.policy_id,
                ColumnKind::Year => &mut layout.year,
                ColumnKind::Amount => &mut layout.amount,
                ColumnKind::BirthYear => &mut layout.birth_year,
                ColumnKind::Drug => &mut layout.drug,
                ColumnKind::Procedure => &mut layout.procedure,
                ColumnKind::Diagnosis => &mut layout.diagnosis,
                ColumnKind::Attribute(_) => {
                    let name = column.name().to_string();
                    if name.is_empty() {
                        continue;
                    }
                    if layout
                        .attributes
                        .iter()
                        .any(|(existing, _)| Column::parse(existing) == column)
                    {
                        return Err(TableError::DuplicateColumn { column: name });
                    }
                    layout.attributes.push((name, index));
                    continue;
                }
            };

            if slot.replace(index).is_some() {
                return Err(TableError::DuplicateColumn {
                    column: header.to_string(),
                });
            }
        }

        for (slot, name) in [
            (layout.policy_id, "PolicyId"),
            (layout.year, "Year"),
            (layout.amount, "Amount"),
            (layout.birth_year, "BirthYear"),
        ] {
            if slot.is_none() {
                return Err(TableError::MissingColumn(name));
            }
        }

        Ok(layout)
    }

    fn record(&self, row: &StringRecord, line: u64) -> Result<ExpenseRecord, TableError> {
        let policy_id = required(row, self.policy_id, line, "PolicyId")?;
        let year = parse_integer(required(row, self.year, line, "Year")?, line, "Year")?;
        let amount = parse_amount(required(row, self.amount, line, "Amount")?, line)?;
        let birth_year = parse_integer(
            required(row, self.birth_year, line, "BirthYear")?,
            line,
            "BirthYear",
        )?;

        let attributes: BTreeMap<String, Option<String>> = self
            .attributes
            .iter()
            .map(|(name, index)| (name.clone(), optional(row, Some(*index))))
            .collect();

        Ok(ExpenseRecord {
            policy_id: PolicyId::new(policy_id),
            year,
            amount,
            birth_year,
            drug: optional(row, self.drug),
            procedure: optional(row, self.procedure),
            diagnosis: optional(row, self.diagnosis),
            attributes,
        })
    }
}

fn cell(row: &StringRecord, index: Option<usize>) -> Option<&str> {
    let value = row.get(index?)?.trim();
    if is_null(value) {
        None
    } else {
        Some(value)
    }
}

fn optional(row: &StringRecord, index: Option<usize>) -> Option<String> {
    cell(row, index).map(str::to_string)
}

fn required<'r>(
    row: &'r StringRecord,
    index: Option<usize>,
    line: u64,
    column: &'static str,
) -> Result<&'r str, TableError> {
    cell(row, index).ok_or(TableError::MissingValue { line, column })
}

fn is_null(value: &str) -> bool {
    value.is_empty()
        || value.eq_ignore_ascii_case("na")
        || value.eq_ignore_ascii_case("nan")
        || value.eq_ignore_ascii_case("null")
}

/// Accepts `2021` as well as float-formatted `2021.0` exports.
fn parse_integer(value: &str, line: u64, column: &'static str) -> Result<i32, TableError> {
    if let Ok(parsed) = value.parse::<i32>() {
        return Ok(parsed);
    }

    match value.parse::<f64>() {
        Ok(parsed)
            if parsed.fract() == 0.0
                && parsed >= f64::from(i32::MIN)
                && parsed <= f64::from(i32::MAX) =>
        {
            Ok(parsed as i32)
        }
        _ => Err(TableError::InvalidValue {
            line,
            column,
            value: value.to_string(),
        }),
    }
}

fn parse_amount(value: &str, line: u64) -> Result<f64, TableError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| TableError::InvalidValue {
            line,
            column: "Amount",
            value: value.to_string(),
        })
}

use super::{ensure_groupable, format_amount, ReportError};
use crate::table::{Column, ExpenseTable, GroupValue, PolicyId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownSeries {
    pub value: GroupValue,
    /// Summed amounts aligned with [`PatientYearlyBreakdown::years`]; missing cells are 0.
    pub amounts: Vec<f64>,
}

impl BreakdownSeries {
    pub fn label(&self) -> String {
        self.value.to_string()
    }
}

/// A patient's yearly expenses pivoted by one categorical column: one series per
/// distinct value, one slot per year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientYearlyBreakdown {
    pub policy_id: PolicyId,
    pub birth_year: i32,
    pub column: String,
    pub years: Vec<i32>,
    pub series: Vec<BreakdownSeries>,
}

impl PatientYearlyBreakdown {
    pub fn year_totals(&self) -> Vec<f64> {
        self.years
            .iter()
            .enumerate()
            .map(|(slot, _)| self.series.iter().map(|series| series.amounts[slot]).sum())
            .collect()
    }

    pub fn max_year_total(&self) -> f64 {
        self.year_totals().into_iter().fold(0.0, f64::max)
    }

    pub fn title(&self) -> String {
        format!(
            "Jährliche Ausgaben für Versnr {} (geb. {}) nach {}",
            self.policy_id, self.birth_year, self.column
        )
    }

    pub fn legend_title(&self) -> String {
        format!("{} Code", self.column)
    }

    /// One row per series, one amount column per year.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![self.column.clone()];
        header.extend(self.years.iter().map(ToString::to_string));
        csv_writer.write_record(&header)?;

        for series in &self.series {
            let mut fields = vec![series.label()];
            fields.extend(series.amounts.iter().copied().map(format_amount));
            csv_writer.write_record(&fields)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

pub fn patient_yearly_breakdown(
    table: &ExpenseTable,
    policy_id: &PolicyId,
    column: &Column,
) -> Result<PatientYearlyBreakdown, ReportError> {
    ensure_groupable(table, column)?;

    let mut rows = table.rows_for(policy_id).peekable();
    let birth_year = match rows.peek() {
        Some((_, record)) => record.birth_year,
        None => return Err(ReportError::UnknownPolicy(policy_id.clone())),
    };

    let mut cells: BTreeMap<(GroupValue, i32), f64> = BTreeMap::new();
    let mut years = BTreeSet::new();
    for (_, record) in rows {
        let Some(value) = record.group_value(column) else {
            continue;
        };
        years.insert(record.year);
        *cells.entry((value, record.year)).or_insert(0.0) += record.amount;
    }

    let years: Vec<i32> = years.into_iter().collect();
    let mut series: Vec<BreakdownSeries> = Vec::new();
    for ((value, year), amount) in cells {
        let Ok(slot) = years.binary_search(&year) else {
            continue;
        };
        match series.last_mut() {
            Some(current) if current.value == value => current.amounts[slot] += amount,
            _ => {
                let mut amounts = vec![0.0; years.len()];
                amounts[slot] = amount;
                series.push(BreakdownSeries { value, amounts });
            }
        }
    }

    debug!(
        policy = %policy_id,
        column = %column,
        years = years.len(),
        series = series.len(),
        "built patient yearly breakdown"
    );

    Ok(PatientYearlyBreakdown {
        policy_id: policy_id.clone(),
        birth_year,
        column: column.name().to_string(),
        years,
        series,
    })
}

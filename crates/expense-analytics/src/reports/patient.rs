use super::format_amount;
use crate::table::{ExpenseRecord, ExpenseTable, PolicyId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use tracing::debug;

/// One of the patient's expense rows with the per-year running figures attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientExpenseRow {
    /// Position of the row in the source table.
    #[serde(rename = "index")]
    pub row_index: usize,
    #[serde(flatten)]
    pub record: ExpenseRecord,
    #[serde(rename = "YearlyTotal")]
    pub yearly_total: f64,
    #[serde(rename = "CumulativeTotal")]
    pub cumulative_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientExpenses {
    pub policy_id: PolicyId,
    pub rows: Vec<PatientExpenseRow>,
}

impl PatientExpenses {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn yearly_totals(&self) -> BTreeMap<i32, f64> {
        self.rows
            .iter()
            .map(|row| (row.record.year, row.yearly_total))
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let attribute_names: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|row| row.record.attributes.keys().map(String::as_str))
            .collect();

        let mut csv_writer = csv::Writer::from_writer(writer);
        let mut header = vec![
            "index",
            "PolicyId",
            "Year",
            "Amount",
            "BirthYear",
            "Drug",
            "Procedure",
            "Diagnosis",
        ];
        header.extend(attribute_names.iter().copied());
        header.extend(["YearlyTotal", "CumulativeTotal"]);
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let record = &row.record;
            let mut fields = vec![
                row.row_index.to_string(),
                record.policy_id.to_string(),
                record.year.to_string(),
                format_amount(record.amount),
                record.birth_year.to_string(),
                record.drug.clone().unwrap_or_default(),
                record.procedure.clone().unwrap_or_default(),
                record.diagnosis.clone().unwrap_or_default(),
            ];
            fields.extend(attribute_names.iter().map(|name| {
                record
                    .attributes
                    .get(*name)
                    .cloned()
                    .flatten()
                    .unwrap_or_default()
            }));
            fields.push(format_amount(row.yearly_total));
            fields.push(format_amount(row.cumulative_total));
            csv_writer.write_record(&fields)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Selects the policy's rows and attaches the yearly total and the running total
/// within each year. Rows keep their source order, so the running total follows it.
pub fn filter_patient_data(table: &ExpenseTable, policy_id: &PolicyId) -> PatientExpenses {
    let matching: Vec<(usize, &ExpenseRecord)> = table.rows_for(policy_id).collect();

    let mut yearly_totals: HashMap<i32, f64> = HashMap::new();
    for (_, record) in &matching {
        *yearly_totals.entry(record.year).or_insert(0.0) += record.amount;
    }

    let mut running: HashMap<i32, f64> = HashMap::new();
    let rows = matching
        .into_iter()
        .map(|(row_index, record)| {
            let cumulative = running.entry(record.year).or_insert(0.0);
            *cumulative += record.amount;

            PatientExpenseRow {
                row_index,
                record: record.clone(),
                yearly_total: yearly_totals
                    .get(&record.year)
                    .copied()
                    .unwrap_or_default(),
                cumulative_total: *cumulative,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        policy = %policy_id,
        rows = rows.len(),
        years = yearly_totals.len(),
        "filtered patient expenses"
    );

    PatientExpenses {
        policy_id: policy_id.clone(),
        rows,
    }
}

mod breakdown;
mod category;
mod patient;

pub use breakdown::{patient_yearly_breakdown, BreakdownSeries, PatientYearlyBreakdown};
pub use category::{
    aggregate_costs, cost_per_diagnosis, cost_per_drug, cost_per_procedure, CategoryAggregate,
    CategoryKind, CategoryReport, SortOrder,
};
pub use patient::{filter_patient_data, PatientExpenseRow, PatientExpenses};

use crate::table::{Column, ExpenseTable, PolicyId};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("no expense rows found for policy {0}")]
    UnknownPolicy(PolicyId),
    #[error("expense table has no column named {0}")]
    UnknownColumn(String),
    #[error("column {0} is numeric and cannot be used as a grouping key")]
    NonCategoricalColumn(String),
    #[error("at least one grouping column is required")]
    NoGroupingColumns,
    #[error("policy {policy_id} has no {column} values to plot")]
    NoValues { policy_id: PolicyId, column: String },
}

pub(crate) fn ensure_groupable(table: &ExpenseTable, column: &Column) -> Result<(), ReportError> {
    if !column.is_categorical() {
        return Err(ReportError::NonCategoricalColumn(column.name().to_string()));
    }
    if !table.has_column(column) {
        return Err(ReportError::UnknownColumn(column.name().to_string()));
    }
    Ok(())
}

pub(crate) fn format_amount(value: f64) -> String {
    format!("{value}")
}

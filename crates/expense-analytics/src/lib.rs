//! Cost aggregation and per-patient expense reporting over tables of insured
//! subscribers' healthcare expenditures.

pub mod chart;
pub mod config;
pub mod error;
pub mod reports;
pub mod table;
pub mod telemetry;

pub use chart::{plot_patient_expenses_by, ChartOptions};
pub use reports::{
    cost_per_diagnosis, cost_per_drug, cost_per_procedure, filter_patient_data,
    patient_yearly_breakdown,
};
pub use table::{Column, ColumnKind, ExpenseRecord, ExpenseTable, PolicyId};

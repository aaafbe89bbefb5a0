use chrono::{Local, NaiveDate};
use clap::ValueEnum;
use expense_analytics::table::{Column, PolicyId};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Aligned plain-text table
    #[default]
    Table,
    /// Pretty-printed JSON document
    Json,
    /// Comma-separated values with a header row
    Csv,
}

/// JSON envelope shared by every command that prints data.
#[derive(Debug, Serialize)]
pub(crate) struct Response<T: Serialize> {
    pub(crate) generated_on: NaiveDate,
    pub(crate) source: String,
    pub(crate) data: T,
}

impl<T: Serialize> Response<T> {
    pub(crate) fn new(source: String, data: T) -> Self {
        Self {
            generated_on: Local::now().date_naive(),
            source,
            data,
        }
    }

    pub(crate) fn write<W: Write>(&self, mut writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer).map_err(serde_json::Error::io)
    }
}

pub(crate) fn parse_policy(raw: &str) -> Result<PolicyId, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("policy identifier must not be empty".to_string());
    }
    Ok(PolicyId::new(trimmed))
}

pub(crate) fn parse_column(raw: &str) -> Result<Column, String> {
    if raw.trim().is_empty() {
        return Err("column name must not be empty".to_string());
    }
    Ok(Column::parse(raw))
}

pub(crate) fn parse_dimension(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(format!("'{raw}' is not a positive pixel count")),
    }
}

/// Formats a float the way the report tables show money: two decimals.
pub(crate) fn money(value: f64) -> String {
    format!("{value:.2}")
}

use crate::infra::{money, parse_column, parse_dimension, parse_policy, OutputFormat, Response};
use clap::Args;
use expense_analytics::chart::{write_patient_expenses_chart, ChartOptions};
use expense_analytics::config::AppConfig;
use expense_analytics::error::AppError;
use expense_analytics::reports::{
    aggregate_costs, filter_patient_data, patient_yearly_breakdown, CategoryKind, CategoryReport,
    PatientExpenses, PatientYearlyBreakdown, SortOrder,
};
use expense_analytics::table::{Column, ExpenseTable, PolicyId};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct SourceArgs {
    /// Expense CSV export (PolicyId/Versnr, Year/Jahr, Amount/Ausgaben, BirthYear/Gebjahr, ...)
    #[arg(long)]
    pub(crate) data: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct PatientArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    /// Policy identifier of the patient
    #[arg(long, value_parser = parse_policy)]
    pub(crate) policy: PolicyId,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
}

#[derive(Args, Debug)]
pub(crate) struct BreakdownArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    /// Policy identifier of the patient
    #[arg(long, value_parser = parse_policy)]
    pub(crate) policy: PolicyId,
    /// Categorical column that splits each year's expenses
    #[arg(long, value_parser = parse_column)]
    pub(crate) by: Column,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
}

#[derive(Args, Debug)]
pub(crate) struct PlotArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    /// Policy identifier of the patient
    #[arg(long, value_parser = parse_policy)]
    pub(crate) policy: PolicyId,
    /// Categorical column that becomes the stacked segments
    #[arg(long, value_parser = parse_column)]
    pub(crate) by: Column,
    /// Destination SVG file
    #[arg(long)]
    pub(crate) output: PathBuf,
    /// Chart width in pixels (defaults to EXPENSES_CHART_WIDTH)
    #[arg(long, value_parser = parse_dimension)]
    pub(crate) width: Option<u32>,
    /// Chart height in pixels (defaults to EXPENSES_CHART_HEIGHT)
    #[arg(long, value_parser = parse_dimension)]
    pub(crate) height: Option<u32>,
}

#[derive(Args, Debug)]
pub(crate) struct CategoryArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    /// Grouping column; repeat for multi-column keys (e.g. --by Jahr --by Medikament)
    #[arg(long = "by", required = true, value_parser = parse_column)]
    pub(crate) group_by: Vec<Column>,
    /// Sort groups by ascending total cost (default is descending)
    #[arg(long)]
    pub(crate) ascending: bool,
    /// Only print the first N groups
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
}

fn load_table(source: &SourceArgs) -> Result<ExpenseTable, AppError> {
    let table = ExpenseTable::from_path(&source.data)?;
    info!(
        path = %source.data.display(),
        rows = table.len(),
        "expense table loaded"
    );
    Ok(table)
}

fn source_label(source: &SourceArgs) -> String {
    source.data.display().to_string()
}

pub(crate) fn run_patient(args: PatientArgs) -> Result<(), AppError> {
    let table = load_table(&args.source)?;
    let expenses = filter_patient_data(&table, &args.policy);
    if expenses.is_empty() {
        info!(policy = %args.policy, "no expense rows for policy");
    }

    let stdout = io::stdout();
    write_patient(
        &mut stdout.lock(),
        &expenses,
        args.format,
        &source_label(&args.source),
    )
}

pub(crate) fn run_breakdown(args: BreakdownArgs) -> Result<(), AppError> {
    let table = load_table(&args.source)?;
    let breakdown = patient_yearly_breakdown(&table, &args.policy, &args.by)?;

    let stdout = io::stdout();
    write_breakdown(
        &mut stdout.lock(),
        &breakdown,
        args.format,
        &source_label(&args.source),
    )
}

pub(crate) fn run_plot(args: PlotArgs, config: &AppConfig) -> Result<(), AppError> {
    let table = load_table(&args.source)?;
    let mut options = ChartOptions::from(&config.chart);
    if let Some(width) = args.width {
        options.width = width;
    }
    if let Some(height) = args.height {
        options.height = height;
    }

    write_patient_expenses_chart(&table, &args.policy, &args.by, options, &args.output)?;
    info!(
        policy = %args.policy,
        column = %args.by,
        output = %args.output.display(),
        "chart written"
    );
    println!("Chart written to {}", args.output.display());
    Ok(())
}

pub(crate) fn run_category_report(kind: CategoryKind, args: CategoryArgs) -> Result<(), AppError> {
    let table = load_table(&args.source)?;
    let mut report = aggregate_costs(
        &table,
        kind,
        &args.group_by,
        SortOrder::from_ascending(args.ascending),
    )?;
    if let Some(limit) = args.limit {
        report.truncate(limit);
    }
    info!(kind = kind.label(), groups = report.rows.len(), "category report built");

    let stdout = io::stdout();
    write_category_report(
        &mut stdout.lock(),
        &report,
        args.format,
        &source_label(&args.source),
    )
}

fn write_patient<W: Write>(
    out: &mut W,
    expenses: &PatientExpenses,
    format: OutputFormat,
    source: &str,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Table => render_patient_expenses(out, expenses)?,
        OutputFormat::Json => Response::new(source.to_string(), expenses).write(out)?,
        OutputFormat::Csv => expenses.write_csv(out)?,
    }
    Ok(())
}

fn write_breakdown<W: Write>(
    out: &mut W,
    breakdown: &PatientYearlyBreakdown,
    format: OutputFormat,
    source: &str,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Table => render_breakdown(out, breakdown)?,
        OutputFormat::Json => Response::new(source.to_string(), breakdown).write(out)?,
        OutputFormat::Csv => breakdown.write_csv(out)?,
    }
    Ok(())
}

fn write_category_report<W: Write>(
    out: &mut W,
    report: &CategoryReport,
    format: OutputFormat,
    source: &str,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Table => render_category_report(out, report)?,
        OutputFormat::Json => Response::new(source.to_string(), report.records()).write(out)?,
        OutputFormat::Csv => report.write_csv(out)?,
    }
    Ok(())
}

fn render_patient_expenses<W: Write>(out: &mut W, expenses: &PatientExpenses) -> io::Result<()> {
    writeln!(out, "Expense rows for policy {}", expenses.policy_id)?;
    if expenses.is_empty() {
        writeln!(out, "- no rows found")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:>6}  {:>4}  {:>12}  {:<10} {:<10} {:<10} {:>14}  {:>14}",
        "index", "Year", "Amount", "Drug", "Procedure", "Diagnosis", "YearlyTotal", "Cumulative"
    )?;
    for row in &expenses.rows {
        let record = &row.record;
        writeln!(
            out,
            "{:>6}  {:>4}  {:>12}  {:<10} {:<10} {:<10} {:>14}  {:>14}",
            row.row_index,
            record.year,
            money(record.amount),
            record.drug.as_deref().unwrap_or("-"),
            record.procedure.as_deref().unwrap_or("-"),
            record.diagnosis.as_deref().unwrap_or("-"),
            money(row.yearly_total),
            money(row.cumulative_total),
        )?;
    }

    writeln!(out, "Yearly totals:")?;
    for (year, total) in expenses.yearly_totals() {
        writeln!(out, "  - {year}: {}", money(total))?;
    }
    Ok(())
}

fn render_breakdown<W: Write>(out: &mut W, breakdown: &PatientYearlyBreakdown) -> io::Result<()> {
    writeln!(out, "{}", breakdown.title())?;
    if breakdown.series.is_empty() {
        writeln!(out, "- no {} values recorded", breakdown.column)?;
        return Ok(());
    }

    write!(out, "{:<16}", breakdown.legend_title())?;
    for year in &breakdown.years {
        write!(out, " {:>12}", year)?;
    }
    writeln!(out)?;

    for series in &breakdown.series {
        write!(out, "{:<16}", series.label())?;
        for amount in &series.amounts {
            write!(out, " {:>12}", money(*amount))?;
        }
        writeln!(out)?;
    }

    write!(out, "{:<16}", "Total")?;
    for total in breakdown.year_totals() {
        write!(out, " {:>12}", money(total))?;
    }
    writeln!(out)
}

fn render_category_report<W: Write>(out: &mut W, report: &CategoryReport) -> io::Result<()> {
    writeln!(
        out,
        "Kosten pro {} (gruppiert nach {})",
        report.kind.label(),
        report.group_by.join(", ")
    )?;
    if report.rows.is_empty() {
        writeln!(out, "- no groups")?;
        return Ok(());
    }

    for row in &report.rows {
        let key: Vec<String> = row.key.iter().map(ToString::to_string).collect();
        writeln!(out, "- {}", key.join(" / "))?;
        writeln!(
            out,
            "  Gesamtkosten {} | {} {} | Anzahl_Versicherte {}",
            money(row.total_cost),
            report.kind.count_header(),
            row.item_count,
            row.subscriber_count
        )?;
        writeln!(
            out,
            "  Durchschnitt pro {} {} | pro Versicherten {}",
            report.kind.label(),
            row.average_cost_per_item
                .map(money)
                .unwrap_or_else(|| "n/a".to_string()),
            row.average_cost_per_subscriber
                .map(money)
                .unwrap_or_else(|| "n/a".to_string()),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use expense_analytics::table::ExpenseRecord;
    use serde_json::Value;

    fn table() -> ExpenseTable {
        ExpenseTable::from_records(vec![
            ExpenseRecord::new("1", 2020, 10.0, 1950).with_drug("A"),
            ExpenseRecord::new("1", 2020, 5.5, 1950).with_drug("B"),
            ExpenseRecord::new("1", 2021, 3.0, 1950)
                .with_drug("A")
                .with_diagnosis("I10"),
            ExpenseRecord::new("2", 2021, 99.0, 1980).with_drug("C"),
        ])
    }

    fn rendered<F>(write: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), AppError>,
    {
        let mut buffer = Vec::new();
        write(&mut buffer).expect("output written");
        String::from_utf8(buffer).expect("utf-8 output")
    }

    fn words(line: &str) -> Vec<&str> {
        line.split_whitespace().collect()
    }

    fn json(text: &str) -> Value {
        serde_json::from_str(text).expect("valid json")
    }

    #[test]
    fn patient_table_lists_rows_and_yearly_totals() {
        let expenses = filter_patient_data(&table(), &PolicyId::from("1"));
        let text = rendered(|out| write_patient(out, &expenses, OutputFormat::Table, "x.csv"));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Expense rows for policy 1");
        assert_eq!(
            words(lines[2]),
            ["0", "2020", "10.00", "A", "-", "-", "15.50", "10.00"]
        );
        assert_eq!(
            words(lines[3]),
            ["1", "2020", "5.50", "B", "-", "-", "15.50", "15.50"]
        );
        assert_eq!(
            words(lines[4]),
            ["2", "2021", "3.00", "A", "-", "I10", "3.00", "3.00"]
        );
        assert_eq!(lines[5], "Yearly totals:");
        assert_eq!(lines[6], "  - 2020: 15.50");
        assert_eq!(lines[7], "  - 2021: 3.00");
    }

    #[test]
    fn patient_table_without_rows_says_so() {
        let expenses = filter_patient_data(&table(), &PolicyId::from("404"));
        let text = rendered(|out| write_patient(out, &expenses, OutputFormat::Table, "x.csv"));
        assert_eq!(text, "Expense rows for policy 404\n- no rows found\n");
    }

    #[test]
    fn patient_json_and_csv_carry_running_totals() {
        let expenses = filter_patient_data(&table(), &PolicyId::from("1"));

        let document = json(&rendered(|out| {
            write_patient(out, &expenses, OutputFormat::Json, "expenses.csv")
        }));
        assert_eq!(document["source"], "expenses.csv");
        assert_eq!(document["data"]["policy_id"], "1");
        let rows = document["data"]["rows"].as_array().expect("rows array");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["Drug"], "B");
        assert_eq!(rows[1]["YearlyTotal"], 15.5);
        assert_eq!(rows[1]["CumulativeTotal"], 15.5);
        assert!(rows[0]["Diagnosis"].is_null());

        let text = rendered(|out| write_patient(out, &expenses, OutputFormat::Csv, "x.csv"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "index,PolicyId,Year,Amount,BirthYear,Drug,Procedure,Diagnosis,YearlyTotal,CumulativeTotal"
        );
        assert_eq!(lines[1], "0,1,2020,10,1950,A,,,15.5,10");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn breakdown_table_pivots_years_into_columns() {
        let breakdown =
            patient_yearly_breakdown(&table(), &PolicyId::from("1"), &Column::parse("Medikament"))
                .expect("breakdown builds");
        let text = rendered(|out| write_breakdown(out, &breakdown, OutputFormat::Table, "x.csv"));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Jährliche Ausgaben für Versnr 1 (geb. 1950) nach Medikament"
        );
        assert_eq!(words(lines[1]), ["Medikament", "Code", "2020", "2021"]);
        assert_eq!(words(lines[2]), ["A", "10.00", "3.00"]);
        assert_eq!(words(lines[3]), ["B", "5.50", "0.00"]);
        assert_eq!(words(lines[4]), ["Total", "15.50", "3.00"]);
    }

    #[test]
    fn breakdown_table_without_values_says_so() {
        let breakdown =
            patient_yearly_breakdown(&table(), &PolicyId::from("1"), &Column::parse("Eingriff"))
                .expect("breakdown builds");
        let text = rendered(|out| write_breakdown(out, &breakdown, OutputFormat::Table, "x.csv"));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "- no Eingriff values recorded");
    }

    #[test]
    fn breakdown_json_and_csv_share_the_pivot() {
        let breakdown =
            patient_yearly_breakdown(&table(), &PolicyId::from("1"), &Column::parse("Medikament"))
                .expect("breakdown builds");

        let document = json(&rendered(|out| {
            write_breakdown(out, &breakdown, OutputFormat::Json, "expenses.csv")
        }));
        assert_eq!(document["data"]["column"], "Medikament");
        assert_eq!(document["data"]["years"], serde_json::json!([2020, 2021]));
        assert_eq!(document["data"]["series"][0]["value"], "A");
        assert_eq!(
            document["data"]["series"][0]["amounts"],
            serde_json::json!([10.0, 3.0])
        );

        let text = rendered(|out| write_breakdown(out, &breakdown, OutputFormat::Csv, "x.csv"));
        assert_eq!(text, "Medikament,2020,2021\nA,10,3\nB,5.5,0\n");
    }

    #[test]
    fn category_table_prints_missing_item_average_as_na() {
        let report = aggregate_costs(
            &table(),
            CategoryKind::Diagnosis,
            &[Column::parse("Jahr")],
            SortOrder::Descending,
        )
        .expect("report builds");
        let text =
            rendered(|out| write_category_report(out, &report, OutputFormat::Table, "x.csv"));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Kosten pro Diagnose (gruppiert nach Jahr)");
        assert_eq!(lines[1], "- 2021");
        assert_eq!(
            lines[2],
            "  Gesamtkosten 102.00 | Anzahl_Diagnosen 1 | Anzahl_Versicherte 2"
        );
        assert_eq!(
            lines[3],
            "  Durchschnitt pro Diagnose 102.00 | pro Versicherten 51.00"
        );
        assert_eq!(lines[4], "- 2020");
        assert_eq!(
            lines[5],
            "  Gesamtkosten 15.50 | Anzahl_Diagnosen 0 | Anzahl_Versicherte 1"
        );
        assert_eq!(
            lines[6],
            "  Durchschnitt pro Diagnose n/a | pro Versicherten 15.50"
        );
    }

    #[test]
    fn category_table_without_groups_says_so() {
        let report = aggregate_costs(
            &table(),
            CategoryKind::Procedure,
            &[Column::parse("Eingriff")],
            SortOrder::Descending,
        )
        .expect("report builds");
        let text =
            rendered(|out| write_category_report(out, &report, OutputFormat::Table, "x.csv"));
        assert_eq!(
            text,
            "Kosten pro Eingriff (gruppiert nach Eingriff)\n- no groups\n"
        );
    }

    #[test]
    fn category_json_and_csv_leave_missing_average_empty() {
        let report = aggregate_costs(
            &table(),
            CategoryKind::Diagnosis,
            &[Column::parse("Jahr")],
            SortOrder::Ascending,
        )
        .expect("report builds");

        let document = json(&rendered(|out| {
            write_category_report(out, &report, OutputFormat::Json, "expenses.csv")
        }));
        let first = &document["data"][0];
        assert_eq!(first["Jahr"], 2020);
        assert_eq!(first["Gesamtkosten"], 15.5);
        assert!(first["Durchschnittliche_Kosten_pro_Diagnose"].is_null());

        let text =
            rendered(|out| write_category_report(out, &report, OutputFormat::Csv, "x.csv"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Jahr,Gesamtkosten,Anzahl_Diagnosen,Anzahl_Versicherte,\
             Durchschnittliche_Kosten_pro_Diagnose,Durchschnittliche_Kosten_pro_Versicherten"
        );
        assert_eq!(lines[1], "2020,15.5,0,1,,15.5");
        assert_eq!(lines[2], "2021,102,1,2,102,51");
    }
}

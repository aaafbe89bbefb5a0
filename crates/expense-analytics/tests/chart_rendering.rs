use expense_analytics::chart::{
    plot_patient_expenses_by, render_stacked_bars, write_patient_expenses_chart, ChartError,
    ChartOptions,
};
use expense_analytics::reports::{patient_yearly_breakdown, ReportError};
use expense_analytics::table::{Column, ExpenseTable, PolicyId};

fn fixture() -> ExpenseTable {
    let data = include_bytes!("data/expenses.csv");
    ExpenseTable::from_reader(&data[..]).expect("fixture parses")
}

#[test]
fn chart_covers_every_series_of_the_breakdown() {
    let table = fixture();
    let policy = PolicyId::from("1002");
    let column = Column::parse("Diagnose");

    let svg = plot_patient_expenses_by(&table, &policy, &column, ChartOptions::default())
        .expect("chart renders");

    assert!(svg.contains("Versnr 1002 (geb. 1962)"));
    assert!(svg.contains("nach Diagnose"));
    assert!(svg.contains("Diagnose Code"));
    for code in ["E11.9", "I10", "K21.0"] {
        assert!(svg.contains(code), "legend lists {code}");
    }
}

#[test]
fn chart_size_follows_options() {
    let table = fixture();
    let breakdown = patient_yearly_breakdown(&table, &PolicyId::from("1003"), &Column::DRUG)
        .expect("breakdown builds");

    let svg = render_stacked_bars(
        &breakdown,
        ChartOptions {
            width: 640,
            height: 320,
        },
    )
    .expect("chart renders");

    assert!(svg.contains("width=\"640\""));
    assert!(svg.contains("height=\"320\""));
}

#[test]
fn chart_is_written_to_disk() {
    let table = fixture();
    let path = std::env::temp_dir().join(format!(
        "expense-analytics-chart-{}.svg",
        std::process::id()
    ));

    write_patient_expenses_chart(
        &table,
        &PolicyId::from("1001"),
        &Column::PROCEDURE,
        ChartOptions::default(),
        &path,
    )
    .expect("chart is written");

    let contents = std::fs::read_to_string(&path).expect("chart file readable");
    std::fs::remove_file(&path).ok();
    assert!(contents.contains("5-820"));
}

#[test]
fn chart_for_unknown_policy_fails() {
    let table = fixture();
    let err = plot_patient_expenses_by(
        &table,
        &PolicyId::from("0"),
        &Column::DRUG,
        ChartOptions::default(),
    )
    .expect_err("policy has no rows");

    assert!(matches!(
        err,
        ChartError::Report(ReportError::UnknownPolicy(_))
    ));
    assert_eq!(err.to_string(), "no expense rows found for policy 0");
}

#[test]
fn chart_for_policy_without_codes_in_the_column_fails() {
    let table = fixture();
    let err = plot_patient_expenses_by(
        &table,
        &PolicyId::from("1003"),
        &Column::parse("Eingriff"),
        ChartOptions::default(),
    )
    .expect_err("policy 1003 has no procedures");

    assert!(matches!(
        err,
        ChartError::Report(ReportError::NoValues { .. })
    ));
    assert_eq!(
        err.to_string(),
        "policy 1003 has no Eingriff values to plot"
    );
}

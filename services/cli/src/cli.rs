use crate::commands::{
    run_breakdown, run_category_report, run_patient, run_plot, BreakdownArgs, CategoryArgs,
    PatientArgs, PlotArgs,
};
use clap::{Parser, Subcommand};
use expense_analytics::config::AppConfig;
use expense_analytics::error::AppError;
use expense_analytics::reports::CategoryKind;
use expense_analytics::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "expense-report",
    about = "Summarise insured patients' healthcare expenditures from a CSV export",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one patient's expense rows with yearly and cumulative totals
    Patient(PatientArgs),
    /// Pivot one patient's yearly expenses by a categorical column
    Breakdown(BreakdownArgs),
    /// Render one patient's yearly expenses as a stacked bar chart (SVG)
    Plot(PlotArgs),
    /// Aggregate costs per drug, procedure or diagnosis
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// Costs, prescriptions and subscribers per drug group
    Drug(CategoryArgs),
    /// Costs, procedures and subscribers per procedure group
    Procedure(CategoryArgs),
    /// Costs, diagnoses and subscribers per diagnosis group
    Diagnosis(CategoryArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    dispatch(cli.command, &config)
}

fn dispatch(command: Command, config: &AppConfig) -> Result<(), AppError> {
    match command {
        Command::Patient(args) => run_patient(args),
        Command::Breakdown(args) => run_breakdown(args),
        Command::Plot(args) => run_plot(args, config),
        Command::Report { command } => match command {
            ReportCommand::Drug(args) => run_category_report(CategoryKind::Drug, args),
            ReportCommand::Procedure(args) => run_category_report(CategoryKind::Procedure, args),
            ReportCommand::Diagnosis(args) => run_category_report(CategoryKind::Diagnosis, args),
        },
    }
}

mod cli;
mod commands;
mod infra;

use expense_analytics::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}

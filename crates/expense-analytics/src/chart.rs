use crate::config::ChartConfig;
use crate::reports::{patient_yearly_breakdown, PatientYearlyBreakdown, ReportError};
use crate::table::{Column, ExpenseTable, PolicyId};
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

const X_AXIS_LABEL: &str = "Jahr";
const Y_AXIS_LABEL: &str = "Ausgaben (aufsummiert)";
const FONT: &str = "sans-serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

impl From<&ChartConfig> for ChartOptions {
    fn from(config: &ChartConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to render chart: {0}")]
    Render(String),
    #[error("failed to write chart to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChartError {
    fn render<E: std::error::Error>(err: E) -> Self {
        Self::Render(err.to_string())
    }
}

/// Renders the policy's yearly expenses as a stacked bar chart, one segment per
/// distinct value of `column`, and returns the SVG document.
pub fn plot_patient_expenses_by(
    table: &ExpenseTable,
    policy_id: &PolicyId,
    column: &Column,
    options: ChartOptions,
) -> Result<String, ChartError> {
    let breakdown = patient_yearly_breakdown(table, policy_id, column)?;
    render_stacked_bars(&breakdown, options)
}

pub fn write_patient_expenses_chart<P: AsRef<Path>>(
    table: &ExpenseTable,
    policy_id: &PolicyId,
    column: &Column,
    options: ChartOptions,
    path: P,
) -> Result<(), ChartError> {
    let svg = plot_patient_expenses_by(table, policy_id, column, options)?;
    let path = path.as_ref();
    std::fs::write(path, svg).map_err(|source| ChartError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn render_stacked_bars(
    breakdown: &PatientYearlyBreakdown,
    options: ChartOptions,
) -> Result<String, ChartError> {
    let (Some(&first_year), Some(&last_year)) = (breakdown.years.first(), breakdown.years.last())
    else {
        return Err(no_values(breakdown));
    };
    if breakdown.series.is_empty() {
        return Err(no_values(breakdown));
    }
    let y_max = (breakdown.max_year_total() * 1.1).max(1.0);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(ChartError::render)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(breakdown.title(), (FONT, 22))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(80)
            .build_cartesian_2d((first_year..last_year + 1).into_segmented(), 0f64..y_max)
            .map_err(ChartError::render)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(X_AXIS_LABEL)
            .y_desc(Y_AXIS_LABEL)
            .x_labels((last_year - first_year + 2) as usize)
            .x_label_formatter(&format_year)
            .draw()
            .map_err(ChartError::render)?;

        // Legend heading drawn as an entry without a swatch.
        chart
            .draw_series(std::iter::once(EmptyElement::at((
                SegmentValue::Exact(first_year),
                0.0,
            ))))
            .map_err(ChartError::render)?
            .label(breakdown.legend_title())
            .legend(|(x, y)| EmptyElement::at((x, y)));

        let mut baseline = vec![0.0_f64; breakdown.years.len()];
        for (index, series) in breakdown.series.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();
            let mut bars = Vec::new();
            for ((year, amount), base) in breakdown
                .years
                .iter()
                .zip(&series.amounts)
                .zip(baseline.iter_mut())
            {
                let bottom = *base;
                *base += *amount;
                if *amount == 0.0 {
                    continue;
                }

                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(*year), bottom),
                        (SegmentValue::Exact(*year + 1), *base),
                    ],
                    color.filled(),
                );
                bar.set_margin(0, 0, 8, 8);
                bars.push(bar);
            }

            chart
                .draw_series(bars)
                .map_err(ChartError::render)?
                .label(series.label())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.85))
            .border_style(&BLACK)
            .label_font((FONT, 14))
            .draw()
            .map_err(ChartError::render)?;

        root.present().map_err(ChartError::render)?;
    }

    debug!(
        policy = %breakdown.policy_id,
        series = breakdown.series.len(),
        bytes = svg.len(),
        "rendered stacked bar chart"
    );

    Ok(svg)
}

fn no_values(breakdown: &PatientYearlyBreakdown) -> ChartError {
    ReportError::NoValues {
        policy_id: breakdown.policy_id.clone(),
        column: breakdown.column.clone(),
    }
    .into()
}

fn format_year(value: &SegmentValue<i32>) -> String {
    match value {
        SegmentValue::Exact(year) | SegmentValue::CenterOf(year) => year.to_string(),
        SegmentValue::Last => String::new(),
    }
}

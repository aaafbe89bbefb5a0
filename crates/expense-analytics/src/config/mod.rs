use std::env;
use std::fmt;

const DEFAULT_CHART_WIDTH: u32 = 1200;
const DEFAULT_CHART_HEIGHT: u32 = 600;

/// Distinguishes runtime behavior for different stages of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the reporting tool.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub chart: ChartConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("EXPENSES_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("EXPENSES_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let chart = ChartConfig {
            width: dimension("EXPENSES_CHART_WIDTH", DEFAULT_CHART_WIDTH)?,
            height: dimension("EXPENSES_CHART_HEIGHT", DEFAULT_CHART_HEIGHT)?,
        };

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            chart,
        })
    }
}

fn dimension(variable: &'static str, default: u32) -> Result<u32, ConfigError> {
    let Ok(raw) = env::var(variable) else {
        return Ok(default);
    };

    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidChartDimension {
            variable,
            value: raw,
        }),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Pixel size of rendered charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidChartDimension {
        variable: &'static str,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidChartDimension { variable, value } => write!(
                f,
                "{variable} must be a positive integer pixel count (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

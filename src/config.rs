//! Engine configuration
//!
//! Every numeric policy of the engine lives here instead of in global
//! constants, so tests can tighten or loosen the solver without touching code.
//! A config file is plain TOML; every key is optional.
//!
//! ```toml
//! valuation_date = "2024-12-31"
//!
//! [xirr]
//! max_rate = "1000"
//! max_iterations = 100000
//! ```

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Parameters of the bracket-and-bisect XIRR solver
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct XirrConfig {
    /// Distance of the minimum rate above -1
    pub min_rate_epsilon: Decimal,
    /// Rates above this saturate to it
    pub max_rate: Decimal,
    /// Bisection stops once the bracket is no wider than this
    pub tolerance: Decimal,
    /// Decimal places kept for each discounted cash flow and year fraction
    pub precision: u32,
    /// Decimal places kept for each bisection midpoint
    pub midpoint_precision: u32,
    /// Hard cap on bisection steps
    pub max_iterations: usize,
    pub days_per_year: Decimal,
}

impl Default for XirrConfig {
    fn default() -> Self {
        Self {
            min_rate_epsilon: Decimal::new(1, 6),
            max_rate: Decimal::from(1000),
            tolerance: Decimal::new(1, 6),
            precision: 8,
            midpoint_precision: 6,
            max_iterations: 100_000,
            days_per_year: Decimal::new(36525, 2),
        }
    }
}

impl XirrConfig {
    /// The lowest rate the solver reports: -1 + epsilon
    pub fn min_rate(&self) -> Decimal {
        Decimal::NEGATIVE_ONE + self.min_rate_epsilon
    }
}

/// Configuration threaded through aggregation, valuation and the solver
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub xirr: XirrConfig,
    /// Pins "now" for the terminal valuation flow and the final segment.
    /// Defaults to the local calendar date.
    pub valuation_date: Option<NaiveDate>,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        debug!("Loaded engine config from {:?}: {:?}", path, config);
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn with_valuation_date(mut self, date: NaiveDate) -> Self {
        self.valuation_date = Some(date);
        self
    }

    /// The date treated as "now", rounded to a whole day
    pub fn valuation_date(&self) -> NaiveDate {
        self.valuation_date
            .unwrap_or_else(|| Local::now().date_naive())
    }
}

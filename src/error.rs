//! Error handling for the analytics engine
//!
//! The engine itself reports typed [`AnalysisError`]s so callers can tell a
//! data problem apart from a solver failure. The collector and CLI layers wrap
//! them with anyhow for context chaining.

use chrono::NaiveDate;
use thiserror::Error;

/// Core error types for ledger analysis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Input data cannot be valued as given. Fixing the data is the only remedy.
    #[error("data integrity error: {message}{}", describe_location(.instrument, .custodian, .segment))]
    DataIntegrity {
        message: String,
        instrument: Option<String>,
        custodian: Option<String>,
        segment: Option<NaiveDate>,
    },

    /// The XIRR bisection did not converge within its iteration cap.
    #[error("numeric divergence: XIRR exceeded {iterations} iterations over {flows} cash flows{}", describe_location(&None, &None, .segment))]
    NumericDivergence {
        iterations: usize,
        flows: usize,
        segment: Option<NaiveDate>,
    },
}

impl AnalysisError {
    pub fn data_integrity(message: impl Into<String>) -> Self {
        AnalysisError::DataIntegrity {
            message: message.into(),
            instrument: None,
            custodian: None,
            segment: None,
        }
    }

    /// Missing reference price for an instrument held at a custodian
    pub fn price_not_found(instrument: &str, custodian: &str) -> Self {
        AnalysisError::DataIntegrity {
            message: "price not found".to_string(),
            instrument: Some(instrument.to_string()),
            custodian: Some(custodian.to_string()),
            segment: None,
        }
    }

    /// Attach the instrument/custodian of the position being valued, unless
    /// the error already names one.
    pub fn at_position(self, instrument: &str, custodian: &str) -> Self {
        match self {
            AnalysisError::DataIntegrity {
                message,
                instrument: None,
                custodian: None,
                segment,
            } => AnalysisError::DataIntegrity {
                message,
                instrument: Some(instrument.to_string()),
                custodian: Some(custodian.to_string()),
                segment,
            },
            other => other,
        }
    }

    /// Tag the error with the checkpoint boundary of the failing segment.
    pub fn in_segment(self, boundary: NaiveDate) -> Self {
        match self {
            AnalysisError::DataIntegrity {
                message,
                instrument,
                custodian,
                ..
            } => AnalysisError::DataIntegrity {
                message,
                instrument,
                custodian,
                segment: Some(boundary),
            },
            AnalysisError::NumericDivergence {
                iterations, flows, ..
            } => AnalysisError::NumericDivergence {
                iterations,
                flows,
                segment: Some(boundary),
            },
        }
    }

    pub fn is_data_integrity(&self) -> bool {
        matches!(self, AnalysisError::DataIntegrity { .. })
    }

    pub fn is_numeric_divergence(&self) -> bool {
        matches!(self, AnalysisError::NumericDivergence { .. })
    }
}

fn describe_location(
    instrument: &Option<String>,
    custodian: &Option<String>,
    segment: &Option<NaiveDate>,
) -> String {
    let mut out = String::new();
    if let Some(name) = instrument {
        out.push_str(&format!(" (instrument {name:?}"));
        if let Some(custodian) = custodian {
            out.push_str(&format!(" at {custodian:?}"));
        }
        out.push(')');
    }
    if let Some(date) = segment {
        out.push_str(&format!(" in segment ending {date}"));
    }
    out
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

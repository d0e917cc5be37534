//! Tally - personal asset ledger analytics
//!
//! This library values a ledger of asset transfers: current holdings, market
//! value, portfolio share, profit and loss, simple return and XIRR, per
//! holding and in aggregate, optionally split into checkpoint segments.

pub mod analysis;
pub mod collector;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod reports;
pub mod utils;
pub mod xirr;

pub use analysis::analyze;
pub use config::{EngineConfig, XirrConfig};
pub use error::AnalysisError;

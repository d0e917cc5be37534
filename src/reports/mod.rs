// Reports module - valuation, cash flows and checkpoint segments

pub mod cashflow;
pub mod checkpoints;
pub mod portfolio;

pub use cashflow::{extract_cash_flows, CashFlowSummary};
pub use checkpoints::{sequence, CheckpointReport};
pub use portfolio::{
    CustodianShare, PortfolioView, Position, Report, RiskShare, Totals, UNKNOWN_RISK,
};

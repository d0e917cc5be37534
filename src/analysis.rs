//! Analysis entry point
//!
//! Ties the pieces together: order the ledger, aggregate it, value the whole
//! history as of the valuation date, then value each checkpoint segment.

use tracing::info;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::models::{Checkpoint, ReferenceBook, Transaction};
use crate::reports::{sequence, Report};

/// Value a ledger and its checkpoint segments
///
/// Transactions are stable-sorted by date first, so same-day transactions
/// keep their input order. Any failure aborts the whole analysis.
pub fn analyze(
    transactions: &[Transaction],
    checkpoints: &[Checkpoint],
    reference: &ReferenceBook,
    config: &EngineConfig,
) -> Result<Report> {
    let mut ordered = transactions.to_vec();
    ordered.sort_by_key(|tx| tx.date);

    let valuation_date = config.valuation_date();
    info!(
        "Analyzing {} transactions, {} checkpoints, {} reference entries as of {}",
        ordered.len(),
        checkpoints.len(),
        reference.len(),
        valuation_date
    );

    let ledger = Ledger::from_transactions(&ordered);
    let mut report = Report::new(ledger.into_positions(), valuation_date);
    report.complete(reference, &config.xirr)?;

    let segments = sequence(&ordered, checkpoints, reference, config)?;
    report.set_checkpoints(segments);

    Ok(report)
}

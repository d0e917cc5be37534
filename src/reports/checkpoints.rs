//! Checkpoint segmentation
//!
//! Declared checkpoints cut the ledger into consecutive segments, each valued
//! on its own. Whatever is still held when a segment closes re-enters the next
//! one as a synthetic opening transfer worth exactly its closing value, so the
//! next segment's cost basis starts from that value.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::models::{Checkpoint, Leg, ReferenceBook, Transaction};
use crate::reports::portfolio::{Position, PortfolioView, Report, Totals};

/// Reason attached to synthetic opening transfers
pub const CARRY_FORWARD_REASON: &str = "carry-forward";

/// Valuation of the segment that ends at `date`
#[derive(Debug, Clone)]
pub struct CheckpointReport {
    pub date: NaiveDate,
    pub report: Report,
}

impl PortfolioView for CheckpointReport {
    fn positions(&self) -> &[Position] {
        self.report.positions()
    }

    fn totals(&self) -> &Totals {
        self.report.totals()
    }
}

/// Split a date-ordered ledger at the checkpoints and value each segment
///
/// Transactions dated on a boundary belong to the segment it closes. Every
/// declared checkpoint yields a report, even over an empty segment. One more
/// segment, closing at the valuation date, takes the transactions after the
/// last checkpoint; it is skipped when it would hold nothing new and the last
/// checkpoint is not in the past. An empty ledger has no segments.
pub fn sequence(
    transactions: &[Transaction],
    checkpoints: &[Checkpoint],
    reference: &ReferenceBook,
    config: &EngineConfig,
) -> Result<Vec<CheckpointReport>> {
    if transactions.is_empty() {
        return Ok(Vec::new());
    }

    let mut boundaries: Vec<&Checkpoint> = checkpoints.iter().collect();
    boundaries.sort_by_key(|c| c.date);

    let mut sequencer = Sequencer::new(config);
    let mut next = 0;
    for tx in transactions {
        while next < boundaries.len() && tx.date > boundaries[next].date {
            let checkpoint = boundaries[next];
            sequencer.close(checkpoint.date, &reference.with_prices(&checkpoint.prices))?;
            next += 1;
        }
        sequencer.record(tx);
    }
    for checkpoint in &boundaries[next..] {
        sequencer.close(checkpoint.date, &reference.with_prices(&checkpoint.prices))?;
    }

    let now = config.valuation_date();
    let last_declared = boundaries.last().map(|c| c.date);
    if sequencer.has_activity || last_declared.map_or(true, |d| now > d) {
        sequencer.close(now, reference)?;
    }

    info!("Valued {} checkpoint segments", sequencer.reports.len());
    Ok(sequencer.reports)
}

struct Sequencer<'a> {
    config: &'a EngineConfig,
    ledger: Ledger,
    /// Whether the open segment has any transactions of its own
    has_activity: bool,
    reports: Vec<CheckpointReport>,
}

impl<'a> Sequencer<'a> {
    fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            ledger: Ledger::new(),
            has_activity: false,
            reports: Vec::new(),
        }
    }

    fn record(&mut self, tx: &Transaction) {
        self.ledger.record(tx);
        self.has_activity = true;
    }

    /// Value the open segment at `boundary` and open the next one with the
    /// closing holdings carried in
    fn close(&mut self, boundary: NaiveDate, reference: &ReferenceBook) -> Result<()> {
        let ledger = std::mem::take(&mut self.ledger);
        let mut report = Report::new(ledger.into_positions(), boundary);
        report
            .complete(reference, &self.config.xirr)
            .map_err(|e| e.in_segment(boundary))?;

        for position in report.positions() {
            if position.quantity.is_zero() {
                continue;
            }
            self.ledger.record(&carry_forward(boundary, position));
        }
        debug!(
            "Closed segment at {} with {} carried holdings",
            boundary,
            self.ledger.len()
        );

        self.has_activity = false;
        self.reports.push(CheckpointReport {
            date: boundary,
            report,
        });
        Ok(())
    }
}

/// Opening transfer of a held position into the next segment
fn carry_forward(boundary: NaiveDate, position: &Position) -> Transaction {
    Transaction::transfer(
        boundary,
        Leg::CarriedValue(position.value),
        Leg::holding(
            position.name.clone(),
            position.custodian.clone(),
            position.quantity,
        ),
    )
    .with_reason(CARRY_FORWARD_REASON)
}

/// Value carried into the segment by a position's opening transfer, if any
pub fn carried_value(position: &Position) -> Option<Decimal> {
    position
        .transactions
        .iter()
        .filter(|tx| tx.reason == CARRY_FORWARD_REASON)
        .find_map(|tx| match tx.from {
            Some(Leg::CarriedValue(amount)) => Some(amount),
            _ => None,
        })
}

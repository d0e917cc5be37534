//! Ledger aggregation
//!
//! Walks a date-ordered transaction stream and accumulates the net quantity of
//! every (custodian, instrument) pair, keeping the transactions that touched
//! each pair so cash flows can be replayed later.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::models::{Leg, PositionKey, Transaction};
use crate::reports::Position;

/// Positions in first-seen order
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    order: Vec<PositionKey>,
    positions: HashMap<PositionKey, Position>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate a whole stream. The stream must already be in date order.
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut ledger = Self::new();
        for tx in transactions {
            ledger.record(tx);
        }
        ledger
    }

    /// Apply one transaction: the source loses its quantity, the destination
    /// gains it, and both remember the transaction.
    pub fn record(&mut self, tx: &Transaction) {
        let from = tx.from.as_ref().and_then(Leg::as_holding);
        let to = tx.to.as_ref().and_then(Leg::as_holding);

        let mut touched: Option<PositionKey> = None;
        if let Some(holding) = from {
            let key = holding.key();
            let position = self.entry(&key);
            position.quantity -= holding.quantity;
            position.transactions.push(tx.clone());
            touched = Some(key);
        }
        if let Some(holding) = to {
            let key = holding.key();
            let same = touched.as_ref() == Some(&key);
            let position = self.entry(&key);
            position.quantity += holding.quantity;
            if !same {
                position.transactions.push(tx.clone());
            }
        }
    }

    fn entry(&mut self, key: &PositionKey) -> &mut Position {
        if !self.positions.contains_key(key) {
            self.order.push(key.clone());
        }
        self.positions
            .entry(key.clone())
            .or_insert_with(|| Position::new(key.custodian.clone(), key.instrument.clone()))
    }

    pub fn get(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn quantity(&self, key: &PositionKey) -> Decimal {
        self.get(key).map(|p| p.quantity).unwrap_or(Decimal::ZERO)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> &[PositionKey] {
        &self.order
    }

    /// Positions in the order their keys were first seen
    pub fn into_positions(mut self) -> Vec<Position> {
        self.order
            .iter()
            .filter_map(|key| self.positions.remove(key))
            .collect()
    }
}

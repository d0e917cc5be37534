use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::config::XirrConfig;
use crate::error::{AnalysisError, Result};
use crate::models::{PositionKey, ReferenceBook, RiskLevel, Transaction};
use crate::reports::cashflow::{extract_cash_flows, CashFlowSummary};
use crate::reports::checkpoints::CheckpointReport;
use crate::xirr::xirr;

/// Label of the risk bucket for instruments without a risk level
pub const UNKNOWN_RISK: &str = "Unknown";

/// One instrument at one custodian
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub name: String,
    pub custodian: String,
    pub quantity: Decimal,
    /// Every transaction that moved this position, in ledger order
    pub transactions: Vec<Transaction>,

    // Filled in by `Report::complete`
    pub code: Option<String>,
    pub risk: Option<RiskLevel>,
    pub price: Decimal,
    pub value: Decimal,
    pub ratio: Decimal,
    pub total_cost: Decimal,
    pub total_return: Decimal,
    pub profit_and_loss: Decimal,
    pub rate_of_return: Decimal,
    pub annualized_return: Decimal,
    pub base: bool,
    pub ignore_return: bool,
    /// Declaration index of the instrument's reference entry
    pub sort_index: Option<usize>,
}

impl Position {
    pub fn new(custodian: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            custodian: custodian.into(),
            quantity: Decimal::ZERO,
            transactions: Vec::new(),
            code: None,
            risk: None,
            price: Decimal::ZERO,
            value: Decimal::ZERO,
            ratio: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            total_return: Decimal::ZERO,
            profit_and_loss: Decimal::ZERO,
            rate_of_return: Decimal::ZERO,
            annualized_return: Decimal::ZERO,
            base: false,
            ignore_return: false,
            sort_index: None,
        }
    }

    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.custodian.clone(), self.name.clone())
    }

    /// Copy price and classification from the reference book and value the
    /// position. Only an empty position may lack a reference entry.
    fn apply_reference(&mut self, reference: &ReferenceBook) -> Result<()> {
        match reference.get(&self.name) {
            Some(info) => {
                self.code = info.code.clone();
                self.risk = info.risk;
                self.price = info.price;
                self.base = info.base;
                self.ignore_return = info.ignore_return;
                self.sort_index = reference.index_of(&self.name);
            }
            None if self.quantity.is_zero() => {
                self.code = None;
                self.risk = None;
                self.price = Decimal::ZERO;
                self.base = false;
                self.ignore_return = false;
                self.sort_index = None;
            }
            None => return Err(AnalysisError::price_not_found(&self.name, &self.custodian)),
        }
        self.value = self.quantity * self.price;
        Ok(())
    }

    fn apply_returns(&mut self, summary: &CashFlowSummary, config: &XirrConfig) -> Result<()> {
        self.total_cost = summary.total_cost;
        self.total_return = summary.total_return;
        self.profit_and_loss = summary.profit_and_loss();
        self.rate_of_return = summary.rate_of_return().unwrap_or(Decimal::ZERO);
        self.annualized_return = xirr(&summary.flows, config)?;
        Ok(())
    }

    fn clear_returns(&mut self) {
        self.total_cost = Decimal::ZERO;
        self.total_return = Decimal::ZERO;
        self.profit_and_loss = Decimal::ZERO;
        self.rate_of_return = Decimal::ZERO;
        self.annualized_return = Decimal::ZERO;
    }
}

/// Aggregate figures of a report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub value: Decimal,
    pub cost: Decimal,
    pub returned: Decimal,
    pub profit_and_loss: Decimal,
    pub rate_of_return: Decimal,
    pub annualized_return: Decimal,
}

/// Value held under one risk level
#[derive(Debug, Clone, PartialEq)]
pub struct RiskShare {
    pub risk: String,
    pub value: Decimal,
    pub ratio: Decimal,
}

/// Value held at one custodian, split by pinned instrument
#[derive(Debug, Clone, PartialEq)]
pub struct CustodianShare {
    pub custodian: String,
    /// One entry per pinned instrument, in the order requested
    pub pinned: Vec<(String, Decimal)>,
    pub others: Decimal,
    pub total: Decimal,
}

/// Read surface shared by the full report and each checkpoint report
pub trait PortfolioView {
    fn positions(&self) -> &[Position];

    fn totals(&self) -> &Totals;

    /// Positions still worth something
    fn holdings(&self) -> Vec<&Position> {
        self.positions()
            .iter()
            .filter(|p| !p.value.is_zero())
            .collect()
    }

    /// Value and share per risk level, "Unknown" for unclassified instruments
    fn risk_breakdown(&self) -> Vec<RiskShare> {
        let mut by_risk: HashMap<String, Decimal> = HashMap::new();
        let mut total = Decimal::ZERO;
        for p in self.holdings() {
            let label = p
                .risk
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| UNKNOWN_RISK.to_string());
            *by_risk.entry(label).or_insert(Decimal::ZERO) += p.value;
            total += p.value;
        }

        by_risk
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .map(|(risk, value)| RiskShare {
                ratio: if total.is_zero() {
                    Decimal::ZERO
                } else {
                    value / total
                },
                risk,
                value,
            })
            .collect()
    }

    /// Value per custodian with pinned instruments broken out, largest first
    fn custodian_breakdown(&self, pinned: &[String]) -> Vec<CustodianShare> {
        let mut shares: Vec<CustodianShare> = Vec::new();
        for p in self.holdings() {
            let idx = match shares.iter().position(|s| s.custodian == p.custodian) {
                Some(idx) => idx,
                None => {
                    shares.push(CustodianShare {
                        custodian: p.custodian.clone(),
                        pinned: pinned.iter().map(|n| (n.clone(), Decimal::ZERO)).collect(),
                        others: Decimal::ZERO,
                        total: Decimal::ZERO,
                    });
                    shares.len() - 1
                }
            };
            let share = &mut shares[idx];
            match share.pinned.iter_mut().find(|(name, _)| *name == p.name) {
                Some((_, value)) => *value += p.value,
                None => share.others += p.value,
            }
            share.total += p.value;
        }

        shares.sort_by(|a, b| b.total.cmp(&a.total));
        shares
    }
}

/// Completed valuation of a set of positions
#[derive(Debug, Clone)]
pub struct Report {
    positions: Vec<Position>,
    totals: Totals,
    valuation_date: NaiveDate,
    checkpoints: Vec<CheckpointReport>,
}

impl Report {
    /// An uncompleted report. Call [`Report::complete`] before reading figures.
    pub fn new(positions: Vec<Position>, valuation_date: NaiveDate) -> Self {
        Self {
            positions,
            totals: Totals::default(),
            valuation_date,
            checkpoints: Vec::new(),
        }
    }

    pub fn valuation_date(&self) -> NaiveDate {
        self.valuation_date
    }

    pub fn checkpoints(&self) -> &[CheckpointReport] {
        &self.checkpoints
    }

    pub fn set_checkpoints(&mut self, checkpoints: Vec<CheckpointReport>) {
        self.checkpoints = checkpoints;
    }

    /// Price, value and measure every position, then sort.
    ///
    /// Either every figure is filled in or the report is left untouched.
    /// Completing again recomputes the same figures from the same history.
    pub fn complete(&mut self, reference: &ReferenceBook, config: &XirrConfig) -> Result<()> {
        let mut positions = self.positions.clone();

        let mut total_value = Decimal::ZERO;
        for position in positions.iter_mut() {
            position.apply_reference(reference)?;
            // a negative cash balance does not shrink the denominator
            if !position.base || position.value > Decimal::ZERO {
                total_value += position.value;
            }
        }

        let mut aggregate = CashFlowSummary::default();
        let mut measured = 0usize;
        for position in positions.iter_mut() {
            if position.base {
                position.clear_returns();
                continue;
            }
            let summary = extract_cash_flows(position, reference, self.valuation_date)
                .map_err(|e| e.at_position(&position.name, &position.custodian))?;
            position
                .apply_returns(&summary, config)
                .map_err(|e| e.at_position(&position.name, &position.custodian))?;
            if !position.ignore_return {
                aggregate.absorb(summary);
                measured += 1;
            }
        }

        let mut totals = Totals {
            value: total_value,
            ..Totals::default()
        };
        if measured > 0 {
            let rate = aggregate
                .rate_of_return()
                .ok_or_else(|| AnalysisError::data_integrity("total cost is zero"))?;
            totals.cost = aggregate.total_cost;
            totals.returned = aggregate.total_return;
            totals.profit_and_loss = aggregate.profit_and_loss();
            totals.rate_of_return = rate;
            totals.annualized_return = xirr(&aggregate.flows, config)?;
        }

        for position in positions.iter_mut() {
            position.ratio = if total_value.is_zero() {
                Decimal::ZERO
            } else {
                position.value / total_value
            };
        }

        positions.sort_by(compare_positions);

        debug!(
            "Completed report as of {}: {} positions, total value {}",
            self.valuation_date,
            positions.len(),
            total_value
        );
        self.positions = positions;
        self.totals = totals;
        Ok(())
    }
}

/// Declared instruments first in declaration order, then by value, largest first
fn compare_positions(a: &Position, b: &Position) -> Ordering {
    match (a.sort_index, b.sort_index) {
        (Some(x), Some(y)) if x != y => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => b.value.cmp(&a.value),
    }
}

impl PortfolioView for Report {
    fn positions(&self) -> &[Position] {
        &self.positions
    }

    fn totals(&self) -> &Totals {
        &self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::models::{Leg, ReferenceInfo};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report(txs: &[Transaction]) -> Report {
        Report::new(
            Ledger::from_transactions(txs).into_positions(),
            date(2025, 6, 1),
        )
    }

    fn find<'a>(report: &'a Report, custodian: &str, name: &str) -> &'a Position {
        report
            .positions()
            .iter()
            .find(|p| p.custodian == custodian && p.name == name)
            .unwrap()
    }

    fn scenario() -> (Vec<Transaction>, ReferenceBook) {
        let txs = vec![
            Transaction::deposit(date(2024, 1, 1), Leg::holding("BASE", "Bank", dec!(1000))),
            Transaction::transfer(
                date(2024, 6, 1),
                Leg::holding("BASE", "Bank", dec!(500)),
                Leg::holding("StockA", "Bank", dec!(10)),
            ),
        ];
        let book = ReferenceBook::new(vec![
            ReferenceInfo::base("BASE", dec!(1)),
            ReferenceInfo::new("StockA", dec!(60)),
        ])
        .unwrap();
        (txs, book)
    }

    #[test]
    fn test_cash_and_stock_scenario() {
        let (txs, book) = scenario();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();

        let stock = find(&report, "Bank", "StockA");
        assert_eq!(stock.quantity, dec!(10));
        assert_eq!(stock.value, dec!(600));
        assert_eq!(stock.profit_and_loss, dec!(100));
        assert_eq!(stock.rate_of_return, dec!(0.2));
        assert!(stock.annualized_return > Decimal::ZERO);

        let cash = find(&report, "Bank", "BASE");
        assert_eq!(cash.quantity, dec!(500));
        assert_eq!(cash.value, dec!(500));
        assert_eq!(cash.profit_and_loss, Decimal::ZERO);

        assert_eq!(report.totals().value, dec!(1100));
        assert_eq!(report.totals().profit_and_loss, dec!(100));
        assert_eq!(report.totals().rate_of_return, dec!(0.2));
    }

    #[test]
    fn test_completing_twice_is_stable() {
        let (txs, book) = scenario();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();
        let first = (report.positions().to_vec(), report.totals().clone());

        report.complete(&book, &XirrConfig::default()).unwrap();
        assert_eq!(report.positions(), first.0.as_slice());
        assert_eq!(report.totals(), &first.1);
    }

    #[test]
    fn test_ratios_sum_to_one() {
        let (txs, book) = scenario();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();

        let sum: Decimal = report.positions().iter().map(|p| p.ratio).sum();
        assert!((sum - Decimal::ONE).abs() <= dec!(0.000001));
    }

    #[test]
    fn test_missing_price_aborts_without_partial_report() {
        let (txs, _) = scenario();
        let book = ReferenceBook::new(vec![ReferenceInfo::base("BASE", dec!(1))]).unwrap();
        let mut report = report(&txs);
        let err = report.complete(&book, &XirrConfig::default()).unwrap_err();

        assert!(err.is_data_integrity());
        assert!(err.to_string().contains("price not found"));
        assert!(err.to_string().contains("StockA"));
        assert!(report.positions().iter().all(|p| p.value.is_zero()));
    }

    #[test]
    fn test_empty_unpriced_position_is_allowed() {
        let txs = vec![
            Transaction::transfer(
                date(2024, 1, 1),
                Leg::holding("BASE", "Bank", dec!(100)),
                Leg::holding("StockA", "Broker", dec!(1)),
            ),
            Transaction::deposit(date(2024, 1, 2), Leg::holding("Voucher", "Shop", dec!(1))),
            Transaction::withdrawal(date(2024, 1, 3), Leg::holding("Voucher", "Shop", dec!(1))),
        ];
        let book = ReferenceBook::new(vec![
            ReferenceInfo::base("BASE", dec!(1)),
            ReferenceInfo::new("StockA", dec!(120)),
        ])
        .unwrap();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();

        let voucher = find(&report, "Shop", "Voucher");
        assert_eq!(voucher.value, Decimal::ZERO);
        assert_eq!(voucher.sort_index, None);
        assert_eq!(report.positions().last().unwrap().name, "Voucher");
    }

    #[test]
    fn test_negative_cash_is_left_out_of_total_value() {
        let txs = vec![Transaction::transfer(
            date(2024, 1, 1),
            Leg::holding("BASE", "Margin", dec!(300)),
            Leg::holding("StockA", "Margin", dec!(5)),
        )];
        let book = ReferenceBook::new(vec![
            ReferenceInfo::base("BASE", dec!(1)),
            ReferenceInfo::new("StockA", dec!(60)),
        ])
        .unwrap();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();

        assert_eq!(find(&report, "Margin", "BASE").value, dec!(-300));
        assert_eq!(report.totals().value, dec!(300));
        assert_eq!(find(&report, "Margin", "StockA").ratio, Decimal::ONE);
        assert_eq!(find(&report, "Margin", "BASE").ratio, Decimal::NEGATIVE_ONE);
    }

    #[test]
    fn test_zero_total_cost_fails() {
        // a gift has no cost basis
        let txs = vec![Transaction::deposit(
            date(2024, 1, 1),
            Leg::holding("StockA", "Broker", dec!(1)),
        )];
        let book = ReferenceBook::new(vec![ReferenceInfo::new("StockA", dec!(60))]).unwrap();
        let mut report = report(&txs);
        let err = report.complete(&book, &XirrConfig::default()).unwrap_err();

        assert!(err.to_string().contains("total cost is zero"));
    }

    #[test]
    fn test_cash_only_report_has_no_return() {
        let txs = vec![Transaction::deposit(
            date(2024, 1, 1),
            Leg::holding("BASE", "Bank", dec!(10)),
        )];
        let book = ReferenceBook::new(vec![ReferenceInfo::base("BASE", dec!(1))]).unwrap();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();

        assert_eq!(report.totals().value, dec!(10));
        assert_eq!(report.totals().rate_of_return, Decimal::ZERO);
    }

    #[test]
    fn test_ignored_positions_stay_out_of_aggregate_return() {
        let txs = vec![
            Transaction::transfer(
                date(2024, 1, 1),
                Leg::holding("BASE", "Bank", dec!(100)),
                Leg::holding("StockA", "Broker", dec!(1)),
            ),
            Transaction::transfer(
                date(2024, 1, 1),
                Leg::holding("BASE", "Bank", dec!(100)),
                Leg::holding("House", "Home", dec!(1)),
            ),
        ];
        let book = ReferenceBook::new(vec![
            ReferenceInfo::base("BASE", dec!(1)),
            ReferenceInfo::new("StockA", dec!(150)),
            ReferenceInfo::new("House", dec!(50)).ignoring_return(),
        ])
        .unwrap();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();

        assert_eq!(find(&report, "Home", "House").profit_and_loss, dec!(-50));
        assert_eq!(report.totals().profit_and_loss, dec!(50));
        assert_eq!(report.totals().rate_of_return, dec!(0.5));
    }

    #[test]
    fn test_sort_by_declaration_then_value() {
        let txs = vec![
            Transaction::deposit(date(2024, 1, 1), Leg::holding("BASE", "Small", dec!(5))),
            Transaction::deposit(date(2024, 1, 1), Leg::holding("BASE", "Large", dec!(50))),
            Transaction::transfer(
                date(2024, 1, 1),
                Leg::holding("BASE", "Large", dec!(10)),
                Leg::holding("StockA", "Broker", dec!(1)),
            ),
        ];
        let book = ReferenceBook::new(vec![
            ReferenceInfo::new("StockA", dec!(10)),
            ReferenceInfo::base("BASE", dec!(1)),
        ])
        .unwrap();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();

        let order: Vec<(&str, &str)> = report
            .positions()
            .iter()
            .map(|p| (p.name.as_str(), p.custodian.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("StockA", "Broker"), ("BASE", "Large"), ("BASE", "Small")]
        );
    }

    #[test]
    fn test_risk_and_custodian_breakdowns() {
        let txs = vec![
            Transaction::deposit(date(2024, 1, 1), Leg::holding("BASE", "Bank", dec!(400))),
            Transaction::transfer(
                date(2024, 1, 1),
                Leg::holding("BASE", "Bank", dec!(100)),
                Leg::holding("StockA", "Broker", dec!(1)),
            ),
            Transaction::transfer(
                date(2024, 1, 1),
                Leg::holding("BASE", "Bank", dec!(100)),
                Leg::holding("Fund", "Bank", dec!(1)),
            ),
        ];
        let book = ReferenceBook::new(vec![
            ReferenceInfo::base("BASE", dec!(1)).with_risk(RiskLevel::R0),
            ReferenceInfo::new("StockA", dec!(100))
                .with_risk(RiskLevel::R4)
                .pinned(),
            ReferenceInfo::new("Fund", dec!(100)),
        ])
        .unwrap();
        let mut report = report(&txs);
        report.complete(&book, &XirrConfig::default()).unwrap();

        let risks = report.risk_breakdown();
        assert_eq!(
            risks,
            vec![
                RiskShare {
                    risk: "R0".to_string(),
                    value: dec!(200),
                    ratio: dec!(0.5),
                },
                RiskShare {
                    risk: "R4".to_string(),
                    value: dec!(100),
                    ratio: dec!(0.25),
                },
                RiskShare {
                    risk: UNKNOWN_RISK.to_string(),
                    value: dec!(100),
                    ratio: dec!(0.25),
                },
            ]
        );

        let custodians = report.custodian_breakdown(&book.pinned());
        assert_eq!(custodians[0].custodian, "Bank");
        assert_eq!(custodians[0].total, dec!(300));
        assert_eq!(custodians[0].others, dec!(300));
        assert_eq!(custodians[1].custodian, "Broker");
        assert_eq!(custodians[1].pinned, vec![("StockA".to_string(), dec!(100))]);
        assert_eq!(custodians[1].others, Decimal::ZERO);
    }
}

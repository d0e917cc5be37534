use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{AnalysisError, Result};
use crate::models::{Leg, ReferenceBook};
use crate::reports::Position;
use crate::xirr::CashFlowRecord;

/// Money put into and taken out of a position, with the dated flows behind it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashFlowSummary {
    pub total_cost: Decimal,
    /// Disposals plus the notional liquidation at the valuation date
    pub total_return: Decimal,
    pub flows: Vec<CashFlowRecord>,
}

impl CashFlowSummary {
    pub fn profit_and_loss(&self) -> Decimal {
        self.total_return - self.total_cost
    }

    /// Simple rate of return, `None` when nothing was invested
    pub fn rate_of_return(&self) -> Option<Decimal> {
        if self.total_cost.is_zero() {
            None
        } else {
            Some(self.profit_and_loss() / self.total_cost)
        }
    }

    /// Fold another position's flows into this one
    pub fn absorb(&mut self, other: CashFlowSummary) {
        self.total_cost += other.total_cost;
        self.total_return += other.total_return;
        self.flows.extend(other.flows);
    }
}

/// Replay a position's history into cash flows
///
/// Buying into the position costs whatever was given up for it; selling out
/// returns whatever was received. Both are valued at reference prices, and a
/// carried-over balance is worth exactly its amount. A position still worth
/// something gets one more inflow at `valuation_date`, as if liquidated then.
/// That flow is a measurement device only and never enters the ledger.
pub fn extract_cash_flows(
    position: &Position,
    reference: &ReferenceBook,
    valuation_date: NaiveDate,
) -> Result<CashFlowSummary> {
    let key = position.key();
    let mut summary = CashFlowSummary::default();

    for tx in &position.transactions {
        let (Some(from), Some(to)) = (&tx.from, &tx.to) else {
            continue;
        };

        if to.matches(&key) {
            let amount = leg_value(from, reference)?;
            summary.total_cost += amount;
            summary.flows.push(CashFlowRecord::on(tx.date, -amount));
        }
        if from.matches(&key) {
            let amount = leg_value(to, reference)?;
            summary.total_return += amount;
            summary.flows.push(CashFlowRecord::on(tx.date, amount));
        }
    }

    if !position.value.is_zero() {
        summary.total_return += position.value;
        summary
            .flows
            .push(CashFlowRecord::on(valuation_date, position.value));
    }

    Ok(summary)
}

fn leg_value(leg: &Leg, reference: &ReferenceBook) -> Result<Decimal> {
    match leg {
        Leg::CarriedValue(amount) => Ok(*amount),
        Leg::Holding(holding) => reference
            .get(&holding.instrument)
            .map(|info| holding.quantity * info.price)
            .ok_or_else(|| AnalysisError::price_not_found(&holding.instrument, &holding.custodian)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::models::{PositionKey, ReferenceInfo, Transaction};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn book() -> ReferenceBook {
        ReferenceBook::new(vec![
            ReferenceInfo::base("CNY", dec!(1)),
            ReferenceInfo::new("StockA", dec!(60)),
            ReferenceInfo::new("StockB", dec!(20)),
        ])
        .unwrap()
    }

    fn position(txs: &[Transaction], custodian: &str, name: &str, price: Decimal) -> Position {
        let ledger = Ledger::from_transactions(txs);
        let mut position = ledger
            .get(&PositionKey::new(custodian, name))
            .cloned()
            .unwrap();
        position.value = position.quantity * price;
        position
    }

    #[test]
    fn test_buy_and_partial_sell() {
        let txs = vec![
            Transaction::transfer(
                date(2024, 1, 1),
                Leg::holding("CNY", "Bank", dec!(500)),
                Leg::holding("StockA", "Broker", dec!(10)),
            ),
            Transaction::transfer(
                date(2024, 3, 1),
                Leg::holding("StockA", "Broker", dec!(4)),
                Leg::holding("CNY", "Bank", dec!(280)),
            ),
        ];
        let position = position(&txs, "Broker", "StockA", dec!(60));
        let summary = extract_cash_flows(&position, &book(), date(2024, 6, 1)).unwrap();

        assert_eq!(summary.total_cost, dec!(500));
        // 280 from the sale plus 6 * 60 still held
        assert_eq!(summary.total_return, dec!(640));
        assert_eq!(summary.profit_and_loss(), dec!(140));
        assert_eq!(summary.rate_of_return(), Some(dec!(0.28)));
        assert_eq!(
            summary.flows,
            vec![
                CashFlowRecord::on(date(2024, 1, 1), dec!(-500)),
                CashFlowRecord::on(date(2024, 3, 1), dec!(280)),
                CashFlowRecord::on(date(2024, 6, 1), dec!(360)),
            ]
        );
    }

    #[test]
    fn test_single_legged_transactions_are_not_flows() {
        let txs = vec![
            Transaction::deposit(date(2024, 1, 1), Leg::holding("StockA", "Broker", dec!(2))),
            Transaction::withdrawal(date(2024, 2, 1), Leg::holding("StockA", "Broker", dec!(1))),
        ];
        let position = position(&txs, "Broker", "StockA", dec!(60));
        let summary = extract_cash_flows(&position, &book(), date(2024, 6, 1)).unwrap();

        assert_eq!(summary.total_cost, Decimal::ZERO);
        assert_eq!(summary.total_return, dec!(60));
        assert_eq!(summary.flows.len(), 1);
        assert_eq!(summary.rate_of_return(), None);
    }

    #[test]
    fn test_swap_between_instruments_is_priced_at_reference() {
        let txs = vec![Transaction::transfer(
            date(2024, 1, 1),
            Leg::holding("StockB", "Broker", dec!(30)),
            Leg::holding("StockA", "Broker", dec!(10)),
        )];
        let position = position(&txs, "Broker", "StockA", dec!(60));
        let summary = extract_cash_flows(&position, &book(), date(2024, 6, 1)).unwrap();

        assert_eq!(summary.total_cost, dec!(600));
    }

    #[test]
    fn test_carried_value_is_worth_its_amount() {
        let txs = vec![Transaction::transfer(
            date(2024, 1, 1),
            Leg::CarriedValue(dec!(550)),
            Leg::holding("StockA", "Broker", dec!(10)),
        )];
        let position = position(&txs, "Broker", "StockA", dec!(60));
        let summary = extract_cash_flows(&position, &book(), date(2024, 6, 1)).unwrap();

        assert_eq!(summary.total_cost, dec!(550));
        assert_eq!(summary.total_return, dec!(600));
    }

    #[test]
    fn test_unpriced_counter_leg_fails() {
        let txs = vec![Transaction::transfer(
            date(2024, 1, 1),
            Leg::holding("Mystery", "Elsewhere", dec!(1)),
            Leg::holding("StockA", "Broker", dec!(10)),
        )];
        let position = position(&txs, "Broker", "StockA", dec!(60));
        let err = extract_cash_flows(&position, &book(), date(2024, 6, 1)).unwrap_err();

        assert!(err.is_data_integrity());
        assert!(err.to_string().contains("Mystery"));
    }

    #[test]
    fn test_absorb_combines_series() {
        let mut total = CashFlowSummary::default();
        total.absorb(CashFlowSummary {
            total_cost: dec!(100),
            total_return: dec!(150),
            flows: vec![CashFlowRecord::on(date(2024, 1, 1), dec!(-100))],
        });
        total.absorb(CashFlowSummary {
            total_cost: dec!(50),
            total_return: dec!(40),
            flows: vec![CashFlowRecord::on(date(2024, 2, 1), dec!(-50))],
        });

        assert_eq!(total.total_cost, dec!(150));
        assert_eq!(total.profit_and_loss(), dec!(40));
        assert_eq!(total.flows.len(), 2);
    }
}

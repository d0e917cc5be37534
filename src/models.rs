use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AnalysisError, Result};

/// Risk classification of an instrument
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::R0 => "R0",
            RiskLevel::R1 => "R1",
            RiskLevel::R2 => "R2",
            RiskLevel::R3 => "R3",
            RiskLevel::R4 => "R4",
            RiskLevel::R5 => "R5",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "R0" => Ok(RiskLevel::R0),
            "R1" => Ok(RiskLevel::R1),
            "R2" => Ok(RiskLevel::R2),
            "R3" => Ok(RiskLevel::R3),
            "R4" => Ok(RiskLevel::R4),
            "R5" => Ok(RiskLevel::R5),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static price/risk/classification data for an instrument
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceInfo {
    pub name: String,
    pub code: Option<String>,
    pub risk: Option<RiskLevel>,
    pub price: Decimal,
    /// Currency or cash-like instrument, no return concept
    pub base: bool,
    /// Excluded from the aggregate return
    pub ignore_return: bool,
    /// Gets its own column in the custodian breakdown
    pub pinned: bool,
}

impl ReferenceInfo {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            code: None,
            risk: None,
            price,
            base: false,
            ignore_return: false,
            pinned: false,
        }
    }

    /// A cash-like instrument
    pub fn base(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            base: true,
            ..Self::new(name, price)
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn ignoring_return(mut self) -> Self {
        self.ignore_return = true;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// Reference entries in declaration order, looked up by instrument name.
///
/// The declaration index doubles as the primary sort key of completed reports.
#[derive(Debug, Clone, Default)]
pub struct ReferenceBook {
    entries: Vec<ReferenceInfo>,
    index: HashMap<String, usize>,
}

impl ReferenceBook {
    /// Build a book, rejecting duplicate instrument names
    pub fn new(entries: Vec<ReferenceInfo>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, info) in entries.iter().enumerate() {
            if index.insert(info.name.clone(), i).is_some() {
                return Err(AnalysisError::DataIntegrity {
                    message: "duplicate reference entry".to_string(),
                    instrument: Some(info.name.clone()),
                    custodian: None,
                    segment: None,
                });
            }
        }
        Ok(Self { entries, index })
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceInfo> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Declaration order of an instrument
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn entries(&self) -> &[ReferenceInfo] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of pinned instruments, in declaration order
    pub fn pinned(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|info| info.pinned)
            .map(|info| info.name.clone())
            .collect()
    }

    /// Copy of this book with snapshot prices applied.
    ///
    /// Known instruments keep their classification and declaration index.
    /// Unknown ones are appended with default classification.
    pub fn with_prices(&self, prices: &[SnapshotPrice]) -> Self {
        let mut book = self.clone();
        for snapshot in prices {
            match book.index.get(&snapshot.name) {
                Some(&i) => book.entries[i].price = snapshot.price,
                None => {
                    book.index.insert(snapshot.name.clone(), book.entries.len());
                    book.entries
                        .push(ReferenceInfo::new(snapshot.name.clone(), snapshot.price));
                }
            }
        }
        book
    }
}

/// Identifies a position: one instrument at one custodian
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub custodian: String,
    pub instrument: String,
}

impl PositionKey {
    pub fn new(custodian: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self {
            custodian: custodian.into(),
            instrument: instrument.into(),
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.custodian, self.instrument)
    }
}

/// A quantity of a real instrument at a custodian
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub instrument: String,
    pub custodian: String,
    pub quantity: Decimal,
}

impl Holding {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.custodian.clone(), self.instrument.clone())
    }

    pub fn matches(&self, key: &PositionKey) -> bool {
        self.custodian == key.custodian && self.instrument == key.instrument
    }
}

/// One side of a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Leg {
    Holding(Holding),
    /// Value carried across a checkpoint boundary. Never becomes a position
    /// and is worth exactly its amount.
    CarriedValue(Decimal),
}

impl Leg {
    pub fn holding(
        instrument: impl Into<String>,
        custodian: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Leg::Holding(Holding {
            instrument: instrument.into(),
            custodian: custodian.into(),
            quantity,
        })
    }

    pub fn as_holding(&self) -> Option<&Holding> {
        match self {
            Leg::Holding(holding) => Some(holding),
            Leg::CarriedValue(_) => None,
        }
    }

    pub fn matches(&self, key: &PositionKey) -> bool {
        self.as_holding().is_some_and(|h| h.matches(key))
    }
}

/// A dated movement between two legs
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub from: Option<Leg>,
    pub to: Option<Leg>,
    pub reason: String,
    pub comment: String,
}

impl Transaction {
    pub fn new(date: NaiveDate, from: Option<Leg>, to: Option<Leg>) -> Self {
        Self {
            date,
            from,
            to,
            reason: String::new(),
            comment: String::new(),
        }
    }

    /// Trade or transfer: both legs present
    pub fn transfer(date: NaiveDate, from: Leg, to: Leg) -> Self {
        Self::new(date, Some(from), Some(to))
    }

    /// Deposit, dividend or gift: only a destination
    pub fn deposit(date: NaiveDate, to: Leg) -> Self {
        Self::new(date, None, Some(to))
    }

    pub fn withdrawal(date: NaiveDate, from: Leg) -> Self {
        Self::new(date, Some(from), None)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Snapshot price of one instrument at a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPrice {
    pub name: String,
    pub price: Decimal,
}

/// Declared boundary closing a segment of the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub date: NaiveDate,
    pub prices: Vec<SnapshotPrice>,
}

impl Checkpoint {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            prices: Vec::new(),
        }
    }

    pub fn with_price(mut self, name: impl Into<String>, price: Decimal) -> Self {
        self.prices.push(SnapshotPrice {
            name: name.into(),
            price,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_risk_level_parsing() {
        assert_eq!("r3".parse::<RiskLevel>(), Ok(RiskLevel::R3));
        assert_eq!(" R0 ".parse::<RiskLevel>(), Ok(RiskLevel::R0));
        assert!("R9".parse::<RiskLevel>().is_err());
        assert_eq!(RiskLevel::R5.to_string(), "R5");
    }

    #[test]
    fn test_reference_book_rejects_duplicates() {
        let err = ReferenceBook::new(vec![
            ReferenceInfo::new("StockA", dec!(1)),
            ReferenceInfo::new("StockA", dec!(2)),
        ])
        .unwrap_err();
        assert!(err.is_data_integrity());
        assert!(err.to_string().contains("duplicate reference entry"));
    }

    #[test]
    fn test_reference_book_lookup_and_order() {
        let book = ReferenceBook::new(vec![
            ReferenceInfo::base("CNY", dec!(1)),
            ReferenceInfo::new("StockA", dec!(60)).pinned(),
        ])
        .unwrap();

        assert_eq!(book.index_of("CNY"), Some(0));
        assert_eq!(book.index_of("StockA"), Some(1));
        assert_eq!(book.get("StockA").unwrap().price, dec!(60));
        assert!(book.get("Missing").is_none());
        assert_eq!(book.pinned(), vec!["StockA".to_string()]);
    }

    #[test]
    fn test_snapshot_prices_override_and_append() {
        let book = ReferenceBook::new(vec![
            ReferenceInfo::base("CNY", dec!(1)),
            ReferenceInfo::new("StockA", dec!(60)).with_risk(RiskLevel::R4),
        ])
        .unwrap();

        let snapshot = book.with_prices(&[
            SnapshotPrice {
                name: "StockA".to_string(),
                price: dec!(55),
            },
            SnapshotPrice {
                name: "Delisted".to_string(),
                price: dec!(3),
            },
        ]);

        let stock = snapshot.get("StockA").unwrap();
        assert_eq!(stock.price, dec!(55));
        assert_eq!(stock.risk, Some(RiskLevel::R4));
        assert_eq!(snapshot.index_of("Delisted"), Some(2));
        // the source book is untouched
        assert_eq!(book.get("StockA").unwrap().price, dec!(60));
    }

    #[test]
    fn test_carried_value_leg_never_matches_a_position() {
        let key = PositionKey::new("Broker", "StockA");
        assert!(Leg::holding("StockA", "Broker", dec!(1)).matches(&key));
        assert!(!Leg::holding("StockA", "Bank", dec!(1)).matches(&key));
        assert!(!Leg::CarriedValue(dec!(100)).matches(&key));
    }
}

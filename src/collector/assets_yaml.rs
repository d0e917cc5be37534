use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::Assets;
use crate::models::{Checkpoint, Leg, ReferenceInfo, RiskLevel, SnapshotPrice, Transaction};

/// Starter goods list written by `tally init`
pub const STARTER_GOODS: &str = "\
- name: Cash
  risk: R0
  price: 1
  base: true
- name: Index Fund
  code: IDX
  risk: R3
  price: 1.25
  pin: true
";

/// Starter ledger written by `tally init`
pub const STARTER_TRANSACTIONS: &str = "\
- date: 2024-01-02
  to: { name: Cash, custodian: Bank, quantity: 10000 }
  reason: salary
- date: 2024-01-15
  from: { name: Cash, custodian: Bank, quantity: 5000 }
  to: { name: Index Fund, custodian: Broker, quantity: 4000 }
  reason: buy
";

/// A whole `assets*.yaml` document
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetsDocument {
    pub goods: Vec<GoodsRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub checkpoints: Vec<CheckpointRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsRecord {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub risk: Option<RiskLevel>,
    pub price: Decimal,
    #[serde(default)]
    pub base: bool,
    #[serde(default)]
    pub ignore_return: bool,
    #[serde(default, rename = "pin")]
    pub pinned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegRecord {
    pub name: String,
    #[serde(default)]
    pub custodian: String,
    #[serde(default)]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub from: Option<LegRecord>,
    #[serde(default)]
    pub to: Option<LegRecord>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub goods: Vec<SnapshotPrice>,
}

/// A goods file: either a bare list or a `goods:` mapping
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GoodsFile {
    List(Vec<GoodsRecord>),
    Wrapped {
        #[serde(default)]
        goods: Vec<GoodsRecord>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TransactionsFile {
    List(Vec<TransactionRecord>),
    Wrapped {
        #[serde(default)]
        transactions: Vec<TransactionRecord>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CheckpointsFile {
    List(Vec<CheckpointRecord>),
    Wrapped {
        #[serde(default)]
        checkpoints: Vec<CheckpointRecord>,
    },
}

impl Default for GoodsFile {
    fn default() -> Self {
        GoodsFile::List(Vec::new())
    }
}

impl Default for TransactionsFile {
    fn default() -> Self {
        TransactionsFile::List(Vec::new())
    }
}

impl Default for CheckpointsFile {
    fn default() -> Self {
        CheckpointsFile::List(Vec::new())
    }
}

impl GoodsFile {
    fn into_records(self) -> Vec<GoodsRecord> {
        match self {
            GoodsFile::List(goods) | GoodsFile::Wrapped { goods } => goods,
        }
    }
}

impl TransactionsFile {
    fn into_records(self) -> Vec<TransactionRecord> {
        match self {
            TransactionsFile::List(transactions) | TransactionsFile::Wrapped { transactions } => {
                transactions
            }
        }
    }
}

impl CheckpointsFile {
    fn into_records(self) -> Vec<CheckpointRecord> {
        match self {
            CheckpointsFile::List(checkpoints) | CheckpointsFile::Wrapped { checkpoints } => {
                checkpoints
            }
        }
    }
}

impl From<GoodsRecord> for ReferenceInfo {
    fn from(record: GoodsRecord) -> Self {
        ReferenceInfo {
            name: record.name,
            code: record.code.filter(|c| !c.is_empty()),
            risk: record.risk,
            price: record.price,
            base: record.base,
            ignore_return: record.ignore_return,
            pinned: record.pinned,
        }
    }
}

impl From<LegRecord> for Leg {
    fn from(record: LegRecord) -> Self {
        Leg::holding(record.name, record.custodian, record.quantity)
    }
}

impl TransactionRecord {
    /// Convert to a transaction; `index` is the 1-based position in the file
    fn into_transaction(self, index: usize) -> Result<Transaction> {
        if self.from.is_none() && self.to.is_none() {
            return Err(anyhow!(
                "Transaction #{} on {} has neither a from nor a to side",
                index,
                self.date
            ));
        }
        Ok(Transaction::new(
            self.date,
            self.from.map(Leg::from),
            self.to.map(Leg::from),
        )
        .with_reason(self.reason)
        .with_comment(self.comment))
    }
}

impl From<CheckpointRecord> for Checkpoint {
    fn from(record: CheckpointRecord) -> Self {
        Checkpoint {
            date: record.date,
            prices: record.goods,
        }
    }
}

impl AssetsDocument {
    pub fn into_assets(self) -> Result<Assets> {
        Ok(Assets {
            goods: self.goods.into_iter().map(ReferenceInfo::from).collect(),
            transactions: convert_transactions(self.transactions)?,
            checkpoints: self.checkpoints.into_iter().map(Checkpoint::from).collect(),
        })
    }
}

fn convert_transactions(records: Vec<TransactionRecord>) -> Result<Vec<Transaction>> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| record.into_transaction(i + 1))
        .collect()
}

fn read_yaml<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).context("Failed to read YAML file")?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&text).context("Failed to parse YAML")
}

pub fn load_goods(path: &Path) -> Result<Vec<ReferenceInfo>> {
    let goods = read_yaml::<GoodsFile>(path)?.into_records();
    info!("Loaded {} goods from {:?}", goods.len(), path);
    Ok(goods.into_iter().map(ReferenceInfo::from).collect())
}

pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let transactions = read_yaml::<TransactionsFile>(path)?.into_records();
    info!("Loaded {} transactions from {:?}", transactions.len(), path);
    convert_transactions(transactions)
}

pub fn load_checkpoints(path: &Path) -> Result<Vec<Checkpoint>> {
    let checkpoints = read_yaml::<CheckpointsFile>(path)?.into_records();
    info!("Loaded {} checkpoints from {:?}", checkpoints.len(), path);
    Ok(checkpoints.into_iter().map(Checkpoint::from).collect())
}

pub fn load_document(path: &Path) -> Result<Assets> {
    let document: AssetsDocument = read_yaml(path)?;
    info!(
        "Loaded document {:?}: {} goods, {} transactions, {} checkpoints",
        path,
        document.goods.len(),
        document.transactions.len(),
        document.checkpoints.len()
    );
    document.into_assets()
}

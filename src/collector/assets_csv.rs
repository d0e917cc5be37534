use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::models::{Leg, ReferenceInfo, RiskLevel, Transaction};

const GOODS_COLUMNS: usize = 5;
const TRANSACTION_COLUMNS: usize = 9;

/// Parse a goods CSV: `name,code,risk,price,flags`
///
/// `flags` is a space-separated subset of `Base`, `IgnoreReturn` and `Pin`.
pub fn load_goods(path: &Path) -> Result<Vec<ReferenceInfo>> {
    let goods = read_rows(path, GOODS_COLUMNS, parse_goods_row)?;
    info!("Loaded {} goods from {:?}", goods.len(), path);
    Ok(goods)
}

/// Parse a transactions CSV:
/// `date,fromQuantity,fromName,fromCustodian,toQuantity,toName,toCustodian,reason,comment`
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let transactions = read_rows(path, TRANSACTION_COLUMNS, parse_transaction_row)?;
    info!("Loaded {} transactions from {:?}", transactions.len(), path);
    Ok(transactions)
}

fn read_rows<T>(
    path: &Path,
    columns: usize,
    parse: impl Fn(&StringRecord) -> Result<T>,
) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .context("Failed to open CSV file")?;

    let headers = reader.headers().context("Failed to read CSV headers")?;
    debug!("CSV headers: {:?}", headers);

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // header is line 1
        let line = idx + 2;
        let record = result.with_context(|| format!("Failed to read CSV line {}", line))?;
        if record.len() != columns {
            return Err(anyhow!(
                "Line {}: expected {} columns, found {}",
                line,
                columns,
                record.len()
            ));
        }
        rows.push(parse(&record).with_context(|| format!("Line {}", line))?);
    }
    Ok(rows)
}

fn parse_goods_row(record: &StringRecord) -> Result<ReferenceInfo> {
    let name = field(record, 0);
    if name.is_empty() {
        return Err(anyhow!("Goods name is empty"));
    }

    let mut info = ReferenceInfo::new(name, parse_decimal(field(record, 3))?);
    let code = field(record, 1);
    if !code.is_empty() {
        info.code = Some(code.to_string());
    }
    let risk = field(record, 2);
    if !risk.is_empty() {
        info.risk = Some(
            RiskLevel::from_str(risk).map_err(|_| anyhow!("Unknown risk level: {}", risk))?,
        );
    }
    for flag in field(record, 4).split_whitespace() {
        match flag {
            "Base" => info.base = true,
            "IgnoreReturn" => info.ignore_return = true,
            "Pin" => info.pinned = true,
            other => return Err(anyhow!("Unknown goods flag: {}", other)),
        }
    }
    Ok(info)
}

fn parse_transaction_row(record: &StringRecord) -> Result<Transaction> {
    let date = parse_date(field(record, 0))?;
    let from = parse_leg(record, 1)?;
    let to = parse_leg(record, 4)?;
    if from.is_none() && to.is_none() {
        return Err(anyhow!("Transaction has neither a from nor a to side"));
    }

    Ok(Transaction::new(date, from, to)
        .with_reason(field(record, 7))
        .with_comment(field(record, 8)))
}

/// Leg from three columns starting at `start`: quantity, name, custodian
fn parse_leg(record: &StringRecord, start: usize) -> Result<Option<Leg>> {
    let name = field(record, start + 1);
    if name.is_empty() {
        return Ok(None);
    }
    let quantity = match field(record, start) {
        "" => Decimal::ZERO,
        text => parse_decimal(text)?,
    };
    Ok(Some(Leg::holding(name, field(record, start + 2), quantity)))
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or_default()
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y/%m/%d"))
        .map_err(|_| anyhow!("Could not parse date: {}", text))
}

fn parse_decimal(text: &str) -> Result<Decimal> {
    let cleaned = text.replace(',', "");
    Decimal::from_str(&cleaned).with_context(|| format!("Invalid number: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_parse_goods_row_with_flags() {
        let info = parse_goods_row(&record(&["CNY", "", "R0", "1", "Base Pin"])).unwrap();

        assert_eq!(info.name, "CNY");
        assert_eq!(info.code, None);
        assert_eq!(info.risk, Some(RiskLevel::R0));
        assert!(info.base);
        assert!(info.pinned);
        assert!(!info.ignore_return);
    }

    #[test]
    fn test_parse_goods_row_rejects_unknown_flag() {
        let err = parse_goods_row(&record(&["StockA", "A", "R3", "60", "Shiny"])).unwrap_err();
        assert!(err.to_string().contains("Shiny"));
    }

    #[test]
    fn test_parse_transaction_row() {
        let tx = parse_transaction_row(&record(&[
            "2024-02-01", "500", "CNY", "Bank", "10", "StockA", "Broker", "buy", "",
        ]))
        .unwrap();

        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(tx.from, Some(Leg::holding("CNY", "Bank", dec!(500))));
        assert_eq!(tx.to, Some(Leg::holding("StockA", "Broker", dec!(10))));
        assert_eq!(tx.reason, "buy");
    }

    #[test]
    fn test_empty_name_means_missing_side() {
        let tx = parse_transaction_row(&record(&[
            "2024-01-01", "", "", "", "1,000.50", "CNY", "Bank", "salary", "",
        ]))
        .unwrap();

        assert!(tx.from.is_none());
        assert_eq!(tx.to, Some(Leg::holding("CNY", "Bank", dec!(1000.50))));
    }

    #[test]
    fn test_row_without_sides_is_rejected() {
        let result =
            parse_transaction_row(&record(&["2024-01-01", "", "", "", "", "", "", "x", ""]));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("2024-03-15").unwrap(), expected);
        assert_eq!(parse_date("2024/03/15").unwrap(), expected);
        assert!(parse_date("15/03/2024").is_err());
    }
}

//! Output formatting module for CLI display
//!
//! Turns completed reports into terminal tables or JSON. No figures are
//! computed here beyond what the report read surface already offers.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use tally::reports::{CheckpointReport, PortfolioView, Position, Report, UNKNOWN_RISK};
use tally::utils::{format_amount, format_percent, format_quantity};

fn signed_amount(value: Decimal) -> String {
    if value >= Decimal::ZERO {
        format_amount(value).green().to_string()
    } else {
        format_amount(value).red().to_string()
    }
}

fn signed_percent(value: Decimal) -> String {
    if value >= Decimal::ZERO {
        format_percent(value).green().to_string()
    } else {
        format_percent(value).red().to_string()
    }
}

fn risk_label(position: &Position) -> String {
    position
        .risk
        .map(|r| r.to_string())
        .unwrap_or_else(|| UNKNOWN_RISK.to_string())
}

/// Every position, including the ones that are fully sold out
pub fn format_goods_table(view: &impl PortfolioView) -> String {
    #[derive(Tabled)]
    struct GoodsRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Custodian")]
        custodian: String,
        #[tabled(rename = "Code")]
        code: String,
        #[tabled(rename = "Risk")]
        risk: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "P/L")]
        pl: String,
        #[tabled(rename = "RR")]
        rr: String,
        #[tabled(rename = "XIRR")]
        xirr: String,
    }

    let rows: Vec<GoodsRow> = view
        .positions()
        .iter()
        .map(|p| {
            // cash-like goods carry no return figures
            let (pl, rr, xirr) = if p.base {
                ("-".to_string(), "-".to_string(), "-".to_string())
            } else {
                (
                    signed_amount(p.profit_and_loss),
                    signed_percent(p.rate_of_return),
                    signed_percent(p.annualized_return),
                )
            };
            GoodsRow {
                name: p.name.clone(),
                custodian: p.custodian.clone(),
                code: p.code.clone().unwrap_or_default(),
                risk: risk_label(p),
                price: p.price.normalize().to_string(),
                quantity: format_quantity(p.quantity),
                value: format_amount(p.value),
                pl,
                rr,
                xirr,
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(4..), Alignment::right());
    table.to_string()
}

/// Positions still worth something, with their share of the portfolio
pub fn format_holding_table(view: &impl PortfolioView) -> String {
    #[derive(Tabled)]
    struct HoldingRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Custodian")]
        custodian: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Ratio")]
        ratio: String,
    }

    let rows: Vec<HoldingRow> = view
        .holdings()
        .into_iter()
        .map(|p| HoldingRow {
            name: p.name.clone(),
            custodian: p.custodian.clone(),
            value: format_amount(p.value),
            ratio: format_percent(p.ratio),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());
    table.to_string()
}

pub fn format_risk_table(view: &impl PortfolioView) -> String {
    #[derive(Tabled)]
    struct RiskRow {
        #[tabled(rename = "Risk")]
        risk: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Ratio")]
        ratio: String,
    }

    let rows: Vec<RiskRow> = view
        .risk_breakdown()
        .into_iter()
        .map(|share| RiskRow {
            risk: share.risk,
            value: format_amount(share.value),
            ratio: format_percent(share.ratio),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

/// Custodians by total value, one column per pinned instrument
pub fn format_custodian_table(view: &impl PortfolioView, pinned: &[String]) -> String {
    let mut builder = Builder::default();

    let mut header = vec!["Custodian".to_string()];
    header.extend(pinned.iter().cloned());
    header.push("Others".to_string());
    header.push("Total".to_string());
    builder.push_record(header);

    for share in view.custodian_breakdown(pinned) {
        let mut record = vec![share.custodian.clone()];
        record.extend(share.pinned.iter().map(|(_, value)| format_amount(*value)));
        record.push(format_amount(share.others));
        record.push(format_amount(share.total));
        builder.push_record(record);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

pub fn format_totals(view: &impl PortfolioView) -> String {
    let totals = view.totals();
    let mut output = String::new();
    output.push_str(&format!(
        "{:<20} {}",
        "Total Value:".bold(),
        format_amount(totals.value)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Cost:".bold(),
        format_amount(totals.cost)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Return:".bold(),
        format_amount(totals.returned)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total P/L:".bold(),
        signed_amount(totals.profit_and_loss)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Rate of Return:".bold(),
        signed_percent(totals.rate_of_return)
    ));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "XIRR:".bold(),
        signed_percent(totals.annualized_return)
    ));
    output
}

fn format_view(view: &impl PortfolioView, pinned: &[String]) -> String {
    let mut output = String::new();
    output.push_str(&format!("\n{}\n", "All Goods".cyan().bold()));
    output.push_str(&format_goods_table(view));
    output.push_str(&format!("\n\n{}\n", "Holding".cyan().bold()));
    output.push_str(&format_holding_table(view));
    output.push_str(&format!("\n\n{}\n", "Risks".cyan().bold()));
    output.push_str(&format_risk_table(view));
    output.push_str(&format!("\n\n{}\n", "Custodians".cyan().bold()));
    output.push_str(&format_custodian_table(view, pinned));
    output.push_str(&format!("\n\n{}\n", "━".repeat(60).bright_black()));
    output.push_str(&format_totals(view));
    output
}

/// One line per checkpoint segment
pub fn format_checkpoint_summary(checkpoints: &[CheckpointReport]) -> String {
    #[derive(Tabled)]
    struct CheckpointRow {
        #[tabled(rename = "Checkpoint")]
        date: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "P/L")]
        pl: String,
        #[tabled(rename = "RR")]
        rr: String,
        #[tabled(rename = "XIRR")]
        xirr: String,
    }

    let rows: Vec<CheckpointRow> = checkpoints
        .iter()
        .map(|c| {
            let totals = c.totals();
            CheckpointRow {
                date: c.date.to_string(),
                value: format_amount(totals.value),
                cost: format_amount(totals.cost),
                pl: signed_amount(totals.profit_and_loss),
                rr: signed_percent(totals.rate_of_return),
                xirr: signed_percent(totals.annualized_return),
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

/// Format a report for terminal table output
pub fn format_report_table(report: &Report, pinned: &[String], history: bool) -> String {
    let mut output = format!(
        "\n{} Portfolio as of {}\n",
        "📊".cyan().bold(),
        report.valuation_date()
    );
    output.push_str(&format_view(report, pinned));

    if !report.checkpoints().is_empty() {
        output.push_str(&format!("\n{}\n", "Checkpoints".cyan().bold()));
        output.push_str(&format_checkpoint_summary(report.checkpoints()));
        output.push('\n');
    }

    if history {
        for checkpoint in report.checkpoints() {
            output.push_str(&format!(
                "\n{} Segment ending {}\n",
                "🗓".cyan().bold(),
                checkpoint.date
            ));
            output.push_str(&format_view(checkpoint, pinned));
        }
    }

    output
}

#[derive(Serialize)]
struct JsonPosition {
    name: String,
    custodian: String,
    code: Option<String>,
    risk: String,
    price: String,
    quantity: String,
    value: String,
    ratio: String,
    total_cost: String,
    total_return: String,
    profit_and_loss: String,
    rate_of_return: String,
    annualized_return: String,
    base: bool,
    ignore_return: bool,
}

#[derive(Serialize)]
struct JsonTotals {
    value: String,
    cost: String,
    returned: String,
    profit_and_loss: String,
    rate_of_return: String,
    annualized_return: String,
}

#[derive(Serialize)]
struct JsonRisk {
    risk: String,
    value: String,
    ratio: String,
}

#[derive(Serialize)]
struct JsonView {
    date: String,
    positions: Vec<JsonPosition>,
    risks: Vec<JsonRisk>,
    totals: JsonTotals,
}

#[derive(Serialize)]
struct JsonReport {
    #[serde(flatten)]
    view: JsonView,
    checkpoints: Vec<JsonView>,
}

fn json_view(view: &impl PortfolioView, date: String) -> JsonView {
    let positions = view
        .positions()
        .iter()
        .map(|p| JsonPosition {
            name: p.name.clone(),
            custodian: p.custodian.clone(),
            code: p.code.clone(),
            risk: risk_label(p),
            price: p.price.to_string(),
            quantity: p.quantity.to_string(),
            value: p.value.to_string(),
            ratio: p.ratio.to_string(),
            total_cost: p.total_cost.to_string(),
            total_return: p.total_return.to_string(),
            profit_and_loss: p.profit_and_loss.to_string(),
            rate_of_return: p.rate_of_return.to_string(),
            annualized_return: p.annualized_return.to_string(),
            base: p.base,
            ignore_return: p.ignore_return,
        })
        .collect();

    let risks = view
        .risk_breakdown()
        .into_iter()
        .map(|r| JsonRisk {
            risk: r.risk,
            value: r.value.to_string(),
            ratio: r.ratio.to_string(),
        })
        .collect();

    let totals = view.totals();
    JsonView {
        date,
        positions,
        risks,
        totals: JsonTotals {
            value: totals.value.to_string(),
            cost: totals.cost.to_string(),
            returned: totals.returned.to_string(),
            profit_and_loss: totals.profit_and_loss.to_string(),
            rate_of_return: totals.rate_of_return.to_string(),
            annualized_return: totals.annualized_return.to_string(),
        },
    }
}

/// Format a report for JSON output
pub fn format_report_json(report: &Report) -> String {
    let json_report = JsonReport {
        view: json_view(report, report.valuation_date().to_string()),
        checkpoints: report
            .checkpoints()
            .iter()
            .map(|c| json_view(c, c.date.to_string()))
            .collect(),
    };

    serde_json::to_string_pretty(&json_report)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tally::models::{Leg, ReferenceBook, ReferenceInfo, Transaction};
    use tally::EngineConfig;

    fn report() -> Report {
        let date = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();
        let book = ReferenceBook::new(vec![
            ReferenceInfo::base("CNY", dec!(1)),
            ReferenceInfo::new("StockA", dec!(60)).pinned(),
        ])
        .unwrap();
        let txs = vec![
            Transaction::deposit(date(1, 1), Leg::holding("CNY", "Bank", dec!(1000))),
            Transaction::transfer(
                date(2, 1),
                Leg::holding("CNY", "Bank", dec!(500)),
                Leg::holding("StockA", "Broker", dec!(10)),
            ),
        ];
        let config = EngineConfig::default().with_valuation_date(date(12, 31));
        tally::analyze(&txs, &[], &book, &config).unwrap()
    }

    #[test]
    fn test_table_output_has_all_sections() {
        colored::control::set_override(false);
        let output = format_report_table(&report(), &["StockA".to_string()], false);

        for section in ["All Goods", "Holding", "Risks", "Custodians", "XIRR", "Checkpoints"] {
            assert!(output.contains(section), "missing {}", section);
        }
        assert!(output.contains("1,100.00"));
        assert!(output.contains(UNKNOWN_RISK));
    }

    #[test]
    fn test_json_output_is_valid() {
        let json = format_report_json(&report());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["date"], "2024-12-31");
        assert_eq!(value["positions"].as_array().unwrap().len(), 2);
        assert_eq!(value["totals"]["value"], "1100");
        assert_eq!(value["checkpoints"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_custodian_table_has_pinned_columns() {
        colored::control::set_override(false);
        let output = format_custodian_table(&report(), &["StockA".to_string()]);

        assert!(output.contains("StockA"));
        assert!(output.contains("Others"));
        assert!(output.contains("600.00"));
    }
}

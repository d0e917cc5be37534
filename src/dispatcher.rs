//! Command dispatcher that routes parsed CLI commands to their handlers

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use colored::Colorize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::cli::{formatters, Commands};
use tally::collector::{self, Assets, STARTER_GOODS, STARTER_TRANSACTIONS};
use tally::reports::Report;
use tally::EngineConfig;

/// Route a parsed command to its handler
pub fn dispatch_command(command: Commands, json_output: bool) -> Result<()> {
    match command {
        Commands::Run {
            dir,
            config,
            as_of,
            history,
            output,
        } => {
            let config = load_config(config.as_deref(), as_of.as_deref())?;
            dispatch_run(&dir, &config, history, output.as_deref(), json_output)
        }
        Commands::Validate { dir, config } => {
            let config = load_config(config.as_deref(), None)?;
            dispatch_validate(&dir, &config, json_output)
        }
        Commands::Init { dir } => dispatch_init(&dir),
    }
}

fn load_config(path: Option<&Path>, as_of: Option<&str>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    match as_of {
        Some(text) => Ok(config.with_valuation_date(parse_date(text)?)),
        None => Ok(config),
    }
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| anyhow!("Invalid date '{}': {} (expected YYYY-MM-DD)", text, e))
}

/// Collect and analyze a data directory
fn analyze_dir(dir: &Path, config: &EngineConfig) -> Result<(Assets, Report)> {
    let assets = collector::collect(dir)?;
    let reference = assets.reference_book()?;
    let report = tally::analyze(
        &assets.transactions,
        &assets.checkpoints,
        &reference,
        config,
    )
    .context("Analysis failed")?;
    Ok((assets, report))
}

fn dispatch_run(
    dir: &Path,
    config: &EngineConfig,
    history: bool,
    output: Option<&Path>,
    json_output: bool,
) -> Result<()> {
    info!("Running analysis on {:?}", dir);
    let (assets, report) = analyze_dir(dir, config)?;

    // Files get plain text
    if output.is_some() {
        colored::control::set_override(false);
    }

    let rendered = if json_output {
        formatters::format_report_json(&report)
    } else {
        let pinned = assets.reference_book()?.pinned();
        formatters::format_report_table(&report, &pinned, history)
    };

    match output {
        Some(path) => {
            fs::write(path, format!("{}\n", rendered))
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Wrote report to {:?}", path);
            println!("{} Report written to {}", "✓".green().bold(), path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn dispatch_validate(dir: &Path, config: &EngineConfig, json_output: bool) -> Result<()> {
    let (assets, report) = analyze_dir(dir, config)?;

    if json_output {
        let summary = serde_json::json!({
            "valid": true,
            "goods": assets.goods.len(),
            "transactions": assets.transactions.len(),
            "checkpoints": report.checkpoints().len(),
            "valuation_date": report.valuation_date().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} {} goods, {} transactions, {} checkpoint segments valued as of {}",
            "✓".green().bold(),
            assets.goods.len(),
            assets.transactions.len(),
            report.checkpoints().len(),
            report.valuation_date()
        );
    }
    Ok(())
}

fn dispatch_init(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    for (name, content) in [
        ("assets_goods.yaml", STARTER_GOODS),
        ("assets_transactions.yaml", STARTER_TRANSACTIONS),
    ] {
        let path = dir.join(name);
        if path.exists() {
            println!("{} {} already exists, skipped", "•".yellow(), path.display());
            continue;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {:?}", path);
        println!("{} Created {}", "✓".green().bold(), path.display());
    }
    Ok(())
}

// Collector - loads a data directory of YAML and CSV asset files

mod assets_csv;
mod assets_yaml;

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{Checkpoint, ReferenceBook, ReferenceInfo, Transaction};

pub use assets_yaml::{AssetsDocument, STARTER_GOODS, STARTER_TRANSACTIONS};

/// Everything read from a data directory
#[derive(Debug, Clone, Default)]
pub struct Assets {
    pub goods: Vec<ReferenceInfo>,
    pub transactions: Vec<Transaction>,
    pub checkpoints: Vec<Checkpoint>,
}

impl Assets {
    /// Append another file's contents. Order is restored by [`Assets::finish`].
    pub fn merge(&mut self, other: Assets) {
        self.goods.extend(other.goods);
        self.transactions.extend(other.transactions);
        self.checkpoints.extend(other.checkpoints);
    }

    /// Stable-sort transactions and checkpoints by date
    pub fn finish(&mut self) {
        self.transactions.sort_by_key(|tx| tx.date);
        self.checkpoints.sort_by_key(|c| c.date);
    }

    /// Reference book of the collected goods, failing on duplicate names
    pub fn reference_book(&self) -> Result<ReferenceBook> {
        ReferenceBook::new(self.goods.clone()).context("Invalid goods list")
    }
}

/// What a file in the data directory holds, judged by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    GoodsYaml,
    GoodsCsv,
    TransactionsYaml,
    TransactionsCsv,
    CheckpointsYaml,
    Document,
}

impl FileKind {
    /// Classify by prefix and extension; `None` for files the collector ignores
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let extension = path.extension()?.to_str()?.to_lowercase();
        let yaml = extension == "yaml" || extension == "yml";
        let csv = extension == "csv";

        if name.starts_with("assets_goods") {
            match (yaml, csv) {
                (true, _) => Some(FileKind::GoodsYaml),
                (_, true) => Some(FileKind::GoodsCsv),
                _ => None,
            }
        } else if name.starts_with("assets_transactions") {
            match (yaml, csv) {
                (true, _) => Some(FileKind::TransactionsYaml),
                (_, true) => Some(FileKind::TransactionsCsv),
                _ => None,
            }
        } else if name.starts_with("assets_checkpoints") {
            yaml.then_some(FileKind::CheckpointsYaml)
        } else if name.starts_with("assets") {
            yaml.then_some(FileKind::Document)
        } else {
            None
        }
    }
}

/// Collect every asset file in `dir` (not recursive)
///
/// Files are read in name order so the result does not depend on the
/// directory listing. Goods keep declaration order across files.
pub fn collect<P: AsRef<Path>>(dir: P) -> Result<Assets> {
    let dir = dir.as_ref();
    info!("Collecting assets from {:?}", dir);

    let mut files: Vec<(PathBuf, FileKind)> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter_map(|path| FileKind::detect(&path).map(|kind| (path, kind)))
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));

    if files.is_empty() {
        return Err(anyhow!("No asset files found in {}", dir.display()));
    }

    let mut assets = Assets::default();
    for (path, kind) in &files {
        debug!("Loading {:?} as {:?}", path, kind);
        let loaded = load_file(path, *kind)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        assets.merge(loaded);
    }
    assets.finish();
    assets.reference_book()?;

    info!(
        "Collected {} goods, {} transactions, {} checkpoints from {} files",
        assets.goods.len(),
        assets.transactions.len(),
        assets.checkpoints.len(),
        files.len()
    );
    Ok(assets)
}

/// Load a single file of a known kind
pub fn load_file(path: &Path, kind: FileKind) -> Result<Assets> {
    let mut assets = Assets::default();
    match kind {
        FileKind::GoodsYaml => assets.goods = assets_yaml::load_goods(path)?,
        FileKind::GoodsCsv => assets.goods = assets_csv::load_goods(path)?,
        FileKind::TransactionsYaml => {
            assets.transactions = assets_yaml::load_transactions(path)?
        }
        FileKind::TransactionsCsv => assets.transactions = assets_csv::load_transactions(path)?,
        FileKind::CheckpointsYaml => assets.checkpoints = assets_yaml::load_checkpoints(path)?,
        FileKind::Document => assets = assets_yaml::load_document(path)?,
    }
    Ok(assets)
}

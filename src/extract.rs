//! Game data import
//!
//! Walks a directory of exported game data (`*.json` files, each an array
//! of crafting items) and writes the items into the catalog database.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{info, warn};
use rusqlite::Connection;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::db;
use crate::error::ImportError;
use crate::models::{ConsumedItem, ItemDefinition, Rarity, Recipe, SkillRequirement, YieldEntry};

/// Item record as it appears in the data files
#[derive(Debug, Deserialize)]
struct RawItem {
    id: u64,
    name: String,
    #[serde(default)]
    generic_name: Option<String>,
    #[serde(default = "tierless")]
    tier: i32,
    #[serde(default)]
    rarity: Option<String>,
    #[serde(default)]
    recipes: Vec<RawRecipe>,
}

#[derive(Debug, Deserialize)]
struct RawRecipe {
    #[serde(default)]
    consumed_items: Vec<RawConsumed>,
    #[serde(default = "one")]
    output_quantity: u32,
    #[serde(default)]
    possibilities: Vec<(u32, f64)>,
    #[serde(default)]
    level_requirements: Option<(String, u32)>,
}

#[derive(Debug, Deserialize)]
struct RawConsumed {
    id: u64,
    quantity: u32,
}

fn tierless() -> i32 {
    -1
}

fn one() -> u32 {
    1
}

impl RawItem {
    fn into_item(self, path: &Path) -> Result<ItemDefinition, ImportError> {
        let rarity = match self.rarity.as_deref() {
            Some(r) => r.parse::<Rarity>().map_err(|detail| ImportError::Rarity {
                path: path.to_path_buf(),
                detail,
            })?,
            None => Rarity::default(),
        };

        let recipes = self
            .recipes
            .into_iter()
            .map(|raw| Recipe {
                consumed_items: raw
                    .consumed_items
                    .into_iter()
                    .map(|c| ConsumedItem {
                        item_id: c.id,
                        quantity: c.quantity,
                    })
                    .collect(),
                output_multiplier: raw.output_quantity,
                yield_distribution: raw
                    .possibilities
                    .into_iter()
                    .map(|(count, weight)| YieldEntry { count, weight })
                    .collect(),
                level_requirement: raw
                    .level_requirements
                    .map(|(skill, level)| SkillRequirement { skill, level }),
            })
            .collect();

        Ok(ItemDefinition {
            id: self.id,
            generic_name: self.generic_name.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            tier: self.tier,
            rarity,
            recipes,
        })
    }
}

/// Import statistics
#[derive(Debug, Default)]
pub struct ImportStats {
    pub files_scanned: usize,
    pub files_imported: usize,
    pub files_failed: usize,
    pub items_written: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import Statistics:")?;
        writeln!(f, "  Data files scanned:  {}", self.files_scanned)?;
        writeln!(f, "  Files imported:      {}", self.files_imported)?;
        writeln!(f, "  Files failed:        {}", self.files_failed)?;
        writeln!(f, "  Items written:       {}", self.items_written)?;
        Ok(())
    }
}

/// Find all `*.json` data files below `data_dir`, sorted by path
pub fn find_data_files(data_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// Parse one data file into item definitions
pub fn parse_data_file(path: &Path) -> Result<Vec<ItemDefinition>, ImportError> {
    let content = fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Vec<RawItem> = serde_json::from_str(&content).map_err(|source| ImportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    raw.into_iter().map(|item| item.into_item(path)).collect()
}

/// Import every data file below `data_dir` in a single transaction
///
/// A file that fails to parse is logged and skipped; the rest still import.
pub fn extract_to_database(conn: &Connection, data_dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    let files = find_data_files(data_dir);
    stats.files_scanned = files.len();
    info!("found {} data files in {}", files.len(), data_dir.display());

    let tx = conn.unchecked_transaction()?;
    for path in &files {
        match parse_data_file(path) {
            Ok(items) => {
                for item in &items {
                    db::upsert_item(&tx, item)?;
                }
                info!("{}: {} items", path.display(), items.len());
                stats.items_written += items.len();
                stats.files_imported += 1;
            }
            Err(e) => {
                warn!("skipping {}: {:#}", path.display(), anyhow::Error::new(e));
                stats.files_failed += 1;
            }
        }
    }
    tx.commit()?;

    Ok(stats)
}

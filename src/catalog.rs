// src/catalog.rs
use crate::error::CatalogError;
use crate::models::CatalogEntry;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const UNKNOWN_INDUSTRY: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Nifty50,
    Nifty500,
    NiftyBank,
    NiftyIt,
    NiftyNext50,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Nifty50,
        Category::Nifty500,
        Category::NiftyBank,
        Category::NiftyIt,
        Category::NiftyNext50,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::Nifty50 => "nifty50",
            Category::Nifty500 => "nifty500",
            Category::NiftyBank => "niftybank",
            Category::NiftyIt => "niftyit",
            Category::NiftyNext50 => "niftynext50",
        }
    }

    fn default_file(self) -> &'static str {
        match self {
            Category::Nifty50 => "ind_nifty50list.csv",
            Category::Nifty500 => "ind_nifty500list.csv",
            Category::NiftyBank => "ind_niftybanklist.csv",
            Category::NiftyIt => "ind_niftyitlist.csv",
            Category::NiftyNext50 => "ind_niftynext50list.csv",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| CatalogError::InvalidCategory(s.to_string()))
    }
}

/// Read-only mapping from category to the CSV table listing its members.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    files: HashMap<Category, PathBuf>,
}

impl CategoryTable {
    /// Standard NSE file names under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        let files = Category::ALL
            .into_iter()
            .map(|c| (c, dir.join(c.default_file())))
            .collect();
        Self { files }
    }

    pub fn path(&self, category: Category) -> Option<&Path> {
        self.files.get(&category).map(PathBuf::as_path)
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Industry", default)]
    industry: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SymbolCatalog {
    table: CategoryTable,
}

impl SymbolCatalog {
    pub fn new(table: CategoryTable) -> Self {
        Self { table }
    }

    pub fn list_symbols(&self, category: Category) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .list_symbols_with_industry(category)?
            .into_iter()
            .map(|entry| entry.symbol)
            .collect())
    }

    /// Tables are re-read on every call.
    pub fn list_symbols_with_industry(
        &self,
        category: Category,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        let path = self.table.path(category).ok_or_else(|| CatalogError::Load {
            path: category.key().to_string(),
            reason: "no table configured".to_string(),
        })?;
        let load_err = |reason: String| CatalogError::Load {
            path: path.display().to_string(),
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(path)
            .map_err(|e| load_err(e.to_string()))?;

        let mut entries = Vec::new();
        for (line, result) in reader.deserialize::<Row>().enumerate() {
            let row = result.map_err(|e| load_err(e.to_string()))?;
            let symbol = row.symbol.trim();
            if symbol.is_empty() {
                return Err(load_err(format!("row {} has an empty Symbol", line + 1)));
            }
            let industry = row
                .industry
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_INDUSTRY);
            entries.push(CatalogEntry {
                symbol: symbol.to_string(),
                industry: industry.to_string(),
            });
        }
        log::debug!("Loaded {} symbols for {}", entries.len(), category);
        Ok(entries)
    }
}

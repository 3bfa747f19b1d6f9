use crate::error::ReconError;
use crate::models::{ColumnId, ColumnMap};
use crate::services::workbook_reader::SheetSelection;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "recon.toml";

/// Run settings read from `recon.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shown in the page header of every report sheet.
    pub company_name: String,
    /// Banner rows above the journal data.
    pub skip_rows: usize,
    /// Read every worksheet instead of only the first.
    pub all_sheets: bool,
    pub output_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
    pub backup: bool,
    /// Role key (e.g. `supplier`) to column letter or 0-based index.
    pub columns: BTreeMap<String, ColumnId>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            skip_rows: 8,
            all_sheets: false,
            output_dir: PathBuf::from("供应商对账明细"),
            backup_dir: PathBuf::from("备份"),
            log_dir: PathBuf::from("logs"),
            backup: true,
            columns: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ReconError> {
        let content = fs::read_to_string(path).map_err(|e| ReconError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ReconError> {
        toml::from_str(content).map_err(|e| ReconError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Config file to use when none is given: `./recon.toml`, then the per-user config folder.
    pub fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|d| d.join("receipt-recon").join(DEFAULT_CONFIG_FILE))
            .filter(|p| p.exists())
    }

    /// Load `path` when given (it must exist), otherwise the located file, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ReconError> {
        match path {
            Some(p) => Self::load(p),
            None => match Self::locate() {
                Some(found) => Self::load(&found),
                None => Ok(Self::default()),
            },
        }
    }

    /// Resolve the `[columns]` table. Bad entries fall back to defaults and are logged.
    pub fn column_map(&self) -> ColumnMap {
        let (map, _fallbacks) = ColumnMap::resolve(&self.columns);
        map
    }

    pub fn sheet_selection(&self) -> SheetSelection {
        if self.all_sheets {
            SheetSelection::All
        } else {
            SheetSelection::First
        }
    }
}

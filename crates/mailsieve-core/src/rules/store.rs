//! File-backed rule store.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::service::RuleStore;

use super::model::{CategoryRule, RawRuleFile};

/// Name of the canonical rule file written by `store_rules`.
const CANONICAL_FILE: &str = "rules.json";

/// Rule store over a directory of JSON rule files.
///
/// Any `*.json` file in the directory contributes rules; files are
/// read in name order. Legacy shapes (bare sender lists, nested
/// category maps) are normalized at load. A file that fails to parse
/// is logged and skipped; it never aborts the load.
#[derive(Debug, Clone)]
pub struct JsonRuleStore {
    dir: PathBuf,
}

impl JsonRuleStore {
    /// Creates a store over the given directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn rule_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn load_file(path: &Path) -> Result<Vec<CategoryRule>> {
        let text = fs::read_to_string(path)?;
        let raw: RawRuleFile = serde_json::from_str(&text)
            .map_err(|e| Error::RuleStore(format!("{}: {e}", path.display())))?;
        Ok(raw.into_rules())
    }
}

impl RuleStore for JsonRuleStore {
    fn load_rules(&self) -> Result<Vec<CategoryRule>> {
        let mut rules = Vec::new();
        for path in self.rule_files()? {
            match Self::load_file(&path) {
                Ok(mut file_rules) => rules.append(&mut file_rules),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable rule file: {e}");
                }
            }
        }
        Ok(rules)
    }

    fn store_rules(&self, rules: &[CategoryRule]) -> Result<()> {
        let text = serde_json::to_string_pretty(rules)?;
        let target = self.dir.join(CANONICAL_FILE);
        let temp = self.dir.join(format!("{CANONICAL_FILE}.tmp"));
        fs::write(&temp, text)?;
        fs::rename(&temp, &target)?;

        // The canonical file now owns every rule; stale per-category
        // files would duplicate them on the next load.
        for path in self.rule_files()? {
            if path != target && fs::remove_file(&path).is_ok() {
                tracing::debug!(path = %path.display(), "removed superseded rule file");
            }
        }
        Ok(())
    }
}

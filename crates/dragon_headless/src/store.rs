//! File-backed progress store.
//!
//! The file is a flat JSON object of string values, one per key, so the
//! same data a browser keeps in local storage can be kept on disk:
//!
//! ```json
//! {
//!   "hypeDragon_coins": "450",
//!   "hypeDragon_abilities": "{\"health_boost\":{\"level\":2}}",
//!   "hypeDragon_purchaseHistory": "[{\"ability\":\"Усиление Здоровья\",\"level\":1,\"price\":250,\"timestamp\":\"...\"}]"
//! }
//! ```
//!
//! Unknown keys are preserved on write. A missing file or key reads as
//! the empty state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dragon_core::session::{AbilityProgress, ProgressStore, PurchaseRecord, StoreError};

/// Key holding the coin balance.
pub const COINS_KEY: &str = "hypeDragon_coins";

/// Key holding owned ability levels.
pub const ABILITIES_KEY: &str = "hypeDragon_abilities";

/// Key holding the shop's purchase log.
pub const HISTORY_KEY: &str = "hypeDragon_purchaseHistory";

type Entries = BTreeMap<String, String>;

/// [`ProgressStore`] over a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// A store at `path`. The file is created on the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self, key: &str) -> Result<Entries, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    key: key.to_string(),
                    message: format!("{}: {e}", self.path.display()),
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: format!("{}: {e}", self.path.display()),
        })
    }

    fn write_entry(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.read_entries(key)?;
        entries.insert(key.to_string(), value);

        let write_err = |message: String| StoreError::Write {
            key: key.to_string(),
            message,
        };
        let json = serde_json::to_string_pretty(&entries).map_err(|e| write_err(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        std::fs::write(&self.path, json)
            .map_err(|e| write_err(format!("{}: {e}", self.path.display())))?;
        tracing::debug!(key, path = %self.path.display(), "Progress saved");
        Ok(())
    }
}

impl ProgressStore for JsonFileStore {
    fn load_currency(&self) -> Result<u64, StoreError> {
        let entries = self.read_entries(COINS_KEY)?;
        let Some(raw) = entries.get(COINS_KEY) else {
            return Ok(0);
        };
        raw.trim().parse().map_err(|e| StoreError::Corrupt {
            key: COINS_KEY.to_string(),
            message: format!("'{raw}' is not a coin amount: {e}"),
        })
    }

    fn save_currency(&mut self, coins: u64) -> Result<(), StoreError> {
        self.write_entry(COINS_KEY, coins.to_string())
    }

    fn load_ability_progress(&self) -> Result<AbilityProgress, StoreError> {
        let entries = self.read_entries(ABILITIES_KEY)?;
        let Some(raw) = entries.get(ABILITIES_KEY) else {
            return Ok(AbilityProgress::new());
        };
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
            key: ABILITIES_KEY.to_string(),
            message: e.to_string(),
        })
    }

    fn save_ability_progress(&mut self, progress: &AbilityProgress) -> Result<(), StoreError> {
        let json = serde_json::to_string(progress).map_err(|e| StoreError::Write {
            key: ABILITIES_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.write_entry(ABILITIES_KEY, json)
    }

    fn load_purchase_history(&self) -> Result<Vec<PurchaseRecord>, StoreError> {
        let entries = self.read_entries(HISTORY_KEY)?;
        let Some(raw) = entries.get(HISTORY_KEY) else {
            return Ok(Vec::new());
        };
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
            key: HISTORY_KEY.to_string(),
            message: e.to_string(),
        })
    }

    fn save_purchase_history(&mut self, history: &[PurchaseRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_string(history).map_err(|e| StoreError::Write {
            key: HISTORY_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.write_entry(HISTORY_KEY, json)
    }
}

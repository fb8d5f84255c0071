use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use super::{validate_key, ReminderStorage};

/// One `<key>.json` file per key inside a data directory.
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ReminderStorage for JsonFileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read reminders from {}", path.display()))?;
        Ok(Some(contents))
    }

    fn save(&self, key: &str, blob: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Write-then-rename so a crash mid-write leaves the previous blob intact.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)
            .with_context(|| format!("Failed to write reminders to {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))
    }
}

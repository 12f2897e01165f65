use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::storage::Storage;
use crate::error::PersistenceError;

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: String,
}

/// Write an iterator of serializable items to a JSONL file (one JSON object per line).
fn write_jsonl<T: Serialize>(path: &Path, items: impl Iterator<Item = T>) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, &item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// File-backed storage: one `{"key": .., "value": ..}` object per line.
///
/// The whole file is rewritten on every `set`, which is fine for the few
/// hundred keys an island carries.
#[derive(Debug)]
pub struct JsonlStorage {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl JsonlStorage {
    /// Open `path`, loading existing entries. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let mut entries = BTreeMap::new();
        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let entry: Entry = serde_json::from_str(&line)?;
                    entries.insert(entry.key, entry.value);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened jsonl storage");
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let entries = self.entries.borrow();
        write_jsonl(
            &self.path,
            entries.iter().map(|(key, value)| Entry {
                key: key.clone(),
                value: value.clone(),
            }),
        )
    }
}

impl Storage for JsonlStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.write_all().map_err(|e| PersistenceError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonlStorage::open(dir.path().join("island.jsonl")).unwrap();
        assert_eq!(storage.get("settings.showAllProducts").unwrap(), None);
    }

    #[test]
    fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("island.jsonl");
        {
            let storage = JsonlStorage::open(&path).unwrap();
            storage.set("1010.buildings.constructed", "4").unwrap();
            storage.set("settings.consumptionFactor", "0.5").unwrap();
            storage.set("1010.buildings.constructed", "6").unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);

        let reopened = JsonlStorage::open(&path).unwrap();
        assert_eq!(
            reopened.get("1010.buildings.constructed").unwrap().as_deref(),
            Some("6")
        );
    }

    #[test]
    fn corrupt_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("island.jsonl");
        fs::write(&path, "{\"key\": \"a\", \"value\": \"1\"}\nnot json\n").unwrap();
        assert!(matches!(
            JsonlStorage::open(&path),
            Err(PersistenceError::Json(_))
        ));
    }
}

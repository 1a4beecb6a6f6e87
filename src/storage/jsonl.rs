use crate::record::{IngestEvent, Record};
use crate::storage::{Store, StoreError, StoreResult};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// File-backed store: JSON lines for records and events, plain lines for keys
///
/// | File | Content |
/// |------|---------|
/// | `<source>.jsonl` | one record per line |
/// | `<source>_keys.txt` | one dedup key per line |
/// | `<source>_events.jsonl` | one ingest event per line |
#[derive(Debug, Clone)]
pub struct JsonlStore {
    record_path: PathBuf,
    key_path: PathBuf,
    event_path: Option<PathBuf>,
}

impl JsonlStore {
    /// Creates a store rooted at `data_dir` for the given source
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(data_dir: &Path, source_name: &str, events_enabled: bool) -> Self {
        Self {
            record_path: data_dir.join(format!("{}.jsonl", source_name)),
            key_path: data_dir.join(format!("{}_keys.txt", source_name)),
            event_path: events_enabled
                .then(|| data_dir.join(format!("{}_events.jsonl", source_name))),
        }
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn event_path(&self) -> Option<&Path> {
        self.event_path.as_deref()
    }

    fn append_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        append_line(path, &line)
    }
}

impl Store for JsonlStore {
    fn append_record(&mut self, record: &Record) -> StoreResult<()> {
        Self::append_json(&self.record_path, record)
    }

    fn append_key(&mut self, key: &str) -> StoreResult<()> {
        if key.contains('\n') || key.contains('\r') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        append_line(&self.key_path, &format!("{}\n", key))
    }

    fn append_event(&mut self, event: &IngestEvent) -> StoreResult<()> {
        match &self.event_path {
            Some(path) => Self::append_json(path, event),
            None => Ok(()),
        }
    }

    fn load_keys(&self) -> StoreResult<HashSet<String>> {
        let file = match File::open(&self.key_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(io_error(&self.key_path, e)),
        };

        let mut keys = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| io_error(&self.key_path, e))?;
            let key = line.trim();
            if !key.is_empty() {
                keys.insert(key.to_string());
            }
        }

        Ok(keys)
    }
}

/// Appends `line` and syncs it to storage before returning
fn append_line(path: &Path, line: &str) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, e))?;

    file.write_all(line.as_bytes())
        .and_then(|()| file.flush())
        .and_then(|()| file.sync_data())
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EventStatus;
    use chrono::DateTime;
    use tempfile::TempDir;

    fn record(header: &str) -> Record {
        let date = DateTime::parse_from_rfc3339("2026-10-18T10:00:00+03:00").unwrap();
        Record::new(header, "body", date, vec!["tag".to_string()], "lenta", None).unwrap()
    }

    #[test]
    fn test_missing_key_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(&dir.path().join("nested"), "lenta", true);
        assert!(store.load_keys().unwrap().is_empty());
    }

    #[test]
    fn test_records_append_one_per_line() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonlStore::new(&dir.path().join("data"), "lenta", true);

        store.append_record(&record("First")).unwrap();
        store.append_record(&record("Second")).unwrap();

        let content = fs::read_to_string(store.record_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: Record = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.header(), "Second");
    }

    #[test]
    fn test_keys_roundtrip_through_log() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonlStore::new(dir.path(), "lenta", false);

        store.append_key("first header").unwrap();
        store.append_key("second header").unwrap();
        // Blank lines left by hand edits are ignored
        fs::OpenOptions::new()
            .append(true)
            .open(store.key_path())
            .unwrap()
            .write_all(b"\n  \n")
            .unwrap();

        let keys = store.load_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("first header"));
    }

    #[test]
    fn test_key_with_newline_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonlStore::new(dir.path(), "lenta", false);
        assert!(matches!(
            store.append_key("two\nlines"),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_events_disabled_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonlStore::new(dir.path(), "lenta", false);
        store
            .append_event(&IngestEvent::stored(record("Header")))
            .unwrap();

        assert!(store.event_path().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_events_enabled() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonlStore::new(dir.path(), "lenta", true);
        store
            .append_event(&IngestEvent::error("lenta", "https://lenta.ru/a", "boom"))
            .unwrap();

        let content = fs::read_to_string(store.event_path().unwrap()).unwrap();
        let event: IngestEvent = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(event.status(), EventStatus::Error);
    }
}

use crate::model::{AnalysisPreset, Marker, ScanKey, ScanRecord};
use crate::prelude::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One durable mutation. The journal is replayed in order on open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    InsertScan { scan: ScanRecord },
    DeleteScan { key: ScanKey },
    CreateMarker { marker: Marker },
    DeleteMarker { id: u64 },
    /// Bulk marker delete, applied as one unit.
    DeleteMarkers { ids: Vec<u64> },
    UpsertPreset { preset: AnalysisPreset },
}

/// Append-only JSON-lines file. Each entry is written and flushed before the
/// in-memory tables change, so an acknowledged write survives a restart. A
/// failed append is cut back off the file so it never replays.
pub struct Journal {
    path: PathBuf,
    file: File,
    /// Length of the file up to the last complete entry.
    len: u64,
    #[cfg(test)]
    fail_after: Option<usize>,
}

impl Journal {
    /// Opens (or creates) the journal and returns the entries already in it.
    /// A torn final line from an interrupted append is dropped and truncated.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<(Self, Vec<JournalEntry>)> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        let mut good_len = 0usize;
        let mut unterminated = false;
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let last = lines.len();
        for (number, raw) in lines.iter().enumerate() {
            let line = raw.trim();
            if !line.is_empty() {
                match serde_json::from_str::<JournalEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(err) if number + 1 == last => {
                        log::warn!(
                            "dropping torn journal tail in {}: {}",
                            path.display(),
                            err
                        );
                        break;
                    }
                    Err(err) => {
                        return Err(CoreError::StoreUnavailable(format!(
                            "journal {} line {} is corrupt: {}",
                            path.display(),
                            number + 1,
                            err
                        )));
                    }
                }
            }
            good_len += raw.len();
            unterminated = !raw.ends_with('\n');
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut len = good_len as u64;
        if len < content.len() as u64 {
            file.set_len(len)?;
        }
        if unterminated {
            file.write_all(b"\n")?;
            file.flush()?;
            len += 1;
        }

        let journal = Self {
            path,
            file,
            len,
            #[cfg(test)]
            fail_after: None,
        };
        Ok((journal, entries))
    }

    pub fn append(&mut self, entry: &JournalEntry) -> CoreResult<()> {
        let mut line = serde_json::to_vec(entry)
            .map_err(|err| CoreError::StoreUnavailable(format!("journal encode: {err}")))?;
        line.push(b'\n');

        if let Err(err) = self.write_line(&line) {
            if let Err(truncate) = self.file.set_len(self.len) {
                log::error!(
                    "journal {} could not drop a failed append: {}",
                    self.path.display(),
                    truncate
                );
            }
            return Err(err.into());
        }
        self.len += line.len() as u64;
        Ok(())
    }

    #[cfg(not(test))]
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.file.write_all(line)?;
        self.file.flush()
    }

    #[cfg(test)]
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        if let Some(written) = self.fail_after.take() {
            self.file.write_all(&line[..written.min(line.len())])?;
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.file.write_all(line)?;
        self.file.flush()
    }

    /// Makes the next append fail after writing `written` bytes of its line.
    #[cfg(test)]
    pub(crate) fn fail_next_append(&mut self, written: usize) {
        self.fail_after = Some(written);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanConfig;
    use chrono::Utc;
    use uuid::Uuid;

    fn scan() -> ScanRecord {
        ScanRecord::new(Utc::now(), Uuid::new_v4(), ScanConfig::new("FM", 98.0, 20.0, 2))
            .with_powers(vec![-80.0, -40.0])
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("journal.jsonl");
        let record = scan();

        let (mut journal, replay) = Journal::open(&path).unwrap();
        assert!(replay.is_empty());
        journal
            .append(&JournalEntry::InsertScan { scan: record.clone() })
            .unwrap();
        journal
            .append(&JournalEntry::DeleteScan { key: record.key() })
            .unwrap();
        drop(journal);

        let (_, replay) = Journal::open(&path).unwrap();
        assert_eq!(
            replay,
            vec![
                JournalEntry::InsertScan { scan: record.clone() },
                JournalEntry::DeleteScan { key: record.key() },
            ]
        );
    }

    #[test]
    fn torn_tail_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let (mut journal, _) = Journal::open(&path).unwrap();
        journal.append(&JournalEntry::DeleteMarker { id: 4 }).unwrap();
        drop(journal);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"op\":\"delete_mar").unwrap();
        drop(file);

        let (mut journal, replay) = Journal::open(&path).unwrap();
        assert_eq!(replay, vec![JournalEntry::DeleteMarker { id: 4 }]);
        journal.append(&JournalEntry::DeleteMarker { id: 5 }).unwrap();
        drop(journal);

        let (_, replay) = Journal::open(&path).unwrap();
        assert_eq!(
            replay,
            vec![
                JournalEntry::DeleteMarker { id: 4 },
                JournalEntry::DeleteMarker { id: 5 },
            ]
        );
    }

    #[test]
    fn failed_append_never_replays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let (mut journal, _) = Journal::open(&path).unwrap();
        journal.append(&JournalEntry::DeleteMarker { id: 1 }).unwrap();

        journal.fail_next_append(7);
        let err = journal
            .append(&JournalEntry::DeleteMarkers { ids: vec![2, 3] })
            .unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));

        journal.append(&JournalEntry::DeleteMarker { id: 4 }).unwrap();
        drop(journal);

        let (_, replay) = Journal::open(&path).unwrap();
        assert_eq!(
            replay,
            vec![
                JournalEntry::DeleteMarker { id: 1 },
                JournalEntry::DeleteMarker { id: 4 },
            ]
        );
    }

    #[test]
    fn corrupt_middle_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        std::fs::write(&path, "garbage\n{\"op\":\"delete_marker\",\"id\":1}\n").unwrap();
        assert!(matches!(Journal::open(&path), Err(CoreError::StoreUnavailable(_))));
    }
}

use crate::core::{DqlError, Task, TaskKey};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_ENTRY_LEN: usize = 64 * 1024 * 1024;

/// Mutations recorded in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert or overwrite the task at its key
    Put(Task),
    Delete { key: TaskKey },
    /// Move a task to a new primary key in one step
    Migrate { old: TaskKey, task: Task },
    /// Snapshot was written; earlier entries are covered by it
    Checkpoint { timestamp: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log sequence number
    pub sequence: u64,
    pub timestamp: u64,
    pub operation: Operation,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl LogEntry {
    #[must_use]
    pub fn new(sequence: u64, operation: Operation) -> Self {
        Self {
            sequence,
            timestamp: now_secs(),
            operation,
        }
    }
}

/// Append-only log of one namespace, stored next to its snapshot.
pub struct WalManager {
    path: PathBuf,
    file: File,
    current_sequence: u64,
}

impl WalManager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DqlError> {
        let path = path.as_ref().to_path_buf();
        let (entries, valid_len) = Self::read_entries(&path)?;
        let current_sequence = entries.last().map_or(0, |e| e.sequence);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        // Cut a torn tail so new entries start on a frame boundary
        if file.metadata()?.len() > valid_len {
            file.set_len(valid_len)?;
        }

        Ok(Self {
            path,
            file,
            current_sequence,
        })
    }

    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.current_sequence
    }

    /// Write one operation and flush it. Returns its sequence number.
    pub fn append(&mut self, operation: Operation) -> Result<u64, DqlError> {
        self.current_sequence += 1;
        let entry = LogEntry::new(self.current_sequence, operation);
        let encoded = bincode::serialize(&entry)?;

        let len = u32::try_from(encoded.len())
            .map_err(|_| DqlError::Store("log entry too large".to_string()))?;
        // Length prefix (4 bytes LE) + payload
        let mut frame = Vec::with_capacity(4 + encoded.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&encoded);
        self.file.write_all(&frame)?;
        self.file.flush()?;

        Ok(self.current_sequence)
    }

    /// Every entry in the log, in write order.
    pub fn read_all(&self) -> Result<Vec<LogEntry>, DqlError> {
        Ok(Self::read_entries(&self.path)?.0)
    }

    /// Entries plus the byte length of the well-formed prefix.
    fn read_entries(path: &Path) -> Result<(Vec<LogEntry>, u64), DqlError> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        let mut valid_len = 0u64;

        loop {
            let mut len_bytes = [0u8; 4];
            match file.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            if len > MAX_ENTRY_LEN {
                tracing::warn!(path = %path.display(), len, "implausible log entry length, ignoring rest of log");
                break;
            }
            let mut data = vec![0u8; len];
            match file.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    tracing::warn!(path = %path.display(), "truncated log entry at end of file, ignoring");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            valid_len += 4 + len as u64;

            match bincode::deserialize::<LogEntry>(&data) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable log entry");
                }
            }
        }

        Ok((entries, valid_len))
    }

    /// Drop everything logged so far and record a checkpoint marker.
    /// Call only after the snapshot covering those entries is on disk.
    pub fn checkpoint(&mut self) -> Result<(), DqlError> {
        self.file.set_len(0)?;
        self.append(Operation::Checkpoint {
            timestamp: now_secs(),
        })?;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<(), DqlError> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn task(id: &str) -> Task {
        Task {
            object_id: format!("{id:0>24}"),
            dag_id: "d1".to_string(),
            id: id.to_string(),
            name: "n".to_string(),
            payload: "{}".to_string(),
            status: "pending".to_string(),
            duration: 1,
            retries: 0,
            dependencies: vec![],
        }
    }

    #[test]
    fn test_append_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = WalManager::open(temp_dir.path().join("tasks.wal")).unwrap();

        assert_eq!(wal.append(Operation::Put(task("t1"))).unwrap(), 1);
        assert_eq!(
            wal.append(Operation::Delete { key: TaskKey::new("d1", "t1") }).unwrap(),
            2
        );

        let logs = wal.read_all().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].operation, Operation::Put(task("t1")));
        assert_eq!(logs[1].sequence, 2);
    }

    #[test]
    fn test_sequence_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.wal");
        {
            let mut wal = WalManager::open(&path).unwrap();
            wal.append(Operation::Put(task("t1"))).unwrap();
            wal.append(Operation::Put(task("t2"))).unwrap();
        }

        let wal = WalManager::open(&path).unwrap();
        assert_eq!(wal.sequence(), 2);
        assert_eq!(wal.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_checkpoint_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = WalManager::open(temp_dir.path().join("tasks.wal")).unwrap();
        for i in 0..5 {
            wal.append(Operation::Put(task(&format!("t{i}")))).unwrap();
        }

        wal.checkpoint().unwrap();

        let logs = wal.read_all().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(matches!(logs[0].operation, Operation::Checkpoint { .. }));
        assert_eq!(logs[0].sequence, 6);
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.wal");
        {
            let mut wal = WalManager::open(&path).unwrap();
            wal.append(Operation::Put(task("t1"))).unwrap();
        }
        // Length prefix promising more bytes than were written
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();

        let mut wal = WalManager::open(&path).unwrap();
        assert_eq!(wal.read_all().unwrap().len(), 1);

        wal.append(Operation::Put(task("t2"))).unwrap();
        let logs = wal.read_all().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].operation, Operation::Put(task("t2")));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! One JSON entry per line, each carrying a CRC32 of its operation. Reading
//! stops at the first line that fails to parse or verify: that is where a
//! crashed writer left a partial entry. A failed append is cut back off the
//! file before it returns, so later entries never land behind a torn line.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use weft_core::Operation;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAL holds a partial entry that could not be rolled back")]
    Poisoned,
}

/// A single entry in the write-ahead log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number
    pub sequence: u64,
    /// Microseconds since Unix epoch
    pub timestamp_micros: u64,
    pub machine_id: String,
    pub operation: Operation,
    /// CRC32 of the serialized operation
    pub checksum: u32,
}

impl WalEntry {
    pub fn new(sequence: u64, machine_id: &str, operation: Operation) -> Result<Self, WalError> {
        let checksum = Self::checksum(&operation)?;
        let timestamp_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Ok(Self {
            sequence,
            timestamp_micros,
            machine_id: machine_id.to_string(),
            operation,
            checksum,
        })
    }

    fn checksum(operation: &Operation) -> Result<u32, WalError> {
        let json = serde_json::to_string(operation)?;
        Ok(crc32fast::hash(json.as_bytes()))
    }

    /// Verify the checksum matches the operation
    pub fn verify(&self) -> bool {
        Self::checksum(&self.operation).is_ok_and(|c| c == self.checksum)
    }

    fn parse(line: &str) -> Option<Self> {
        serde_json::from_str::<Self>(line)
            .ok()
            .filter(WalEntry::verify)
    }
}

/// Write-ahead log for durable operation storage
pub struct Wal {
    path: PathBuf,
    file: File,
    next_sequence: u64,
    machine_id: String,
    poisoned: bool,
    /// Write only this many bytes of the next entry, then fail
    #[cfg(test)]
    torn_write_at: Option<usize>,
}

impl Wal {
    /// Open or create a WAL at the given path
    ///
    /// Sequence numbering continues after the last valid entry.
    pub fn open(path: &Path, machine_id: &str) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let next_sequence = Self::replay(path)?
            .last()
            .map(|e| e.sequence + 1)
            .unwrap_or(0);

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_sequence,
            machine_id: machine_id.to_string(),
            poisoned: false,
            #[cfg(test)]
            torn_write_at: None,
        })
    }

    /// Append an operation, returning its sequence number
    ///
    /// The entry is fsync'd before this returns. On failure the file is
    /// truncated back to where the entry started; if that fails too, every
    /// later append is refused with [`WalError::Poisoned`].
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }
        let sequence = self.next_sequence;
        let entry = WalEntry::new(sequence, &self.machine_id, op.clone())?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let len = self.file.metadata()?.len();
        if let Err(e) = self.write_entry(line.as_bytes()) {
            if let Err(rollback) = self.file.set_len(len).and_then(|()| self.file.sync_all()) {
                tracing::error!(
                    path = %self.path.display(),
                    sequence,
                    error = %rollback,
                    "could not roll back partial WAL entry"
                );
                self.poisoned = true;
            }
            return Err(e.into());
        }

        self.next_sequence += 1;
        Ok(sequence)
    }

    fn write_entry(&mut self, bytes: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        let torn = self.torn_write_at.take();
        #[cfg(not(test))]
        let torn: Option<usize> = None;
        if let Some(limit) = torn {
            self.file.write_all(&bytes[..limit.min(bytes.len())])?;
            return Err(io::Error::other("torn write"));
        }
        self.file.write_all(bytes)?;
        self.file.sync_all()
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all valid entries, stopping at the first corrupt one
    pub fn replay(path: &Path) -> Result<Vec<WalEntry>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            if line.is_empty() {
                continue;
            }
            match WalEntry::parse(&line) {
                Some(entry) => entries.push(entry),
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        after_sequence = ?entries.last().map(|e: &WalEntry| e.sequence),
                        "stopping replay at corrupt entry"
                    );
                    break;
                }
            }
        }
        Ok(entries)
    }

    /// Drop everything after the last valid entry
    ///
    /// Returns the number of lines removed. The file is rewritten through a
    /// temporary sibling and renamed into place.
    pub fn repair(path: &Path) -> Result<usize, WalError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = content.lines().collect();
        let valid = lines
            .iter()
            .take_while(|l| l.is_empty() || WalEntry::parse(l).is_some())
            .count();
        let dropped = lines.len() - valid;
        if dropped == 0 {
            return Ok(0);
        }

        let tmp = path.with_extension("repair");
        {
            let mut file = File::create(&tmp)?;
            for line in &lines[..valid] {
                if !line.is_empty() {
                    writeln!(file, "{line}")?;
                }
            }
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        tracing::warn!(path = %path.display(), dropped, "truncated corrupt WAL tail");
        Ok(dropped)
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;

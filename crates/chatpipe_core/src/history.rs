use crate::util::default_history_root;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// One generation attempt: the exact prompt sent and the exact code
/// received. The attempt's timestamp lives in the file name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    pub prompt: String,
    pub code: String,
}

/// Append-only store of generation attempts, one JSON file each.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pub root: PathBuf,
}

impl HistoryStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self { root: default_history_root()? })
    }

    /// Writes a record to a fresh timestamped file and returns its path.
    /// A same-second collision gets a numeric suffix; an existing record is
    /// never overwritten.
    pub fn write_record(&self, prompt: &str, code: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let ts = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let mut path = self.root.join(format!("transform_{ts}.json"));
        let mut n = 1usize;
        while path.exists() {
            n += 1;
            path = self.root.join(format!("transform_{ts}-{n}.json"));
        }
        let record = HistoryRecord { prompt: prompt.to_string(), code: code.to_string() };
        fs::write(&path, serde_json::to_vec_pretty(&record)?)
            .with_context(|| format!("write history record {}", path.display()))?;
        Ok(path)
    }

    pub fn read_record(&self, path: &PathBuf) -> Result<HistoryRecord> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
    }

    /// Most recent records first, by timestamped file name.
    pub fn list(&self, limit: usize) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }
        let mut records = vec![];
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                records.push(path);
            }
        }
        records.sort_by(|a, b| b.cmp(a));
        if records.len() > limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

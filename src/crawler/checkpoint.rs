//! Checkpoints: persisting a crawl session so it can be resumed.
//!
//! A [`Checkpoint`] is the state [`Snapshot`] plus what a resumed session
//! needs on top of it: the fingerprint store (so near-duplicates are still
//! caught after a restart) and the pending frontier. It is built while the
//! state lock is held and written after the lock is released.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::Fingerprint;
use crate::error::CheckpointError;
use crate::state::Snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    #[serde(default)]
    pub fingerprints: Vec<Fingerprint>,
    #[serde(default)]
    pub frontier: Vec<String>,
}

/// Persistence collaborator for a crawl session.
pub trait CheckpointSink: Send + Sync {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
}

/// Overwrites one JSON file per save. The file is written to a temporary
/// sibling first and renamed into place, so readers never see a partial
/// checkpoint.
#[derive(Debug, Clone)]
pub struct JsonCheckpointFile {
    path: PathBuf,
}

impl JsonCheckpointFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointSink for JsonCheckpointFile {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let temp = self.temp_path();
        let json = serde_json::to_vec(checkpoint)?;
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        debug!(
            "Checkpoint written to {} ({} visited)",
            self.path.display(),
            checkpoint.snapshot.visited.len()
        );
        Ok(())
    }
}

/// Keeps checkpoints in memory; useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryCheckpoint {
    saved: Mutex<Vec<Checkpoint>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Checkpoint> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }

    /// Every checkpoint saved so far, oldest first.
    pub fn history(&self) -> Vec<Checkpoint> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn save_count(&self) -> usize {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl CheckpointSink for MemoryCheckpoint {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(checkpoint.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LongestPage;

    fn sample() -> Checkpoint {
        let mut snapshot = Snapshot::default();
        snapshot.visited.push("https://www.ics.uci.edu/".to_string());
        snapshot.word_freq.insert("research".to_string(), 7);
        snapshot.subdomains.insert("https://www.ics.uci.edu".to_string(), 1);
        snapshot.longest_page = Some(LongestPage {
            url: "https://www.ics.uci.edu/".to_string(),
            token_count: 7,
        });
        Checkpoint {
            snapshot,
            fingerprints: vec![Fingerprint::from_bits(0xbeef, 16)],
            frontier: vec!["https://www.ics.uci.edu/about".to_string()],
        }
    }

    #[test]
    fn json_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonCheckpointFile::new(dir.path().join("crawl.json"));
        assert!(!sink.exists());

        sink.save(&sample()).unwrap();
        assert!(sink.exists());
        assert!(!dir.path().join("crawl.json.tmp").exists());
        assert_eq!(sink.load().unwrap(), sample());
    }

    #[test]
    fn saving_overwrites_the_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonCheckpointFile::new(dir.path().join("crawl.json"));
        sink.save(&Checkpoint::default()).unwrap();
        sink.save(&sample()).unwrap();
        assert_eq!(sink.load().unwrap().frontier.len(), 1);
    }

    #[test]
    fn snapshot_fields_sit_at_the_top_level() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("visited").is_some());
        assert!(json.get("wordFreq").is_some());
        assert!(json.get("longestPage").is_some());
        assert!(json.get("subdomains").is_some());
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonCheckpointFile::new(dir.path().join("missing").join("crawl.json"));
        assert!(matches!(sink.save(&sample()), Err(CheckpointError::Io(_))));
    }

    #[test]
    fn memory_sink_keeps_history() {
        let sink = MemoryCheckpoint::new();
        assert!(sink.latest().is_none());
        sink.save(&Checkpoint::default()).unwrap();
        sink.save(&sample()).unwrap();
        assert_eq!(sink.save_count(), 2);
        assert_eq!(sink.latest(), Some(sample()));
        assert_eq!(sink.history(), vec![Checkpoint::default(), sample()]);
    }
}

// Emotion history: a capped, JSON-persisted log of detected-face results

use crate::error::{MoodLensError, Result};
use crate::models::FrameAnalysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Storage key the history is kept under
pub const HISTORY_KEY: &str = "emotion_history";

/// Maximum number of retained entries
pub const DEFAULT_CAPACITY: usize = 100;

/// One persisted result for a frame in which a face was found
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionHistoryEntry {
    pub mood: String,
    pub confidence: f32,
    pub condition: String,
    pub lighting_status: String,
    pub timestamp: DateTime<Utc>,
}

impl EmotionHistoryEntry {
    /// Builds an entry from a frame analysis; `None` when no face was detected
    pub fn from_analysis(analysis: &FrameAnalysis, timestamp: DateTime<Utc>) -> Option<Self> {
        let condition = analysis.condition.as_ref()?;
        Some(Self {
            mood: analysis.mood.mood.to_string(),
            confidence: analysis.mood.confidence,
            condition: condition.label(),
            lighting_status: analysis
                .lighting
                .map(|l| l.status.to_string())
                .unwrap_or_default(),
            timestamp,
        })
    }
}

/// Key-value persistence backing the history
pub trait Storage: Send {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File storage: one `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates the storage, creating `dir` if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            MoodLensError::History(format!("Failed to create history directory {dir:?}: {e}"))
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Aggregate view over the stored history
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistorySummary {
    pub total: usize,
    pub mood_counts: BTreeMap<String, usize>,
    /// Most frequent mood; ties go to the alphabetically first label
    pub dominant_mood: Option<String>,
    pub average_confidence: f32,
}

/// Append-only history capped at `capacity` entries, oldest evicted first
pub struct HistoryStore<S: Storage> {
    storage: S,
    capacity: usize,
    entries: VecDeque<EmotionHistoryEntry>,
}

impl<S: Storage> HistoryStore<S> {
    /// Opens the history, loading any previously saved entries.
    ///
    /// Unreadable or corrupt history is logged and replaced by an empty one.
    pub fn open(storage: S, capacity: usize) -> Self {
        let mut entries = match storage.load(HISTORY_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<VecDeque<EmotionHistoryEntry>>(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Discarding corrupt emotion history: {}", e);
                    VecDeque::new()
                }
            },
            Ok(None) => VecDeque::new(),
            Err(e) => {
                warn!("Failed to load emotion history: {}", e);
                VecDeque::new()
            }
        };

        while entries.len() > capacity {
            entries.pop_front();
        }
        info!("Opened emotion history with {} entries", entries.len());

        Self {
            storage,
            capacity,
            entries,
        }
    }

    /// Appends an entry, evicting the oldest ones beyond capacity, and persists
    pub fn append(&mut self, entry: EmotionHistoryEntry) -> Result<()> {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.persist()
    }

    /// Records a frame analysis. Returns `false` (and stores nothing) when no
    /// face was detected.
    pub fn record(&mut self, analysis: &FrameAnalysis, timestamp: DateTime<Utc>) -> Result<bool> {
        match EmotionHistoryEntry::from_analysis(analysis, timestamp) {
            Some(entry) => {
                self.append(entry)?;
                Ok(true)
            }
            None => {
                debug!("No face in analysis, history unchanged");
                Ok(false)
            }
        }
    }

    /// Entries oldest first
    pub fn entries(&self) -> impl Iterator<Item = &EmotionHistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&EmotionHistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry and persists the empty history
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist()
    }

    /// Mood counts, dominant mood and mean confidence
    pub fn summary(&self) -> HistorySummary {
        let mut mood_counts = BTreeMap::new();
        for entry in &self.entries {
            *mood_counts.entry(entry.mood.clone()).or_insert(0) += 1;
        }

        let mut dominant_mood: Option<(&String, usize)> = None;
        for (mood, &count) in &mood_counts {
            if dominant_mood.map_or(true, |(_, best)| count > best) {
                dominant_mood = Some((mood, count));
            }
        }
        let dominant_mood = dominant_mood.map(|(mood, _)| mood.clone());

        let average_confidence = if self.entries.is_empty() {
            0.0
        } else {
            self.entries.iter().map(|e| e.confidence).sum::<f32>() / self.entries.len() as f32
        };

        HistorySummary {
            total: self.entries.len(),
            mood_counts,
            dominant_mood,
            average_confidence,
        }
    }

    fn persist(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.entries)?;
        self.storage
            .save(HISTORY_KEY, &json)
            .map_err(|e| MoodLensError::History(format!("Failed to save history: {e}")))
    }
}

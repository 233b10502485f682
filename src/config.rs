// Configuration loaded from TOML with environment overrides

use crate::camera::LensFacing;
use crate::error::{MoodLensError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Capture rates above this leave no time between frames
pub const MAX_TARGET_FPS: u32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodLensConfig {
    pub session: SessionConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum time between two accepted frames
    pub min_frame_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory of still images replayed as camera frames
    pub frames_dir: Option<PathBuf>,
    pub lens: LensFacing,
    pub target_fps: u32,
    /// Frames buffered between capture and analysis before new ones are dropped
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Recorded detector output to replay
    pub replay_path: Option<PathBuf>,
    /// Artificial per-detection latency
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub dir: PathBuf,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: PathBuf,
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_frame_interval_ms: 100,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frames_dir: None,
            lens: LensFacing::Front,
            target_fps: 30,
            channel_capacity: 20,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("mood_lens_data"),
            capacity: crate::history::DEFAULT_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("mood_lens.log"),
            filter: "info".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_millis(self.min_frame_interval_ms)
    }
}

impl CameraConfig {
    /// Delay between two captured frames at the target rate
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

impl MoodLensConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MoodLensConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads built-in defaults, then `path` if it exists, then environment
    /// overrides (prefixed `MOOD_LENS_`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {:?}", path);
                Self::from_file(path)?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(val) = env::var("MOOD_LENS_MIN_INTERVAL_MS") {
            self.session.min_frame_interval_ms = val.parse().map_err(|_| {
                MoodLensError::Config("Invalid MOOD_LENS_MIN_INTERVAL_MS".to_string())
            })?;
        }
        if let Ok(val) = env::var("MOOD_LENS_FRAMES_DIR") {
            self.camera.frames_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("MOOD_LENS_HISTORY_DIR") {
            self.history.dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("MOOD_LENS_DETECTOR_REPLAY") {
            self.detector.replay_path = Some(PathBuf::from(val));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.target_fps == 0 || self.camera.target_fps > MAX_TARGET_FPS {
            return Err(MoodLensError::Config(format!(
                "camera.target_fps must be in 1..={MAX_TARGET_FPS}"
            )));
        }
        if self.camera.channel_capacity == 0 {
            return Err(MoodLensError::Config(
                "camera.channel_capacity must be > 0".to_string(),
            ));
        }
        if self.history.capacity == 0 {
            return Err(MoodLensError::Config(
                "history.capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Export configuration to a TOML string
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

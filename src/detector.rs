// Face detector boundary and a replay backend for recorded detector output

use crate::error::{MoodLensError, Result};
use crate::models::{DetectedFaceSignals, DetectorInputFrame, PixelFormat};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Pluggable face detection backend.
///
/// Implementations receive an NV21 frame and return zero or more faces.
/// Callers only look at the first face.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, frame: DetectorInputFrame) -> Result<Vec<DetectedFaceSignals>>;
}

/// One recorded detector outcome
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ReplayStep {
    /// Faces returned for a frame (possibly none)
    Faces(Vec<DetectedFaceSignals>),
    /// The detector raised an error for a frame
    Failure { error: String },
}

/// Replays a recorded sequence of detector outcomes, one per call, cycling
/// back to the start once exhausted
pub struct ReplayDetector {
    steps: Vec<ReplayStep>,
    cursor: AtomicUsize,
    latency: Duration,
}

impl ReplayDetector {
    /// Creates a replay detector over the given steps
    pub fn new(steps: Vec<ReplayStep>) -> Self {
        Self {
            steps,
            cursor: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Loads a recording: a JSON array where each element is either an array
    /// of face objects or `{"error": "..."}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let steps: Vec<ReplayStep> = serde_json::from_str(&content)?;
        info!(
            "Loaded {} recorded detector steps from {:?}",
            steps.len(),
            path.as_ref()
        );
        Ok(Self::new(steps))
    }

    /// Delays every detection by `latency`, like a real model would
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of detections served so far
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceDetector for ReplayDetector {
    async fn detect(&self, frame: DetectorInputFrame) -> Result<Vec<DetectedFaceSignals>> {
        validate_input(&frame)?;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let call = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.steps.is_empty() {
            return Ok(Vec::new());
        }

        match &self.steps[call % self.steps.len()] {
            ReplayStep::Faces(faces) => {
                debug!(call, faces = faces.len(), "replayed detection");
                Ok(faces.clone())
            }
            ReplayStep::Failure { error } => Err(MoodLensError::FaceDetection(error.clone())),
        }
    }
}

/// Rejects buffers whose size does not match their declared NV21 geometry
pub fn validate_input(frame: &DetectorInputFrame) -> Result<()> {
    let expected = match frame.format {
        PixelFormat::Nv21 => frame.width as usize * frame.height as usize * 3 / 2,
    };
    if frame.bytes.len() != expected {
        return Err(MoodLensError::FaceDetection(format!(
            "NV21 buffer is {} bytes, {}x{} needs {}",
            frame.bytes.len(),
            frame.width,
            frame.height,
            expected
        )));
    }
    Ok(())
}

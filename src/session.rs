// Per-stream processing state: single-flight gate, throttle and teardown

use crate::classifier::classify;
use crate::decoder::{rotation_from_degrees, yuv420_to_nv21};
use crate::error::Result;
use crate::lighting::assess_lighting;
use crate::models::{
    CameraFrame, DetectedFaceSignals, DetectorInputFrame, FrameAnalysis, LightingAssessment,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Admits at most one frame at a time, and none sooner than `min_interval`
/// after the previously admitted one
#[derive(Debug)]
pub struct FrameGate {
    busy: bool,
    last_accepted: Option<Instant>,
    min_interval: Duration,
}

impl FrameGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            busy: false,
            last_accepted: None,
            min_interval,
        }
    }

    /// Marks the gate busy and returns true if a frame arriving at `now` may proceed
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.busy {
            return false;
        }
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.busy = true;
        self.last_accepted = Some(now);
        true
    }

    pub fn release(&mut self) {
        self.busy = false;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

/// Frame counters for one session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub accepted: usize,
    pub dropped: usize,
    pub failed: usize,
    pub faces: usize,
    pub no_face: usize,
    pub discarded: usize,
}

/// State owned by one frame stream: the gate, the lighting of the frame in
/// flight, the last published analysis and whether the owner is still alive
#[derive(Debug)]
pub struct AnalysisSession {
    gate: FrameGate,
    lighting: Option<LightingAssessment>,
    latest: Option<FrameAnalysis>,
    mounted: bool,
    stats: SessionStats,
}

impl AnalysisSession {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            gate: FrameGate::new(min_interval),
            lighting: None,
            latest: None,
            mounted: true,
            stats: SessionStats::default(),
        }
    }

    /// Lets a frame through the gate, assesses its lighting and relayouts it
    /// for the detector. Returns `None` when the frame is dropped.
    pub fn admit(&mut self, frame: &CameraFrame, now: Instant) -> Option<DetectorInputFrame> {
        if !self.mounted {
            return None;
        }
        if !self.gate.try_acquire(now) {
            self.stats.dropped += 1;
            return None;
        }
        self.stats.accepted += 1;

        self.lighting = Some(assess_lighting(&frame.frame.y.bytes));
        let rotation = rotation_from_degrees(frame.sensor_orientation);
        match yuv420_to_nv21(&frame.frame, rotation) {
            Ok(input) => Some(input),
            Err(e) => {
                error!("Frame conversion failed: {}", e);
                self.stats.failed += 1;
                self.gate.release();
                None
            }
        }
    }

    /// Applies the detector outcome for the admitted frame.
    ///
    /// The gate is released whatever the outcome. Failures are logged and
    /// the frame skipped; results arriving after teardown are discarded.
    pub fn complete(
        &mut self,
        outcome: Result<Vec<DetectedFaceSignals>>,
    ) -> Option<FrameAnalysis> {
        self.gate.release();

        if !self.mounted {
            self.stats.discarded += 1;
            debug!("Session torn down, discarding analysis");
            return None;
        }

        let faces = match outcome {
            Ok(faces) => faces,
            Err(e) => {
                error!("Face detection failed: {}", e);
                self.stats.failed += 1;
                return None;
            }
        };

        let lighting = self.lighting.take()?;
        let analysis = classify(faces.first(), &lighting);
        if analysis.has_face() {
            self.stats.faces += 1;
        } else {
            self.stats.no_face += 1;
        }
        self.latest = Some(analysis.clone());
        Some(analysis)
    }

    /// Marks the owner as gone; pending and future results are discarded
    pub fn unmount(&mut self) {
        if self.mounted {
            info!("Analysis session torn down");
        }
        self.mounted = false;
    }

    /// Pins the displayed result to the permission-denied message
    pub fn deny_permission(&mut self) -> FrameAnalysis {
        let analysis = FrameAnalysis::permission_denied();
        self.latest = Some(analysis.clone());
        analysis
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Last published analysis
    pub fn latest(&self) -> Option<&FrameAnalysis> {
        self.latest.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

// Frame analysis pipeline: camera frames in, published analyses out

use crate::detector::FaceDetector;
use crate::error::Result;
use crate::history::{HistoryStore, Storage};
use crate::models::{CameraFrame, DetectedFaceSignals, FrameAnalysis};
use crate::session::{AnalysisSession, SessionStats};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};

type Detection<'a> = Pin<Box<dyn Future<Output = Result<Vec<DetectedFaceSignals>>> + Send + 'a>>;

/// Runs frames through lighting estimation, the face detector and the
/// classifier, one frame at a time
pub struct Pipeline<D: FaceDetector, S: Storage> {
    session: AnalysisSession,
    detector: D,
    history: HistoryStore<S>,
    result_sender: broadcast::Sender<FrameAnalysis>,
}

impl<D: FaceDetector, S: Storage> Pipeline<D, S> {
    pub fn new(
        detector: D,
        history: HistoryStore<S>,
        min_frame_interval: Duration,
        result_sender: broadcast::Sender<FrameAnalysis>,
    ) -> Self {
        Self {
            session: AnalysisSession::new(min_frame_interval),
            detector,
            history,
            result_sender,
        }
    }

    pub fn session(&self) -> &AnalysisSession {
        &self.session
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    /// Publishes the permission-denied result; the pipeline is not started
    pub fn report_permission_denied(&mut self) {
        let analysis = self.session.deny_permission();
        publish(&self.result_sender, analysis);
    }

    /// Processes frames until the frame channel closes or teardown is
    /// signalled on `shutdown` (a `true` value, or the sender being dropped).
    ///
    /// Frames arriving while a detection is in flight, or sooner than the
    /// minimum interval, are dropped. On teardown the in-flight detection is
    /// abandoned and its result never applied.
    pub async fn run(
        &mut self,
        mut frames: mpsc::Receiver<CameraFrame>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionStats {
        let Self {
            session,
            detector,
            history,
            result_sender,
        } = self;
        let detector: &D = detector;

        if *shutdown.borrow_and_update() {
            session.unmount();
            info!("Teardown signalled before the pipeline started");
            return session.stats();
        }

        let mut in_flight: Option<Detection<'_>> = None;
        let mut frames_open = true;

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        session.unmount();
                        if in_flight.take().is_some() {
                            info!("Abandoning in-flight detection on teardown");
                        }
                        break;
                    }
                }

                outcome = async {
                    match in_flight.as_mut() {
                        Some(detection) => detection.await,
                        None => std::future::pending().await,
                    }
                } => {
                    in_flight = None;
                    if let Some(analysis) = session.complete(outcome) {
                        if analysis.has_face() {
                            if let Err(e) = history.record(&analysis, Utc::now()) {
                                error!("Failed to record emotion history: {}", e);
                            }
                        }
                        publish(result_sender, analysis);
                    }
                }

                frame = frames.recv(), if frames_open => {
                    match frame {
                        Some(frame) => {
                            if let Some(input) = session.admit(&frame, Instant::now()) {
                                in_flight = Some(detector.detect(input));
                            }
                        }
                        None => frames_open = false,
                    }
                }
            }

            if !frames_open && in_flight.is_none() {
                break;
            }
        }

        let stats = session.stats();
        info!(
            "Pipeline stopped: {} accepted, {} dropped, {} failed, {} faces, {} without face",
            stats.accepted, stats.dropped, stats.failed, stats.faces, stats.no_face
        );
        stats
    }
}

fn publish(sender: &broadcast::Sender<FrameAnalysis>, analysis: FrameAnalysis) {
    if let Err(e) = sender.send(analysis) {
        warn!("No listener for analysis result: {}", e);
    }
}

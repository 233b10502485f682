use mood_lens::detector::{ReplayDetector, ReplayStep};
use mood_lens::history::{FileStorage, HistoryStore, MemoryStorage, DEFAULT_CAPACITY};
use mood_lens::pipeline::Pipeline;
use mood_lens::{CameraFrame, DetectedFaceSignals, FrameAnalysis, Mood, RawFrame};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

fn frame(luma: u8) -> CameraFrame {
    CameraFrame {
        frame: RawFrame::from_packed(8, 8, vec![luma; 64], vec![128; 16], vec![128; 16]),
        sensor_orientation: 90,
    }
}

fn smiling_face() -> ReplayStep {
    ReplayStep::Faces(vec![DetectedFaceSignals {
        smiling_probability: Some(0.9),
        left_eye_open_probability: Some(0.9),
        right_eye_open_probability: Some(0.9),
        ..Default::default()
    }])
}

fn pipeline(
    steps: Vec<ReplayStep>,
    latency: Duration,
    min_interval: Duration,
) -> (
    Pipeline<ReplayDetector, MemoryStorage>,
    broadcast::Receiver<FrameAnalysis>,
) {
    let (tx, rx) = broadcast::channel(64);
    let detector = ReplayDetector::new(steps).with_latency(latency);
    let history = HistoryStore::open(MemoryStorage::default(), DEFAULT_CAPACITY);
    (Pipeline::new(detector, history, min_interval, tx), rx)
}

fn drain(rx: &mut broadcast::Receiver<FrameAnalysis>) -> Vec<FrameAnalysis> {
    let mut out = Vec::new();
    while let Ok(analysis) = rx.try_recv() {
        out.push(analysis);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn processes_each_frame_when_detector_keeps_up() {
    let (mut pipeline, mut results) = pipeline(vec![smiling_face()], Duration::ZERO, Duration::ZERO);
    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown) = watch::channel(false);

    for luma in [128, 128, 10] {
        frame_tx.send(frame(luma)).await.unwrap();
    }
    drop(frame_tx);

    let stats = pipeline.run(frame_rx, shutdown).await;
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.dropped, 0);

    let published = drain(&mut results);
    assert_eq!(published.len(), 3);
    assert_eq!(published[0].mood.mood, Mood::VeryHappy);
    assert!((published[0].mood.confidence - 0.9).abs() < 1e-5);
    assert!((published[2].mood.confidence - 0.72).abs() < 1e-5);
    assert_eq!(pipeline.history().len(), 3);
    assert_eq!(
        pipeline.history().latest().unwrap().condition,
        "Normal (Low Light)"
    );
}

#[tokio::test(start_paused = true)]
async fn frames_arriving_mid_analysis_are_dropped() {
    let (mut pipeline, mut results) = pipeline(
        vec![smiling_face()],
        Duration::from_millis(50),
        Duration::ZERO,
    );
    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown) = watch::channel(false);

    for _ in 0..3 {
        frame_tx.send(frame(128)).await.unwrap();
    }
    drop(frame_tx);

    let stats = pipeline.run(frame_rx, shutdown).await;
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.dropped, 2);
    assert_eq!(pipeline.detector().calls(), 1);
    assert_eq!(drain(&mut results).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn minimum_interval_throttles_accepted_frames() {
    let (mut pipeline, _results) = pipeline(
        vec![smiling_face()],
        Duration::ZERO,
        Duration::from_millis(100),
    );
    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown) = watch::channel(false);

    let producer = async move {
        // frames at t = 40 and 80 ms fall inside the first interval; 0, 150 and 300 pass
        for delay in [0, 40, 40, 70, 150] {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            frame_tx.send(frame(128)).await.unwrap();
        }
    };

    let ((), stats) = tokio::join!(producer, pipeline.run(frame_rx, shutdown));
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.dropped, 2);
}

#[tokio::test(start_paused = true)]
async fn no_face_is_published_but_not_recorded() {
    let (mut pipeline, mut results) =
        pipeline(vec![ReplayStep::Faces(vec![])], Duration::ZERO, Duration::ZERO);
    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown) = watch::channel(false);

    frame_tx.send(frame(128)).await.unwrap();
    drop(frame_tx);

    let stats = pipeline.run(frame_rx, shutdown).await;
    assert_eq!(stats.no_face, 1);

    let published = drain(&mut results);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].mood.mood, Mood::NoFace);
    assert_eq!(published[0].mood.confidence, 0.0);
    assert!(published[0].condition.is_none());
    assert!(pipeline.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn detector_failure_skips_frame_and_recovers() {
    let (mut pipeline, mut results) = pipeline(
        vec![
            ReplayStep::Failure {
                error: "native exception".to_string(),
            },
            smiling_face(),
        ],
        Duration::ZERO,
        Duration::ZERO,
    );
    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown) = watch::channel(false);

    frame_tx.send(frame(128)).await.unwrap();
    frame_tx.send(frame(128)).await.unwrap();
    drop(frame_tx);

    let stats = pipeline.run(frame_rx, shutdown).await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.faces, 1);
    assert!(!pipeline.session().is_busy());

    let published = drain(&mut results);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].mood.mood, Mood::VeryHappy);
}

#[tokio::test(start_paused = true)]
async fn teardown_discards_in_flight_result() {
    let (mut pipeline, mut results) = pipeline(
        vec![smiling_face()],
        Duration::from_secs(1),
        Duration::ZERO,
    );
    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown) = watch::channel(false);

    frame_tx.send(frame(128)).await.unwrap();

    let controller = async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();
        // keep the frame channel open so only teardown can stop the run
        frame_tx
    };

    let (_frame_tx, stats) = tokio::join!(controller, pipeline.run(frame_rx, shutdown));
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.faces, 0);
    assert!(!pipeline.session().is_mounted());
    assert!(pipeline.session().latest().is_none());
    assert!(drain(&mut results).is_empty());
    assert!(pipeline.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn teardown_before_start_processes_nothing() {
    let (mut pipeline, mut results) = pipeline(vec![smiling_face()], Duration::ZERO, Duration::ZERO);
    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (shutdown_tx, _initial) = watch::channel(false);
    shutdown_tx.send(true).unwrap();
    let shutdown = shutdown_tx.subscribe();

    frame_tx.send(frame(128)).await.unwrap();

    let stats = pipeline.run(frame_rx, shutdown).await;
    assert_eq!(stats.accepted, 0);
    assert_eq!(pipeline.detector().calls(), 0);
    assert!(!pipeline.session().is_mounted());
    assert!(drain(&mut results).is_empty());
    assert!(pipeline.history().is_empty());
}

#[tokio::test]
async fn permission_denied_is_published() {
    let (mut pipeline, mut results) = pipeline(vec![], Duration::ZERO, Duration::ZERO);
    pipeline.report_permission_denied();
    let published = drain(&mut results);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].mood.mood, Mood::PermissionDenied);
    assert_eq!(published[0].mood.mood.to_string(), "Permission Denied");
}

#[tokio::test(start_paused = true)]
async fn history_survives_restart_and_stays_capped() {
    let dir = tempfile::tempdir().unwrap();
    for _ in 0..2 {
        let (tx, _rx) = broadcast::channel(4);
        let history = HistoryStore::open(FileStorage::new(dir.path()).unwrap(), 5);
        let detector = ReplayDetector::new(vec![smiling_face()]);
        let mut pipeline = Pipeline::new(detector, history, Duration::ZERO, tx);

        let (frame_tx, frame_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown) = watch::channel(false);
        for _ in 0..4 {
            frame_tx.send(frame(128)).await.unwrap();
        }
        drop(frame_tx);
        pipeline.run(frame_rx, shutdown).await;
    }

    let history = HistoryStore::open(FileStorage::new(dir.path()).unwrap(), 5);
    assert_eq!(history.len(), 5);
    assert!(history.entries().all(|e| e.mood == "Very Happy"));
}

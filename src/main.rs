use mood_lens::camera::{CameraManager, ImageSequenceSource, Permission, StaticPermission};
use mood_lens::config::{LoggingConfig, MoodLensConfig};
use mood_lens::detector::ReplayDetector;
use mood_lens::history::{FileStorage, HistoryStore};
use mood_lens::pipeline::Pipeline;
use mood_lens::{FrameAnalysis, MoodLensError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system (file only, no console output)
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_file = std::fs::File::create(&config.file).map_err(MoodLensError::Io)?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    Ok(())
}

fn describe(analysis: &FrameAnalysis) -> String {
    let mut line = analysis.mood.to_string();
    if let Some(condition) = &analysis.condition {
        line.push_str(&format!(" | {} ({}%)", condition, condition.confidence_percent()));
    }
    if let Some(lighting) = &analysis.lighting {
        line.push_str(&format!(
            " | {} (brightness {:.2}, contrast {:.2})",
            lighting.status, lighting.brightness, lighting.contrast
        ));
    }
    line
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("mood_lens.toml"));
    let config = MoodLensConfig::load(Some(&config_path))?;
    init_logging(&config.logging)?;

    let frames_dir = config
        .camera
        .frames_dir
        .clone()
        .ok_or_else(|| MoodLensError::Config("camera.frames_dir is not set".to_string()))?;

    let detector = match &config.detector.replay_path {
        Some(path) => ReplayDetector::from_file(path)?,
        None => {
            warn!("No detector recording configured, every frame reports no face");
            ReplayDetector::new(Vec::new())
        }
    }
    .with_latency(Duration::from_millis(config.detector.latency_ms));

    let history = HistoryStore::open(
        FileStorage::new(&config.history.dir)?,
        config.history.capacity,
    );

    let (result_sender, mut result_receiver) = broadcast::channel(32);
    let mut pipeline = Pipeline::new(
        detector,
        history,
        config.session.min_frame_interval(),
        result_sender,
    );

    let display = tokio::spawn(async move {
        loop {
            match result_receiver.recv().await {
                Ok(analysis) => println!("{}", describe(&analysis)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Display lagged behind by {} results", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let source = ImageSequenceSource::from_dir(&frames_dir)?;
    let mut camera = CameraManager::new(
        source,
        Box::new(StaticPermission(Permission::Granted)),
        config.camera.lens,
    );

    match camera.ensure_stream_open() {
        Ok(()) => {
            let (frame_sender, frame_receiver) = mpsc::channel(config.camera.channel_capacity);
            let (shutdown_sender, shutdown) = watch::channel(false);

            let (capture, stats) = tokio::join!(
                camera.start_capture(frame_sender, config.camera.frame_duration()),
                pipeline.run(frame_receiver, shutdown),
            );
            if let Err(e) = capture {
                error!("Capture stopped with error: {}", e);
            }
            drop(shutdown_sender);

            info!("Session finished: {:?}", stats);
            println!(
                "Frames: {} analyzed, {} dropped, {} failed",
                stats.accepted, stats.dropped, stats.failed
            );
        }
        Err(MoodLensError::CameraAccessDenied) => pipeline.report_permission_denied(),
        Err(e) => {
            error!("Camera initialization failed: {}", e);
            println!("Camera not initialized: {e}");
        }
    }

    let summary = pipeline.history().summary();
    println!(
        "History: {} entries, dominant mood {}, mean confidence {:.0}%",
        summary.total,
        summary.dominant_mood.as_deref().unwrap_or("-"),
        summary.average_confidence * 100.0
    );

    drop(pipeline);
    if let Err(e) = display.await {
        error!("Display task failed: {}", e);
    }

    Ok(())
}

// Library exports for mood-lens - camera frame mood analysis

pub mod camera;
pub mod classifier;
pub mod config;
pub mod decoder;
pub mod detector;
pub mod error;
pub mod history;
pub mod lighting;
pub mod models;
pub mod pipeline;
pub mod session;

pub use error::{MoodLensError, Result};
pub use models::{
    CameraFrame, ConditionResult, DetectedFaceSignals, DetectorInputFrame, FrameAnalysis,
    LightingAssessment, LightingStatus, Mood, MoodResult, RawFrame, Rotation,
};

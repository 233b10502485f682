// Core data models for the frame analysis pipeline

use serde::{Deserialize, Serialize};

/// One image plane with its memory layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    /// Raw plane bytes
    pub bytes: Vec<u8>,
    /// Distance in bytes between the starts of two consecutive rows
    pub row_stride: usize,
    /// Distance in bytes between two consecutive samples of a row
    pub pixel_stride: usize,
}

impl Plane {
    /// Creates a tightly packed plane (pixel stride 1, row stride = `width`)
    pub fn packed(bytes: Vec<u8>, width: usize) -> Self {
        Self {
            bytes,
            row_stride: width,
            pixel_stride: 1,
        }
    }

    /// Returns the sample at (`row`, `col`), if the plane holds it
    pub fn sample(&self, row: usize, col: usize) -> Option<u8> {
        self.bytes
            .get(row * self.row_stride + col * self.pixel_stride)
            .copied()
    }
}

/// A planar YUV 4:2:0 camera capture
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Luma plane
    pub y: Plane,
    /// Cb chroma plane (quarter resolution)
    pub u: Plane,
    /// Cr chroma plane (quarter resolution)
    pub v: Plane,
}

impl RawFrame {
    /// Creates a frame from three tightly packed planes
    pub fn from_packed(width: u32, height: u32, y: Vec<u8>, u: Vec<u8>, v: Vec<u8>) -> Self {
        let chroma_width = (width / 2) as usize;
        Self {
            width,
            height,
            y: Plane::packed(y, width as usize),
            u: Plane::packed(u, chroma_width),
            v: Plane::packed(v, chroma_width),
        }
    }

    /// Number of luma samples (`width * height`)
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A frame as delivered by a camera source, with its sensor orientation
#[derive(Clone, Debug)]
pub struct CameraFrame {
    pub frame: RawFrame,
    /// Sensor orientation in degrees, as reported by the device
    pub sensor_orientation: i32,
}

/// Rotation the detector must apply to bring the frame upright
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation in degrees
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// Pixel layout tag passed along with detector input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Y plane followed by interleaved V/U pairs
    Nv21,
}

/// The interleaved buffer handed to the face detector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectorInputFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub format: PixelFormat,
}

/// Per-face probabilities and angles reported by the detector.
///
/// Every field is independently optional; a missing value means the
/// detector could not estimate it for this frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectedFaceSignals {
    pub smiling_probability: Option<f32>,
    pub left_eye_open_probability: Option<f32>,
    pub right_eye_open_probability: Option<f32>,
    /// Head yaw in degrees
    pub head_euler_angle_y: Option<f32>,
    /// Head roll in degrees
    pub head_euler_angle_z: Option<f32>,
}

impl DetectedFaceSignals {
    /// Mean of the available eye-open probabilities, `None` when neither eye is known
    pub fn eye_openness(&self) -> Option<f32> {
        match (
            self.left_eye_open_probability,
            self.right_eye_open_probability,
        ) {
            (Some(left), Some(right)) => Some((left + right) / 2.0),
            (Some(one), None) | (None, Some(one)) => Some(one),
            (None, None) => None,
        }
    }

    /// True when yaw or roll magnitude exceeds `limit` degrees
    pub fn head_turned_beyond(&self, limit: f32) -> bool {
        let yaw = self.head_euler_angle_y.unwrap_or(0.0);
        let roll = self.head_euler_angle_z.unwrap_or(0.0);
        yaw.abs() > limit || roll.abs() > limit
    }
}

/// Ambient lighting classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightingStatus {
    Low,
    Good,
    TooBright,
}

impl std::fmt::Display for LightingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LightingStatus::Low => write!(f, "Low Light"),
            LightingStatus::Good => write!(f, "Good Lighting"),
            LightingStatus::TooBright => write!(f, "Too Bright"),
        }
    }
}

/// Lighting estimate for a single frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightingAssessment {
    pub status: LightingStatus,
    /// Mean sampled luma, normalized to [0, 1]
    pub brightness: f32,
    /// Mean absolute delta between consecutive samples, normalized to [0, 1]
    pub contrast: f32,
    pub is_low_light: bool,
}

/// Mood vocabulary shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mood {
    Analyzing,
    Tired,
    Stressed,
    VeryHappy,
    Happy,
    Sad,
    LookingAway,
    Neutral,
    NoFace,
    PermissionDenied,
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mood::Analyzing => write!(f, "Analyzing..."),
            Mood::Tired => write!(f, "Tired"),
            Mood::Stressed => write!(f, "Stressed"),
            Mood::VeryHappy => write!(f, "Very Happy"),
            Mood::Happy => write!(f, "Happy"),
            Mood::Sad => write!(f, "Sad"),
            Mood::LookingAway => write!(f, "Looking Away"),
            Mood::Neutral => write!(f, "Neutral"),
            Mood::NoFace => write!(f, "No face detected"),
            Mood::PermissionDenied => write!(f, "Permission Denied"),
        }
    }
}

/// Mood label with its confidence
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoodResult {
    pub mood: Mood,
    /// Confidence level (0.0 to 1.0)
    pub confidence: f32,
}

impl MoodResult {
    /// Creates a new MoodResult, clamping confidence into [0, 1]
    pub fn new(mood: Mood, confidence: f32) -> Self {
        Self {
            mood,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Returns the confidence as a percentage (0-100)
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence * 100.0).round() as u8
    }
}

impl std::fmt::Display for MoodResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}% confidence)",
            self.mood,
            self.confidence_percent()
        )
    }
}

/// Physical condition inferred from eyes and head pose
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    Normal,
    Fatigued,
    Tired,
    Distracted,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Normal => write!(f, "Normal"),
            Condition::Fatigued => write!(f, "Fatigued"),
            Condition::Tired => write!(f, "Tired"),
            Condition::Distracted => write!(f, "Distracted"),
        }
    }
}

/// Lighting suffix appended to a condition label
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightQualifier {
    LowLight,
    BrightLight,
}

impl LightQualifier {
    fn suffix(self) -> &'static str {
        match self {
            LightQualifier::LowLight => " (Low Light)",
            LightQualifier::BrightLight => " (Bright Light)",
        }
    }
}

/// Condition label with optional lighting qualifier and confidence
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConditionResult {
    pub condition: Condition,
    pub qualifier: Option<LightQualifier>,
    /// Confidence level (0.0 to 1.0)
    pub confidence: f32,
}

impl ConditionResult {
    /// Full display label, e.g. "Fatigued (Low Light)"
    pub fn label(&self) -> String {
        match self.qualifier {
            Some(qualifier) => format!("{}{}", self.condition, qualifier.suffix()),
            None => self.condition.to_string(),
        }
    }

    /// Returns the confidence as a percentage (0-100)
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence * 100.0).round() as u8
    }
}

impl std::fmt::Display for ConditionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Everything the pipeline publishes for one processed frame
#[derive(Clone, Debug, PartialEq)]
pub struct FrameAnalysis {
    pub mood: MoodResult,
    /// `None` when no face was detected
    pub condition: Option<ConditionResult>,
    pub lighting: Option<LightingAssessment>,
}

impl FrameAnalysis {
    /// Result shown when the detector found no face
    pub fn no_face(lighting: Option<LightingAssessment>) -> Self {
        Self {
            mood: MoodResult::new(Mood::NoFace, 0.0),
            condition: None,
            lighting,
        }
    }

    /// Result pinned on screen once camera permission is refused
    pub fn permission_denied() -> Self {
        Self {
            mood: MoodResult::new(Mood::PermissionDenied, 0.0),
            condition: None,
            lighting: None,
        }
    }

    /// Whether this result describes an actual face and belongs in history
    pub fn has_face(&self) -> bool {
        self.condition.is_some()
    }
}

// Rule-based mood and condition classification from detector signals
//
// Both classifiers are ordered rule tables. Every rule whose predicate holds
// overwrites the running result, so among matching rules the last one wins.

use crate::lighting::{LOW_LIGHT_THRESHOLD, TOO_BRIGHT_THRESHOLD};
use crate::models::{
    Condition, ConditionResult, DetectedFaceSignals, FrameAnalysis, LightQualifier,
    LightingAssessment, Mood, MoodResult,
};

/// Yaw or roll magnitude, in degrees, beyond which the head counts as turned away
pub const HEAD_TURN_LIMIT_DEG: f32 = 20.0;

/// Confidence multiplier applied to the mood when the frame is in low light
pub const LOW_LIGHT_MOOD_DISCOUNT: f32 = 0.8;

/// Mood reported when a face is present but no rule matches
const BASELINE_MOOD: MoodResult = MoodResult {
    mood: Mood::Neutral,
    confidence: 0.5,
};

const BASELINE_CONDITION: (Condition, f32) = (Condition::Normal, 1.0);

/// Signals the mood rules look at, once smiling probability is known
#[derive(Clone, Copy, Debug)]
pub struct MoodInputs {
    pub smile: f32,
    pub eye_openness: Option<f32>,
    pub head_turned: bool,
}

/// A named mood rule: returns the mood it asserts, if its predicate holds
pub struct MoodRule {
    pub name: &'static str,
    pub apply: fn(&MoodInputs) -> Option<MoodResult>,
}

/// Mood rules in evaluation order
pub const MOOD_RULES: &[MoodRule] = &[
    MoodRule {
        name: "eyes closing",
        apply: |m| {
            let eyes = m.eye_openness?;
            (eyes < 0.3).then(|| MoodResult::new(Mood::Tired, 1.0 - eyes))
        },
    },
    MoodRule {
        name: "half-closed eyes without smile",
        apply: |m| {
            let eyes = m.eye_openness?;
            ((0.3..0.5).contains(&eyes) && m.smile < 0.3)
                .then(|| MoodResult::new(Mood::Stressed, 0.8))
        },
    },
    MoodRule {
        name: "broad smile",
        apply: |m| (m.smile > 0.8).then(|| MoodResult::new(Mood::VeryHappy, m.smile)),
    },
    MoodRule {
        name: "smile",
        apply: |m| {
            (m.smile > 0.5 && m.smile <= 0.8).then(|| MoodResult::new(Mood::Happy, m.smile))
        },
    },
    MoodRule {
        name: "no smile",
        apply: |m| (m.smile < 0.2).then(|| MoodResult::new(Mood::Sad, 1.0 - m.smile)),
    },
    MoodRule {
        name: "head turned",
        apply: |m| m.head_turned.then(|| MoodResult::new(Mood::LookingAway, 0.8)),
    },
];

/// Signals the condition rules look at
#[derive(Clone, Copy, Debug)]
pub struct ConditionInputs {
    pub eye_openness: Option<f32>,
    pub head_turned: bool,
}

/// A named condition rule
pub struct ConditionRule {
    pub name: &'static str,
    pub apply: fn(&ConditionInputs) -> Option<(Condition, f32)>,
}

/// Condition rules in evaluation order
pub const CONDITION_RULES: &[ConditionRule] = &[
    ConditionRule {
        name: "eyes closing",
        apply: |c| {
            let eyes = c.eye_openness?;
            (eyes < 0.3).then_some((Condition::Fatigued, 1.0 - eyes))
        },
    },
    ConditionRule {
        name: "half-closed eyes",
        apply: |c| {
            let eyes = c.eye_openness?;
            (0.3..0.5).contains(&eyes).then_some((Condition::Tired, 0.8))
        },
    },
    ConditionRule {
        name: "head turned",
        apply: |c| c.head_turned.then_some((Condition::Distracted, 0.9)),
    },
];

/// Classifies the mood of a detected face.
///
/// Unknown smiling probability short-circuits to "Analyzing..." with zero
/// confidence. Otherwise the rule table runs and low light discounts the
/// winning confidence.
pub fn classify_mood(signals: &DetectedFaceSignals, is_low_light: bool) -> MoodResult {
    let Some(smile) = signals.smiling_probability else {
        return MoodResult::new(Mood::Analyzing, 0.0);
    };

    let inputs = MoodInputs {
        smile,
        eye_openness: signals.eye_openness(),
        head_turned: signals.head_turned_beyond(HEAD_TURN_LIMIT_DEG),
    };

    let mut result = MOOD_RULES
        .iter()
        .filter_map(|rule| (rule.apply)(&inputs))
        .last()
        .unwrap_or(BASELINE_MOOD);

    if is_low_light {
        result = MoodResult::new(result.mood, result.confidence * LOW_LIGHT_MOOD_DISCOUNT);
    }
    result
}

/// Classifies the physical condition of a detected face, qualified by lighting
pub fn classify_condition(signals: &DetectedFaceSignals, brightness: f32) -> ConditionResult {
    let inputs = ConditionInputs {
        eye_openness: signals.eye_openness(),
        head_turned: signals.head_turned_beyond(HEAD_TURN_LIMIT_DEG),
    };

    let (condition, mut confidence) = CONDITION_RULES
        .iter()
        .filter_map(|rule| (rule.apply)(&inputs))
        .last()
        .unwrap_or(BASELINE_CONDITION);

    let qualifier = if brightness < LOW_LIGHT_THRESHOLD {
        confidence *= 0.8;
        Some(LightQualifier::LowLight)
    } else if brightness > TOO_BRIGHT_THRESHOLD {
        confidence *= 0.9;
        Some(LightQualifier::BrightLight)
    } else {
        None
    };

    ConditionResult {
        condition,
        qualifier,
        confidence: confidence.clamp(0.0, 1.0),
    }
}

/// Classifies the first detected face, or reports that none was found
pub fn classify(face: Option<&DetectedFaceSignals>, lighting: &LightingAssessment) -> FrameAnalysis {
    match face {
        Some(signals) => FrameAnalysis {
            mood: classify_mood(signals, lighting.is_low_light),
            condition: Some(classify_condition(signals, lighting.brightness)),
            lighting: Some(*lighting),
        },
        None => FrameAnalysis::no_face(Some(*lighting)),
    }
}

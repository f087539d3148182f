//! Recorded keyframe animations ("emotions")
//!
//! An [`Emotion`] is validated once at load time and then shared read-only
//! through `Arc` by every playback. Asset files are JSON:
//!
//! ```json
//! {
//!   "description": "curious head tilt",
//!   "time": [0.0, 0.5, 1.0],
//!   "set_target_data": [
//!     { "head": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]],
//!       "antennas": [0.0, 0.0], "body_yaw": 0.0, "check_collision": false }
//!   ]
//! }
//! ```
//!
//! A `.wav` file with the same stem next to the JSON marks the emotion as
//! having sound.

mod evaluator;

pub use evaluator::{evaluate, evaluate_with_limits, interpolate_keyframes};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::math::rotation::{matrix_to_rpy, pose_matrix};
use crate::math::{Matrix4, Offset, Pose};
use crate::{Error, Result};

/// One recorded animation sample
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    /// Head pose as a homogeneous transform
    pub head: Matrix4,
    /// Antenna angles (left, right) in radians
    pub antennas: [f64; 2],
    /// Body yaw in radians
    pub body_yaw: f64,
    /// Whether the recorder asked for collision checking at this sample
    pub check_collision: bool,
}

impl Keyframe {
    /// Build a keyframe from a pose (identity translation)
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            head: pose_matrix(&pose.head, [0.0; 3]),
            antennas: pose.antennas,
            body_yaw: pose.body_yaw,
            check_collision: false,
        }
    }

    /// Head rotation as roll/pitch/yaw (unclamped)
    pub fn head_rpy(&self) -> Offset {
        matrix_to_rpy(&self.head)
    }

    /// Full pose of this keyframe (unclamped)
    pub fn pose(&self) -> Pose {
        Pose::new(self.head_rpy(), self.antennas, self.body_yaw)
    }
}

impl Default for Keyframe {
    fn default() -> Self {
        Self::from_pose(&Pose::NEUTRAL)
    }
}

/// An immutable keyframe animation
#[derive(Debug, Clone)]
pub struct Emotion {
    name: String,
    description: String,
    duration: f64,
    keyframes: Vec<Keyframe>,
    timestamps: Vec<f64>,
    sound_ref: Option<PathBuf>,
}

#[derive(Deserialize)]
struct RawKeyframe {
    head: [[f64; 4]; 4],
    #[serde(default)]
    antennas: [f64; 2],
    #[serde(default)]
    body_yaw: f64,
    #[serde(default)]
    check_collision: bool,
}

#[derive(Deserialize)]
struct RawEmotion {
    #[serde(default)]
    description: String,
    time: Vec<f64>,
    #[serde(alias = "keyframes")]
    set_target_data: Vec<RawKeyframe>,
}

impl From<RawKeyframe> for Keyframe {
    fn from(raw: RawKeyframe) -> Self {
        // JSON stores rows; nalgebra's from_fn takes (row, col)
        let head = Matrix4::from_fn(|r, c| raw.head[r][c]);
        Self {
            head,
            antennas: raw.antennas,
            body_yaw: raw.body_yaw,
            check_collision: raw.check_collision,
        }
    }
}

impl Emotion {
    /// Create a validated emotion
    ///
    /// Fails on empty keyframes, mismatched lengths or non-finite
    /// timestamps. Out-of-order timestamps are accepted; the evaluator
    /// treats such brackets as zero-length.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        timestamps: Vec<f64>,
        keyframes: Vec<Keyframe>,
    ) -> Result<Self> {
        let name = name.into();
        if keyframes.is_empty() || timestamps.is_empty() {
            return Err(Error::EmptyAnimation(name));
        }
        if keyframes.len() != timestamps.len() {
            return Err(Error::KeyframeMismatch {
                name,
                timestamps: timestamps.len(),
                keyframes: keyframes.len(),
            });
        }
        if let Some(index) = timestamps.iter().position(|t| !t.is_finite()) {
            return Err(Error::InvalidTimestamp { name, index });
        }
        if keyframes
            .iter()
            .any(|k| !k.head.iter().all(|v| v.is_finite()))
        {
            return Err(Error::Asset(format!("{name}: non-finite head matrix")));
        }

        let duration = timestamps.iter().copied().fold(0.0_f64, f64::max);

        Ok(Self {
            name,
            description: description.into(),
            duration,
            keyframes,
            timestamps,
            sound_ref: None,
        })
    }

    /// Parse an emotion from its JSON representation
    pub fn from_json_str(name: impl Into<String>, json: &str) -> Result<Self> {
        let raw: RawEmotion = serde_json::from_str(json)?;
        let keyframes = raw.set_target_data.into_iter().map(Keyframe::from).collect();
        Self::new(name, raw.description, raw.time, keyframes)
    }

    /// Load an emotion from a JSON file, named after the file stem
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Asset(format!("invalid asset path: {}", path.display())))?
            .to_string();
        let contents = fs::read_to_string(path)?;
        let mut emotion = Self::from_json_str(name, &contents)?;

        let sound = path.with_extension("wav");
        if sound.is_file() {
            emotion.sound_ref = Some(sound);
        }
        Ok(emotion)
    }

    /// Attach a sound file reference
    pub fn with_sound(mut self, sound: impl Into<PathBuf>) -> Self {
        self.sound_ref = Some(sound.into());
        self
    }

    /// Emotion name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Playback duration in seconds (the last timestamp)
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Keyframes in recording order
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Timestamps in seconds, one per keyframe
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Whether a sound accompanies this emotion
    pub fn has_sound(&self) -> bool {
        self.sound_ref.is_some()
    }

    /// Path of the accompanying sound, if any
    pub fn sound_ref(&self) -> Option<&Path> {
        self.sound_ref.as_deref()
    }
}

/// Summary of an emotion, for listing to collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionInfo {
    /// Emotion name
    pub name: String,
    /// Description
    pub description: String,
    /// Duration in seconds
    pub duration: f64,
    /// Whether it has sound
    pub has_sound: bool,
}

/// Named collection of loaded emotions
#[derive(Debug, Clone, Default)]
pub struct EmotionLibrary {
    emotions: BTreeMap<String, Arc<Emotion>>,
}

impl EmotionLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`
    ///
    /// Any malformed asset fails the whole load; nothing is partially
    /// registered.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut library = Self::new();
        for path in paths {
            let emotion = Emotion::from_file(&path)?;
            library.insert(emotion);
        }
        tracing::info!("Loaded {} emotions from {}", library.len(), dir.display());
        Ok(library)
    }

    /// Add or replace an emotion
    pub fn insert(&mut self, emotion: Emotion) -> Arc<Emotion> {
        let emotion = Arc::new(emotion);
        self.emotions
            .insert(emotion.name().to_string(), emotion.clone());
        emotion
    }

    /// Look up an emotion by name
    pub fn get(&self, name: &str) -> Result<Arc<Emotion>> {
        self.emotions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownEmotion(name.to_string()))
    }

    /// Sorted emotion names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.emotions.keys().map(String::as_str)
    }

    /// Summaries of every emotion, sorted by name
    pub fn list(&self) -> Vec<EmotionInfo> {
        self.emotions
            .values()
            .map(|e| EmotionInfo {
                name: e.name().to_string(),
                description: e.description().to_string(),
                duration: e.duration(),
                has_sound: e.has_sound(),
            })
            .collect()
    }

    /// Number of emotions
    pub fn len(&self) -> usize {
        self.emotions.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.emotions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const NOD: &str = r#"{
        "description": "small nod",
        "time": [0.0, 0.5, 1.0],
        "set_target_data": [
            {"head": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]], "antennas": [0.0, 0.0], "body_yaw": 0.0},
            {"head": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]], "antennas": [0.5, -0.5], "body_yaw": 0.1, "check_collision": true},
            {"head": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]]}
        ]
    }"#;

    #[test]
    fn test_parse_emotion() {
        let e = Emotion::from_json_str("nod", NOD).unwrap();
        assert_eq!(e.name(), "nod");
        assert_eq!(e.description(), "small nod");
        assert_eq!(e.keyframes().len(), 3);
        assert_relative_eq!(e.duration(), 1.0);
        assert!(e.keyframes()[1].check_collision);
        assert_eq!(e.keyframes()[1].antennas, [0.5, -0.5]);
        assert!(!e.has_sound());
    }

    #[test]
    fn test_matrix_is_row_major() {
        let json = r#"{"time": [0.0], "set_target_data": [
            {"head": [[1,0,0,0.1],[0,1,0,0.2],[0,0,1,0.3],[0,0,0,1]]}
        ]}"#;
        let e = Emotion::from_json_str("t", json).unwrap();
        let head = e.keyframes()[0].head;
        assert_relative_eq!(head[(0, 3)], 0.1);
        assert_relative_eq!(head[(2, 3)], 0.3);
    }

    #[test]
    fn test_rejects_malformed() {
        let empty = r#"{"time": [], "set_target_data": []}"#;
        assert!(matches!(
            Emotion::from_json_str("e", empty),
            Err(Error::EmptyAnimation(_))
        ));

        let mismatch = r#"{"time": [0.0, 1.0], "set_target_data": [
            {"head": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]]}
        ]}"#;
        assert!(matches!(
            Emotion::from_json_str("m", mismatch),
            Err(Error::KeyframeMismatch {
                timestamps: 2,
                keyframes: 1,
                ..
            })
        ));

        assert!(matches!(
            Emotion::from_json_str("bad", "{not json"),
            Err(Error::Json(_))
        ));

        let err = Emotion::new("n", "", vec![0.0, f64::NAN], vec![Keyframe::default(); 2]);
        assert!(matches!(err, Err(Error::InvalidTimestamp { index: 1, .. })));
    }

    #[test]
    fn test_library_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("nod.json"), NOD).unwrap();
        fs::write(dir.path().join("nod.wav"), b"RIFF").unwrap();
        fs::write(dir.path().join("shake.json"), NOD).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = EmotionLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["nod", "shake"]);

        let nod = library.get("nod").unwrap();
        assert!(nod.has_sound());
        assert!(!library.get("shake").unwrap().has_sound());
        assert!(matches!(library.get("dance"), Err(Error::UnknownEmotion(_))));
        assert_eq!(library.list()[0].name, "nod");
    }

    #[test]
    fn test_library_load_fails_atomically() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), NOD).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"time": [], "set_target_data": []}"#).unwrap();
        assert!(EmotionLibrary::load_dir(dir.path()).is_err());
    }
}

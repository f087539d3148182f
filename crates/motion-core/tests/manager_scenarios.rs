//! End-to-end scenarios across assets, audio, tracking and the manager

use approx::assert_relative_eq;
use serde_json::json;
use std::f64::consts::TAU;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use motion_core::audio::speech_offset_writer;
use motion_core::config::{ControlConfig, MotionConfig};
use motion_core::control::{ManagerConfig, TickOutcome};
use motion_core::{
    ChannelSink, EmotionLibrary, Error, FaceTracker, MockSink, Move, MovementManager, Offset,
    Pose, SpeechWobbler, WobblerConfig,
};

fn quiet() -> ManagerConfig {
    ManagerConfig::default().with_control(ControlConfig::default().without_idle_breathing())
}

fn pitch_matrix(pitch: f64) -> serde_json::Value {
    let (s, c) = pitch.sin_cos();
    json!([
        [c, 0.0, s, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [-s, 0.0, c, 0.0],
        [0.0, 0.0, 0.0, 1.0]
    ])
}

fn nod_json() -> String {
    json!({
        "description": "a small nod",
        "time": [0.0, 0.5, 1.0],
        "set_target_data": [
            {"head": pitch_matrix(0.0), "antennas": [0.0, 0.0], "body_yaw": 0.0},
            {"head": pitch_matrix(0.3), "antennas": [0.5, -0.5], "body_yaw": 0.0},
            {"head": pitch_matrix(0.2), "antennas": [0.0, 0.0], "body_yaw": 0.1,
             "check_collision": true}
        ]
    })
    .to_string()
}

fn tone(secs: f64) -> Vec<f32> {
    (0..(secs * 16_000.0) as usize)
        .map(|i| 0.3 * (TAU * 180.0 * i as f64 / 16_000.0).sin() as f32)
        .collect()
}

#[test]
fn emotion_from_disk_plays_and_holds_final_pose() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("nod.json"), nod_json()).unwrap();
    fs::write(dir.path().join("nod.wav"), b"RIFF").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let library = EmotionLibrary::load_dir(dir.path()).unwrap();
    assert_eq!(library.names().collect::<Vec<_>>(), vec!["nod"]);
    let nod = library.get("nod").unwrap();
    assert!(nod.has_sound());
    assert_relative_eq!(nod.duration(), 1.0);
    assert!(matches!(library.get("shrug"), Err(Error::UnknownEmotion(_))));

    let manager = MovementManager::new(Arc::new(MockSink::new()), quiet());
    let t0 = Instant::now();
    manager.queue_move_at(Move::emotion(nod), t0);

    manager.tick_at(t0 + Duration::from_millis(500));
    assert_relative_eq!(manager.last_primary_pose().head.pitch, 0.3, epsilon = 1e-9);
    assert_eq!(manager.last_primary_pose().antennas, [0.5, -0.5]);

    manager.tick_at(t0 + Duration::from_millis(1200));
    assert!(!manager.is_move_playing());
    let idle = manager.idle_pose();
    assert_relative_eq!(idle.head.pitch, 0.2, epsilon = 1e-9);
    assert_relative_eq!(idle.body_yaw, 0.1);
}

#[test]
fn malformed_asset_fails_whole_library() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a_good.json"), nod_json()).unwrap();
    fs::write(
        dir.path().join("b_bad.json"),
        json!({"time": [0.0, 1.0], "set_target_data": [{"head": pitch_matrix(0.0)}]}).to_string(),
    )
    .unwrap();

    let err = EmotionLibrary::load_dir(dir.path()).unwrap_err();
    assert!(matches!(err, Error::KeyframeMismatch { timestamps: 2, keyframes: 1, .. }));
}

#[test]
fn speech_wobble_reaches_hardware_and_fades() {
    let sink = Arc::new(MockSink::new());
    let manager = Arc::new(MovementManager::new(sink.clone(), quiet()));
    let mut wobbler = SpeechWobbler::new(WobblerConfig::default(), speech_offset_writer(&manager));

    manager.tick();
    let mut moved = false;
    for chunk in tone(1.0).chunks(160) {
        wobbler.feed(chunk, 16_000);
        moved |= manager.tick() == TickOutcome::Sent;
    }
    assert!(moved);
    assert!(manager.secondary_offsets().speech.max_abs_diff(&Offset::ZERO) > 0.0);

    let silence = vec![0.0f32; 160];
    for _ in 0..100 {
        wobbler.feed(&silence, 16_000);
        manager.tick();
    }
    assert!(!wobbler.state().vad_active);
    assert!(wobbler.state().envelope < 1e-3);
    assert!(manager.secondary_offsets().speech.max_abs_diff(&Offset::ZERO) < 1e-9);

    let head = manager.last_sent_pose().unwrap().head;
    assert!(head.max_abs_diff(&Offset::ZERO) < manager.config().dead_zone.head);
}

#[test]
fn face_tracking_composes_with_primary_move() {
    let sink = Arc::new(MockSink::new());
    let manager = MovementManager::new(sink.clone(), quiet());
    let mut tracker = FaceTracker::default();

    let t0 = Instant::now();
    manager.queue_move_at(Move::idle(Pose::from_head(Offset::new(0.0, 0.1, 0.0))), t0);
    for i in 0..200 {
        let now = t0 + Duration::from_millis(i * 10);
        manager.set_face_tracking_offset(tracker.update(Some((0.4, 0.0)), now));
        manager.tick_at(now);
    }

    let head = manager.last_sent_pose().unwrap().head;
    assert_relative_eq!(head.pitch, 0.1, epsilon = 1e-9);
    // Within the dead zone of the converged target
    assert_relative_eq!(head.yaw, -0.2, epsilon = 2e-3);
}

#[test]
fn channel_sink_feeds_transport_from_running_loop() {
    let config = MotionConfig::from_toml_str(
        r#"
[control]
rate_hz = 200.0
idle_breathing_after_secs = 0.0

[step]
head = 0.5
"#,
    )
    .unwrap()
    .sanitized();

    let (sink, rx) = ChannelSink::bounded(1024);
    let manager = Arc::new(MovementManager::new(Arc::new(sink), config.manager()));
    manager.run().unwrap();
    manager.goto(Pose::from_head(Offset::new(0.0, 0.0, 0.4)), 0.1);

    thread::sleep(Duration::from_millis(300));
    manager.stop().unwrap();

    let commands: Vec<_> = rx.try_iter().collect();
    assert!(commands.len() >= 2);
    let last = commands.last().unwrap().head.unwrap();
    assert_relative_eq!(last.yaw, 0.4, epsilon = 2e-3);

    let diagnostics = manager.diagnostics();
    assert_eq!(diagnostics.errors, 0);
    assert_eq!(diagnostics.sent as usize, commands.len());
}

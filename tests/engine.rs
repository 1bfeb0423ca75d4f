//! End-to-end coverage of the engine facade against the scripted backend.

use arco_synth::config::{EngineConfig, SampleSlot};
use arco_synth::engine::{Engine, Mode};
use arco_synth::error::EngineError;
use arco_synth::graph::backend::AudioBackend;
use arco_synth::graph::mock::{MockBackend, NodeKind};
use arco_synth::notes;
use arco_synth::samples::{MemoryLoader, SampleBuffer};

fn buffer(seconds: f64) -> SampleBuffer {
    SampleBuffer::new(vec![0.0; (44_100.0 * seconds) as usize], 44_100)
}

fn slot(note: &str, url: &str) -> SampleSlot {
    SampleSlot {
        note: note.to_string(),
        url: url.to_string(),
    }
}

fn default_loader() -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    loader.insert("sounds/harp-c4.wav", buffer(1.0));
    loader
}

async fn bow_engine() -> Engine<MockBackend> {
    let mut engine = Engine::new(MockBackend::new(), EngineConfig::default());
    engine.init(&default_loader()).await.unwrap();
    engine
}

fn pluck_setup() -> (EngineConfig, MemoryLoader) {
    let config = EngineConfig {
        samples: vec![slot("B2", "sounds/b2.wav"), slot("B4", "sounds/b4.wav")],
        ..EngineConfig::default()
    };
    let mut loader = MemoryLoader::new();
    loader.insert("sounds/b2.wav", buffer(1.0));
    loader.insert("sounds/b4.wav", buffer(1.0));
    (config, loader)
}

async fn pluck_engine() -> Engine<MockBackend> {
    let (config, loader) = pluck_setup();
    let mut engine = Engine::new(MockBackend::new(), config);
    engine.init(&loader).await.unwrap();
    engine.set_mode(Mode::Pluck);
    engine
}

#[tokio::test]
async fn init_is_idempotent() {
    let mut engine = bow_engine().await;
    assert!(engine.is_initialized());

    let nodes_after_first = engine.backend().node_count();
    engine.init(&default_loader()).await.unwrap();
    assert_eq!(engine.backend().node_count(), nodes_after_first);
}

#[tokio::test]
async fn init_enables_reverb_routing_by_default() {
    let engine = bow_engine().await;
    assert!(engine.reverb_enabled());

    let sink = engine.backend().destination();
    assert_eq!(engine.backend().incoming(sink).len(), 1);
}

#[test]
fn playback_before_init_is_a_quiet_noop() {
    let mut engine = Engine::new(MockBackend::new(), EngineConfig::default());

    engine.play_note("C4", None, 1.0);
    engine.stop_note("C4", None);
    engine.set_velocity("C4", 0.5);
    engine.set_reverb_enabled(true);
    engine.panic();

    assert_eq!(engine.active_voices(), 0);
    assert!(!engine.reverb_enabled());
    // Only the backend's own destination node exists.
    assert_eq!(engine.backend().node_count(), 1);
}

#[tokio::test]
async fn single_sample_load_failure_is_fatal() {
    let mut engine = Engine::new(MockBackend::new(), EngineConfig::default());

    let err = engine.init(&MemoryLoader::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::SampleLoad { ref note, .. } if note == "C4"));
    assert!(!engine.is_initialized());
}

#[tokio::test]
async fn multi_sample_load_failures_are_isolated() {
    let (config, _) = pluck_setup();
    let mut loader = MemoryLoader::new();
    loader.insert("sounds/b2.wav", buffer(1.0));
    // b4 is missing on purpose.

    let mut engine = Engine::new(MockBackend::new(), config);
    engine.init(&loader).await.unwrap();
    assert_eq!(engine.sample_notes(), vec!["B2"]);

    // Pluck mode still plays, shifted from the one surviving sample.
    engine.set_mode(Mode::Pluck);
    engine.play_note("A5", None, 1.0);
    assert_eq!(engine.active_voices(), 1);
}

#[tokio::test]
async fn retrigger_replaces_the_live_voice() {
    let mut engine = bow_engine().await;

    engine.play_note("C4", None, 0.8);
    engine.play_note("C4", None, 0.6);

    assert_eq!(engine.active_voices(), 1);
    assert_eq!(engine.active_voice_ids(), vec!["C4"]);
}

#[tokio::test]
async fn voice_id_overrides_the_note_name_key() {
    let mut engine = bow_engine().await;

    engine.play_note("C4", Some("string-1"), 0.8);
    engine.play_note("E4", Some("string-1"), 0.8);
    engine.play_note("G4", None, 0.8);

    assert_eq!(engine.active_voice_ids(), vec!["string-1", "G4"]);
}

#[tokio::test]
async fn ninth_voice_evicts_the_first_inserted() {
    let mut engine = bow_engine().await;

    for i in 0..8 {
        engine.play_note("C4", Some(&format!("v{i}")), 0.8);
    }
    assert_eq!(engine.active_voices(), 8);

    engine.play_note("C4", Some("v8"), 0.8);

    assert_eq!(engine.active_voices(), 8);
    let ids = engine.active_voice_ids();
    assert!(!ids.contains(&"v0".to_string()));
    assert_eq!(ids.last().unwrap(), "v8");
}

#[tokio::test]
async fn eviction_is_a_hard_cutoff() {
    let mut engine = bow_engine().await;
    let evict_release = 0.01;

    for i in 0..9 {
        engine.play_note("C4", Some(&format!("v{i}")), 0.8);
    }

    // Exactly the evicted voice's three sources carry a scheduled stop,
    // and it is the short eviction fade, not the configured release.
    let stopped: Vec<f64> = engine
        .backend()
        .node_ids()
        .into_iter()
        .filter_map(|id| engine.backend().stop_time(id))
        .collect();
    assert_eq!(stopped.len(), 3);
    for stop in stopped {
        assert!((stop - evict_release).abs() < 1e-6);
    }
}

#[tokio::test]
async fn bow_stop_releases_then_clears_when_the_backend_reports_the_end() {
    let mut engine = bow_engine().await;

    engine.play_note("C4", None, 0.8);
    engine.stop_note("C4", None);

    // Still live while releasing.
    assert_eq!(engine.active_voices(), 1);

    // Filter release (0.5s) outlasts amp release; after it the oscillators
    // stop and the ended callback clears the entry.
    engine.backend_mut().advance(1.0);
    assert_eq!(engine.active_voices(), 0);
}

#[tokio::test]
async fn retrigger_during_release_keeps_the_replacement() {
    let mut engine = bow_engine().await;

    engine.play_note("C4", None, 0.8);
    engine.stop_note("C4", None);
    engine.play_note("C4", None, 0.9);
    assert_eq!(engine.active_voices(), 1);

    // The displaced voice ends 10ms in; its stale callback must not remove
    // the replacement.
    engine.backend_mut().advance(0.05);
    assert_eq!(engine.active_voices(), 1);
    assert_eq!(engine.active_voice_ids(), vec!["C4"]);
}

#[tokio::test]
async fn stop_for_unknown_id_is_silent() {
    let mut engine = bow_engine().await;
    engine.stop_note("G7", None);
    engine.stop_note("C4", Some("nope"));
    assert_eq!(engine.active_voices(), 0);
}

#[tokio::test]
async fn set_velocity_on_unknown_id_changes_nothing() {
    let mut engine = bow_engine().await;
    engine.play_note("C4", None, 0.8);

    let before = engine.backend().all_events();
    engine.set_velocity("not-a-voice", 0.3);
    assert_eq!(engine.backend().all_events(), before);
}

#[tokio::test]
async fn reverb_toggle_reroutes_without_touching_voices() {
    let mut engine = bow_engine().await;
    engine.play_note("C4", None, 0.8);
    engine.play_note("E4", None, 0.6);

    let sink = engine.backend().destination();
    let events_before = engine.backend().all_events();
    let voices_before = engine.active_voice_ids();
    let through_reverb = engine.backend().incoming(sink);

    engine.set_reverb_enabled(false);
    assert!(!engine.reverb_enabled());
    let direct = engine.backend().incoming(sink);
    assert_eq!(direct.len(), 1);
    assert_ne!(direct, through_reverb);

    engine.set_reverb_enabled(true);
    assert_eq!(engine.backend().incoming(sink), through_reverb);

    // Routing changed; nothing else did.
    assert_eq!(engine.backend().all_events(), events_before);
    assert_eq!(engine.active_voice_ids(), voices_before);
}

#[tokio::test]
async fn set_mode_always_leaves_zero_live_voices() {
    let mut engine = bow_engine().await;

    engine.play_note("C4", None, 0.8);
    engine.play_note("E4", None, 0.8);
    engine.play_note("G4", None, 0.8);
    assert_eq!(engine.active_voices(), 3);

    engine.set_mode(Mode::Pluck);
    assert_eq!(engine.active_voices(), 0);
    assert_eq!(engine.mode(), Mode::Pluck);

    // Same-mode set still silences.
    engine.play_note("C4", None, 0.8);
    assert_eq!(engine.active_voices(), 1);
    engine.set_mode(Mode::Pluck);
    assert_eq!(engine.active_voices(), 0);
}

#[tokio::test]
async fn pluck_picks_the_nearest_sample_in_octave_distance() {
    let mut engine = pluck_engine().await;

    engine.play_note("A3", None, 1.0);
    engine.play_note("A5", Some("high"), 1.0);

    let sources = engine.backend().buffer_sources();
    assert_eq!(sources.len(), 2);

    let rates: Vec<f64> = sources
        .iter()
        .map(|id| match engine.backend().node_kind(*id) {
            NodeKind::BufferSource { rate, .. } => *rate,
            other => panic!("expected buffer source, got {other:?}"),
        })
        .collect();

    // A3 shifts up from B2, A5 shifts up from B4.
    let expected_a3 = f64::from(notes::frequency("A3")) / f64::from(notes::frequency("B2"));
    let expected_a5 = f64::from(notes::frequency("A5")) / f64::from(notes::frequency("B4"));
    assert!((rates[0] - expected_a3).abs() < 1e-6);
    assert!((rates[1] - expected_a5).abs() < 1e-6);
}

#[tokio::test]
async fn pluck_voices_ring_out_past_stop() {
    let mut engine = pluck_engine().await;

    engine.play_note("A3", None, 1.0);
    engine.stop_note("A3", None);
    assert_eq!(engine.active_voices(), 1, "stop must not cut a plucked note");

    // The buffer runs out on its own and the entry clears itself.
    engine.backend_mut().advance(2.0);
    assert_eq!(engine.active_voices(), 0);
}

#[tokio::test]
async fn pluck_voices_are_not_subject_to_the_bow_cap() {
    let mut engine = pluck_engine().await;

    for i in 0..12 {
        engine.play_note("A3", Some(&format!("p{i}")), 1.0);
    }
    assert_eq!(engine.active_voices(), 12);
}

#[tokio::test]
async fn panic_clears_everything_immediately() {
    let mut engine = pluck_engine().await;

    engine.play_note("A3", None, 1.0);
    engine.set_mode(Mode::Bow);
    engine.play_note("C4", None, 0.8);
    engine.play_note("E4", None, 0.8);

    engine.panic();
    assert_eq!(engine.active_voices(), 0);
}

#[tokio::test]
async fn malformed_notes_still_play_at_the_fallback_pitch() {
    let mut engine = bow_engine().await;

    engine.play_note("H9", None, 0.8);
    assert_eq!(engine.active_voices(), 1);
    assert_eq!(engine.active_voice_ids(), vec!["H9"]);
}

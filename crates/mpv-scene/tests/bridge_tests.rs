//! End-to-end tests of the bridge against a scripted engine.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use mpv_scene::testing::{EngineCall, ScriptedEngine};
use mpv_scene::{
    BridgeConfig, EndFileReason, Engine, EngineEvent, MpvObject, PropertyValue, PumpState,
};
use mpv_scene_core::DispatchQueue;
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn bridge() -> (Arc<ScriptedEngine>, DispatchQueue, Arc<MpvObject>) {
    init_tracing();
    let queue = DispatchQueue::new();
    let engine = ScriptedEngine::new();
    let object = MpvObject::new(
        || Some(engine.clone() as Arc<dyn Engine>),
        BridgeConfig::default(),
        queue.dispatcher(),
    )
    .unwrap();
    engine.clear_calls();
    (engine, queue, object)
}

#[test]
fn test_one_notification_per_distinct_value() {
    let (engine, queue, object) = bridge();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    object
        .properties()
        .chapter_changed()
        .connect(move |v| s.lock().push(*v));

    for chapter in [1i64, 1, 2, 2, 2, 3, 1] {
        engine.push_property("chapter", chapter);
    }
    assert_eq!(queue.process_pending(), 1);

    assert_eq!(*seen.lock(), vec![1, 2, 3, 1]);
}

#[test]
fn test_notifications_keep_engine_order_across_drains() {
    let (engine, queue, object) = bridge();
    let log = Arc::new(Mutex::new(Vec::new()));

    let l = log.clone();
    object
        .properties()
        .position_changed()
        .connect(move |v| l.lock().push(format!("pos {v}")));
    let l = log.clone();
    object
        .properties()
        .duration_changed()
        .connect(move |v| l.lock().push(format!("dur {v}")));
    let l = log.clone();
    object
        .lifecycle()
        .file_ended()
        .connect(move |r| l.lock().push(format!("end {r}")));

    engine.push_property("duration", 60.0);
    engine.push_property("time-pos", 0.5);
    queue.process_pending();
    engine.push_property("time-pos", 1.0);
    engine.push_event(EngineEvent::EndFile { reason: 0 });
    queue.process_pending();

    assert_eq!(
        *log.lock(),
        vec!["dur 60", "pos 0.5", "pos 1", "end eof"]
    );
}

#[test]
fn test_format_mismatch_is_dropped_and_draining_continues() {
    let (engine, queue, object) = bridge();
    engine.push_events([
        EngineEvent::PropertyChange {
            name: "volume".into(),
            value: Some(PropertyValue::from("loud")),
        },
        EngineEvent::PropertyChange {
            name: "duration".into(),
            value: None,
        },
        EngineEvent::PropertyChange {
            name: "volume".into(),
            value: Some(PropertyValue::Int(30)),
        },
    ]);
    queue.process_pending();

    assert_eq!(object.properties().volume(), 30);
    assert_eq!(object.properties().duration(), 0.0);
}

#[test]
fn test_is_playing_fires_only_on_flips() {
    let (engine, queue, object) = bridge();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    object.is_playing_changed().connect(move |v| s.lock().push(*v));

    engine.push_property("idle", true);
    queue.process_pending();
    engine.push_property("idle", false);
    queue.process_pending();
    // Idle is unchanged here; only the pause flip counts.
    engine.push_property("idle", false);
    engine.push_property("pause", true);
    queue.process_pending();
    engine.push_property("idle", true);
    queue.process_pending();

    assert_eq!(*seen.lock(), vec![true, false]);
}

#[test]
fn test_play_from_finished_playlist() {
    let (engine, queue, object) = bridge();
    engine.push_property("idle", true);
    engine.push_property("playlist/count", 2i64);
    engine.push_property("playlist-pos", 0i64);
    engine.push_property("pause", true);
    queue.process_pending();
    engine.clear_calls();

    object.play();

    assert_eq!(
        engine.calls(),
        vec![
            EngineCall::SetProperty("playlist-pos".into(), PropertyValue::Int(0)),
            EngineCall::SetProperty("pause".into(), PropertyValue::Flag(false)),
        ]
    );

    // The engine echoes the unpause, then reloads the entry.
    queue.process_pending();
    assert!(!object.is_playing());
    engine.push_property("idle", false);
    queue.process_pending();
    assert!(object.is_playing());
}

#[test]
fn test_play_when_playing_sends_nothing() {
    let (engine, queue, object) = bridge();
    engine.push_property("idle", true);
    queue.process_pending();
    engine.push_property("idle", false);
    queue.process_pending();
    assert!(object.is_playing());
    engine.clear_calls();

    object.play();
    assert!(engine.calls().is_empty());
}

#[test]
fn test_end_file_reasons_reach_the_ui() {
    let (engine, queue, object) = bridge();
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let r = reasons.clone();
    object
        .lifecycle()
        .file_ended()
        .connect(move |reason| r.lock().push(*reason));

    engine.push_events([0, 2, 3, 4, 5, 1, 99].map(|reason| EngineEvent::EndFile { reason }));
    queue.process_pending();

    assert_eq!(
        *reasons.lock(),
        vec![
            EndFileReason::Eof,
            EndFileReason::Stop,
            EndFileReason::Quit,
            EndFileReason::Error,
            EndFileReason::Redirect,
            EndFileReason::Unknown,
            EndFileReason::Unknown,
        ]
    );
}

#[test]
fn test_wakeups_from_engine_thread_coalesce() {
    init_tracing();
    let wakes = Arc::new(AtomicUsize::new(0));
    let w = wakes.clone();
    let queue = DispatchQueue::with_waker(move || {
        w.fetch_add(1, Ordering::SeqCst);
    });
    let engine = ScriptedEngine::new();
    let object = MpvObject::new(
        || Some(engine.clone() as Arc<dyn Engine>),
        BridgeConfig::default(),
        queue.dispatcher(),
    )
    .unwrap();

    let producer = {
        let engine = engine.clone();
        thread::spawn(move || {
            for i in 0..500i64 {
                engine.push_property("estimated-frame-number", i);
            }
        })
    };
    producer.join().unwrap();

    assert_eq!(object.pump_state(), PumpState::DrainRequested);
    // Many wake-ups, one posted drain.
    assert!(engine.wakeup_count() >= 500);
    assert_eq!(wakes.load(Ordering::SeqCst), 1);
    assert_eq!(queue.process_pending(), 1);

    assert_eq!(object.properties().estimated_frame_number(), 499);
    assert_eq!(engine.pending_events(), 0);
    assert_eq!(object.pump_state(), PumpState::Idle);
}

#[test]
fn test_events_during_drain_are_not_lost() {
    let (engine, queue, object) = bridge();
    let producer = {
        let engine = engine.clone();
        thread::spawn(move || {
            for i in 1..=200i64 {
                engine.push_property("frame-drop-count", i);
            }
        })
    };

    while !producer.is_finished() {
        queue.process_pending();
    }
    producer.join().unwrap();
    queue.process_pending();

    assert_eq!(object.properties().frame_drop_count(), 200);
    assert_eq!(engine.pending_events(), 0);
}

#[test]
fn test_rejected_commands_do_not_stop_event_processing() {
    let (engine, queue, object) = bridge();
    engine.reject_commands(true);
    object.seek(10.0);
    object.set_volume(20);
    assert!(object.command(&["stop".into()]).is_err());

    engine.push_property("seekable", true);
    queue.process_pending();
    assert!(object.properties().seekable());
}

#[test]
fn test_panicking_slot_does_not_stall_later_drains() {
    let (engine, queue, object) = bridge();
    object
        .lifecycle()
        .file_loaded()
        .connect(|_| panic!("file_loaded handler failed"));

    engine.push_event(EngineEvent::FileLoaded);
    let result = panic::catch_unwind(AssertUnwindSafe(|| queue.process_pending()));
    assert!(result.is_err());

    engine.push_property("volume", 42i64);
    queue.process_pending();
    assert_eq!(object.properties().volume(), 42);
    assert_eq!(object.pump_state(), PumpState::Idle);
    assert_eq!(engine.pending_events(), 0);
}

//! Playback controls and the derived playing state.

use std::fmt;

use mpv_scene_core::logging::targets;
use mpv_scene_core::{Property, Signal};

use crate::engine::EngineHandle;
use crate::error::Result;
use crate::properties::MediaProperties;
use crate::value::PropertyValue;

/// Commands issued to the engine on behalf of the UI, plus `is_playing`.
///
/// Engine failures are logged and absorbed: a rejected command simply has no
/// effect, and the cached properties keep reporting what the engine reports.
pub(crate) struct Playback {
    engine: EngineHandle,
    is_playing: Property<bool>,
    is_playing_changed: Signal<bool>,
}

impl Playback {
    pub(crate) fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            is_playing: Property::new(false),
            is_playing_changed: Signal::new(),
        }
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.is_playing.get()
    }

    pub(crate) fn is_playing_changed(&self) -> &Signal<bool> {
        &self.is_playing_changed
    }

    /// Start or resume playback.
    ///
    /// When the engine has gone idle with entries still in the playlist, the
    /// current position is written back to itself so the entry reloads.
    pub(crate) fn play(&self, props: &MediaProperties) {
        if props.idle() && props.playlist_count() >= 1 {
            let pos = props.playlist_pos();
            log_failure("reload playlist entry", self.engine.set_property("playlist-pos", pos));
        }

        if !self.is_playing() {
            log_failure("resume", self.engine.set_property("pause", false));
        }
    }

    pub(crate) fn pause(&self) {
        if self.is_playing() {
            log_failure("pause", self.engine.set_property("pause", true));
        }
    }

    pub(crate) fn play_pause(&self, props: &MediaProperties) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play(props);
        }
    }

    /// Seek to an absolute position in seconds.
    pub(crate) fn seek(&self, position: f64) {
        log_failure(
            "seek",
            self.engine
                .command(&["seek".into(), position.into(), "absolute".into()]),
        );
    }

    /// Replace the playlist with `target`.
    pub(crate) fn load_file(&self, target: &str) {
        log_failure("load file", self.engine.command(&["loadfile".into(), target.into()]));
    }

    /// Replace the playlist with `targets`: the first entry starts playing,
    /// the rest are appended.
    pub(crate) fn load_files<S: AsRef<str>>(&self, targets: &[S]) {
        for (i, target) in targets.iter().enumerate() {
            let mode = if i == 0 { "replace" } else { "append-play" };
            let args: [PropertyValue; 3] = ["loadfile".into(), target.as_ref().into(), mode.into()];
            log_failure("load file", self.engine.command(&args));
        }
    }

    /// Recompute `is_playing` from the idle and pause flags.
    ///
    /// Returns `true` if the derived value changed, in which case
    /// `is_playing_changed` has been emitted.
    pub(crate) fn update_state(&self, props: &MediaProperties) -> bool {
        let playing = !props.idle() && !props.paused();
        if self.is_playing.set(playing) {
            tracing::debug!(target: targets::PLAYBACK, playing, "playing state changed");
            self.is_playing_changed.emit(playing);
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for Playback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playback")
            .field("is_playing", &self.is_playing())
            .finish()
    }
}

fn log_failure(action: &str, result: Result<()>) {
    if let Err(err) = result {
        tracing::warn!(target: targets::PLAYBACK, action, %err, "playback request failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::BridgeConfig;
    use crate::engine::Engine;
    use crate::properties::PropertyRegistry;
    use crate::testing::{EngineCall, ScriptedEngine};

    fn setup() -> (Arc<ScriptedEngine>, PropertyRegistry, Playback) {
        let engine = ScriptedEngine::new();
        let handle =
            EngineHandle::create(|| Some(engine.clone() as Arc<dyn Engine>), &BridgeConfig::default())
                .unwrap();
        engine.clear_calls();
        (engine, PropertyRegistry::new(), Playback::new(handle))
    }

    fn set_flags(registry: &PropertyRegistry, idle: bool, paused: bool) {
        registry.apply("idle", Some(&PropertyValue::Flag(idle)));
        registry.apply("pause", Some(&PropertyValue::Flag(paused)));
    }

    #[test]
    fn test_update_state_deduplicates() {
        let (_engine, registry, playback) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        playback.is_playing_changed().connect(move |v| s.lock().push(*v));

        set_flags(&registry, false, false);
        assert!(playback.update_state(registry.properties()));
        assert!(!playback.update_state(registry.properties()));

        set_flags(&registry, false, true);
        assert!(playback.update_state(registry.properties()));

        set_flags(&registry, true, true);
        assert!(!playback.update_state(registry.properties()));

        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[test]
    fn test_play_reloads_finished_playlist() {
        let (engine, registry, playback) = setup();
        registry.apply("idle", Some(&PropertyValue::Flag(true)));
        registry.apply("playlist/count", Some(&PropertyValue::Int(2)));
        registry.apply("playlist-pos", Some(&PropertyValue::Int(0)));

        playback.play(registry.properties());

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::SetProperty("playlist-pos".into(), PropertyValue::Int(0)),
                EngineCall::SetProperty("pause".into(), PropertyValue::Flag(false)),
            ]
        );
    }

    #[test]
    fn test_play_while_playing_is_quiet() {
        let (engine, registry, playback) = setup();
        set_flags(&registry, false, false);
        playback.update_state(registry.properties());

        playback.play(registry.properties());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_pause_only_when_playing() {
        let (engine, registry, playback) = setup();
        playback.pause();
        assert!(engine.calls().is_empty());

        set_flags(&registry, false, false);
        playback.update_state(registry.properties());
        playback.play_pause(registry.properties());
        assert_eq!(
            engine.calls(),
            vec![EngineCall::SetProperty("pause".into(), PropertyValue::Flag(true))]
        );
    }

    #[test]
    fn test_seek_and_load_commands() {
        let (engine, _registry, playback) = setup();
        playback.seek(42.5);
        playback.load_files(&["a.mkv", "b.mkv"]);

        assert_eq!(
            engine.commands(),
            vec![
                vec!["seek".into(), PropertyValue::Double(42.5), "absolute".into()],
                vec!["loadfile".into(), "a.mkv".into(), "replace".into()],
                vec!["loadfile".into(), "b.mkv".into(), "append-play".into()],
            ]
        );
    }

    #[test]
    fn test_rejected_command_is_absorbed() {
        let (engine, _registry, playback) = setup();
        engine.reject_commands(true);
        playback.seek(1.0);
        playback.load_file("missing.mkv");
        assert_eq!(engine.commands().len(), 2);
    }
}

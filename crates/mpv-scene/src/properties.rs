//! Watched engine properties.
//!
//! Every property the bridge observes is declared once, in the
//! `media_properties!` table below. The table generates:
//!
//! - a cached [`Property`] and a change [`Signal`] per entry on
//!   [`MediaProperties`], with a getter and a `*_changed()` accessor;
//! - the static [`WATCHED_PROPERTIES`] list, used both to register
//!   observations with the engine and to decode change events.
//!
//! Adding a property is one line in the table.

use std::collections::HashMap;
use std::fmt;

use mpv_scene_core::logging::targets;
use mpv_scene_core::{Property, Signal};

use crate::engine::EngineHandle;
use crate::error::Result;
use crate::value::{PropertyKind, PropertyValue, WatchedType};

/// One row of the watched-property table.
#[derive(Clone, Copy)]
pub struct WatchedProperty {
    /// Engine property name.
    pub name: &'static str,
    /// Format the property is observed and decoded as.
    pub kind: PropertyKind,
    apply: fn(&MediaProperties, &PropertyValue) -> bool,
}

impl fmt::Debug for WatchedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedProperty")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Decode `value` into `property`, notifying `signal` if the cached value changed.
///
/// Returns `false` if `value` is not of type `T`.
fn store<T: WatchedType>(property: &Property<T>, signal: &Signal<T>, value: &PropertyValue) -> bool {
    let Some(decoded) = T::decode(value) else {
        return false;
    };
    if property.set(decoded.clone()) {
        signal.emit(decoded);
    }
    true
}

macro_rules! media_properties {
    ($(
        $(#[$doc:meta])*
        $field:ident, $changed:ident: $ty:ty = $name:literal;
    )*) => {
        /// Cached values of every watched property, with change notifications.
        ///
        /// Values start at their type's default and are updated only by the
        /// event pump. Each `*_changed()` signal fires once per actual change.
        pub struct MediaProperties {
            $(
                $field: Property<$ty>,
                $changed: Signal<$ty>,
            )*
        }

        impl MediaProperties {
            pub(crate) fn new() -> Self {
                Self {
                    $(
                        $field: Property::default(),
                        $changed: Signal::new(),
                    )*
                }
            }

            $(
                $(#[$doc])*
                pub fn $field(&self) -> $ty {
                    self.$field.get()
                }

                #[doc = concat!("Emitted when `", $name, "` changes.")]
                pub fn $changed(&self) -> &Signal<$ty> {
                    &self.$changed
                }
            )*
        }

        /// Every property the bridge observes, in registration order.
        pub static WATCHED_PROPERTIES: &[WatchedProperty] = &[
            $(
                WatchedProperty {
                    name: $name,
                    kind: <$ty as WatchedType>::KIND,
                    apply: |props, value| store(&props.$field, &props.$changed, value),
                },
            )*
        ];
    };
}

media_properties! {
    /// Whether no file is loaded (playback finished or never started).
    idle, idle_changed: bool = "idle";
    muted, muted_changed: bool = "mute";
    paused, paused_changed: bool = "pause";
    /// Whether playback is stalled waiting for the network cache.
    paused_for_cache, paused_for_cache_changed: bool = "paused-for-cache";
    seekable, seekable_changed: bool = "seekable";

    /// Current chapter index, or -1.
    chapter, chapter_changed: i64 = "chapter";
    chapter_list_count, chapter_list_count_changed: i64 = "chapter-list/count";
    decoder_frame_drop_count, decoder_frame_drop_count_changed: i64 = "decoder-frame-drop-count";
    /// Display height of the video after filters and aspect correction.
    dheight, dheight_changed: i64 = "dheight";
    /// Display width of the video after filters and aspect correction.
    dwidth, dwidth_changed: i64 = "dwidth";
    estimated_frame_count, estimated_frame_count_changed: i64 = "estimated-frame-count";
    estimated_frame_number, estimated_frame_number_changed: i64 = "estimated-frame-number";
    frame_drop_count, frame_drop_count_changed: i64 = "frame-drop-count";
    /// Index of the current playlist entry, or -1.
    playlist_pos, playlist_pos_changed: i64 = "playlist-pos";
    playlist_count, playlist_count_changed: i64 = "playlist/count";
    vo_delayed_frame_count, vo_delayed_frame_count_changed: i64 = "vo-delayed-frame-count";
    /// Volume in percent.
    volume, volume_changed: i64 = "volume";

    audio_bitrate, audio_bitrate_changed: f64 = "audio-bitrate";
    /// Audio/video desynchronization in seconds.
    avsync, avsync_changed: f64 = "avsync";
    container_fps, container_fps_changed: f64 = "container-fps";
    /// Length of the current file in seconds.
    duration, duration_changed: f64 = "duration";
    estimated_display_fps, estimated_display_fps_changed: f64 = "estimated-display-fps";
    estimated_vf_fps, estimated_vf_fps_changed: f64 = "estimated-vf-fps";
    fps, fps_changed: f64 = "fps";
    speed, speed_changed: f64 = "speed";
    /// Playback position in seconds.
    position, position_changed: f64 = "time-pos";
    video_bitrate, video_bitrate_changed: f64 = "video-bitrate";

    audio_codec, audio_codec_changed: String = "audio-codec";
    audio_codec_name, audio_codec_name_changed: String = "audio-codec-name";
    filename, filename_changed: String = "filename";
    file_format, file_format_changed: String = "file-format";
    file_size, file_size_changed: String = "file-size";
    format, format_changed: String = "format";
    hwdec, hwdec_changed: String = "hwdec";
    hwdec_current, hwdec_current_changed: String = "hwdec-current";
    hwdec_interop, hwdec_interop_changed: String = "hwdec-interop";
    /// Title from the file's metadata, falling back to the file name.
    media_title, media_title_changed: String = "media-title";
    path, path_changed: String = "path";
    video_codec, video_codec_changed: String = "video-codec";
    video_format, video_format_changed: String = "video-format";
}

impl MediaProperties {
    /// Update the playback position. Hot path: skips the table lookup.
    pub(crate) fn set_position(&self, value: &PropertyValue) -> bool {
        store(&self.position, &self.position_changed, value)
    }

    /// Update the file duration. Hot path: skips the table lookup.
    pub(crate) fn set_duration(&self, value: &PropertyValue) -> bool {
        store(&self.duration, &self.duration_changed, value)
    }
}

impl fmt::Debug for MediaProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaProperties")
            .field("idle", &self.idle())
            .field("paused", &self.paused())
            .field("position", &self.position())
            .field("duration", &self.duration())
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

/// Name-indexed view of [`WATCHED_PROPERTIES`] plus the values it feeds.
pub struct PropertyRegistry {
    index: HashMap<&'static str, &'static WatchedProperty>,
    properties: MediaProperties,
}

impl PropertyRegistry {
    /// Build the registry.
    ///
    /// # Panics
    ///
    /// In debug builds, if a property name appears twice in the table.
    pub fn new() -> Self {
        let mut index = HashMap::with_capacity(WATCHED_PROPERTIES.len());
        for entry in WATCHED_PROPERTIES {
            let previous = index.insert(entry.name, entry);
            debug_assert!(
                previous.is_none(),
                "property '{}' registered twice",
                entry.name
            );
        }
        Self {
            index,
            properties: MediaProperties::new(),
        }
    }

    /// Ask the engine to report changes to every watched property.
    ///
    /// Stops at the first property the engine refuses.
    pub fn observe_all(&self, engine: &EngineHandle) -> Result<()> {
        for entry in WATCHED_PROPERTIES {
            engine.observe(entry.name, entry.kind)?;
        }
        tracing::debug!(
            target: targets::PROPERTIES,
            count = WATCHED_PROPERTIES.len(),
            "observing properties"
        );
        Ok(())
    }

    /// Look up a table entry by engine name.
    pub fn lookup(&self, name: &str) -> Option<&'static WatchedProperty> {
        self.index.get(name).copied()
    }

    /// Apply a property-change event.
    ///
    /// Returns `false`, dropping the event, if `name` is not watched or
    /// `value` is absent or of the wrong format.
    pub fn apply(&self, name: &str, value: Option<&PropertyValue>) -> bool {
        let Some(entry) = self.lookup(name) else {
            tracing::trace!(target: targets::PROPERTIES, name, "change for unwatched property");
            return false;
        };
        let Some(value) = value else {
            return false;
        };
        let applied = (entry.apply)(&self.properties, value);
        if !applied {
            tracing::trace!(
                target: targets::PROPERTIES,
                name,
                expected = %entry.kind,
                actual = %value.kind(),
                "dropping property change with unexpected format"
            );
        }
        applied
    }

    /// The cached property values.
    pub fn properties(&self) -> &MediaProperties {
        &self.properties
    }
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("watched", &self.index.len())
            .field("properties", &self.properties)
            .finish()
    }
}

static_assertions::assert_impl_all!(MediaProperties: Send, Sync);

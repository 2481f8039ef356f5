//! Engine options applied when the bridge is created.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options handed to the engine during construction.
///
/// The defaults reproduce a typical embedded setup: warnings only, OpenGL
/// callback output, hardware decoding when available.
///
/// # Example
///
/// ```
/// use mpv_scene::BridgeConfig;
///
/// let config = BridgeConfig::from_toml_str(r#"
///     hwdec = "no"
///     enable_audio = false
///
///     [options]
///     loop-file = "inf"
/// "#).unwrap();
///
/// assert_eq!(config.hwdec, "no");
/// assert_eq!(config.msg_level, "all=warn,ao/alsa=error");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Whether the engine may write to the terminal.
    pub terminal: String,
    /// Engine terminal log filter, e.g. `all=warn`.
    pub msg_level: String,
    /// Lowest engine log level forwarded to `tracing`, or `"no"`.
    pub log_level: String,
    /// Name reported to the audio server.
    pub audio_client_name: String,
    /// Video output driver. Must select the OpenGL callback output.
    pub video_output: String,
    /// Hardware decoding preference.
    pub hwdec: String,
    /// When false, audio output is routed to the null driver.
    pub enable_audio: bool,
    /// Extra `name = value` options, applied after the ones above.
    pub options: BTreeMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            terminal: "yes".to_string(),
            msg_level: "all=warn,ao/alsa=error".to_string(),
            log_level: "warn".to_string(),
            audio_client_name: "mpvz".to_string(),
            video_output: "opengl-cb".to_string(),
            hwdec: "auto".to_string(),
            enable_audio: true,
            options: BTreeMap::new(),
        }
    }
}

impl BridgeConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Options that must be set before the engine is initialized.
    pub(crate) fn pre_init_options(&self) -> Vec<(&str, &str)> {
        vec![
            ("terminal", self.terminal.as_str()),
            ("msg-level", self.msg_level.as_str()),
        ]
    }

    /// Options applied once the engine is initialized, in application order.
    pub(crate) fn post_init_options(&self) -> Vec<(&str, &str)> {
        let mut options = vec![
            ("audio-client-name", self.audio_client_name.as_str()),
            ("vo", self.video_output.as_str()),
            ("hwdec", self.hwdec.as_str()),
        ];
        options.extend(
            self.options
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        if !self.enable_audio {
            options.push(("ao", "null"));
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MpvError;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.video_output, "opengl-cb");
        assert!(config.enable_audio);
        assert_eq!(config.log_level, "warn");
        assert_eq!(
            config.pre_init_options(),
            vec![("terminal", "yes"), ("msg-level", "all=warn,ao/alsa=error")]
        );
    }

    #[test]
    fn test_post_init_order() {
        let mut config = BridgeConfig {
            enable_audio: false,
            ..Default::default()
        };
        config.options.insert("speed".into(), "1.5".into());
        config.options.insert("loop-file".into(), "inf".into());

        let names: Vec<&str> = config.post_init_options().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["audio-client-name", "vo", "hwdec", "loop-file", "speed", "ao"]
        );
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let err = BridgeConfig::from_toml_str("hwdec = [").unwrap_err();
        assert!(matches!(err, MpvError::Config(_)));
    }

    #[test]
    fn test_toml_round_trip_of_partial_file() {
        let config = BridgeConfig::from_toml_str("audio_client_name = \"viewer\"").unwrap();
        assert_eq!(config.audio_client_name, "viewer");
        assert_eq!(config.hwdec, "auto");
    }
}

//! Configuration
//!
//! Built from defaults, then an optional TOML file, then environment
//! overrides, then CLI flags through the `with_*` builders.
//!
//! ```toml
//! [voice]
//! listen_timeout_secs = 7
//! phrase_limit_secs = 12
//!
//! [translator]
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::voice::CaptureSettings;
use crate::{Result, VoiceosError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ENV_TRANSLATOR_MODEL: &str = "VOICEOS_TRANSLATOR_MODEL";
pub const ENV_BASE_URL: &str = "VOICEOS_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSection {
    pub listen_timeout_secs: f64,
    pub phrase_limit_secs: f64,
    pub pause_threshold_secs: f64,
    pub energy_threshold: f32,
}

impl Default for VoiceSection {
    fn default() -> Self {
        Self {
            listen_timeout_secs: 7.0,
            phrase_limit_secs: 12.0,
            pause_threshold_secs: 0.8,
            energy_threshold: 300.0,
        }
    }
}

/// An OpenAI-compatible HTTP endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSection {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

impl EndpointSection {
    fn with_model(model: &str) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }

    /// The API key, if its variable is set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_transcriber() -> EndpointSection {
    EndpointSection::with_model("whisper-1")
}

fn default_translator() -> EndpointSection {
    EndpointSection::with_model("gpt-4o-mini")
}

impl Default for EndpointSection {
    /// Model left empty; filled per endpoint after parsing
    fn default() -> Self {
        Self::with_model("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceosConfig {
    #[serde(default)]
    pub voice: VoiceSection,

    #[serde(default = "default_transcriber")]
    pub transcriber: EndpointSection,

    #[serde(default = "default_translator")]
    pub translator: EndpointSection,

    /// Starting directory (not read from the file)
    #[serde(skip)]
    pub cwd: Option<PathBuf>,

    #[serde(skip)]
    pub verbose: bool,
}

impl Default for VoiceosConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceosConfig {
    pub fn new() -> Self {
        Self {
            voice: VoiceSection::default(),
            transcriber: default_transcriber(),
            translator: default_translator(),
            cwd: None,
            verbose: false,
        }
    }

    /// `<config_dir>/voiceos/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voiceos").join("config.toml"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| VoiceosError::Config(e.to_string()))?;
        if config.transcriber.model.is_empty() {
            config.transcriber.model = default_transcriber().model;
        }
        if config.translator.model.is_empty() {
            config.translator.model = default_translator().model;
        }
        Ok(config)
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicitly named file must exist. The default file is optional, and
    /// a malformed file only costs a warning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (Some(path.to_path_buf()), true),
            None => (Self::default_path(), false),
        };
        let Some(path) = path else {
            return Ok(Self::new());
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}", path.display());
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(VoiceosError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        match Self::from_toml_str(&content) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Ok(Self::new())
            }
        }
    }

    /// Apply `VOICEOS_*` overrides from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = lookup(ENV_TRANSLATOR_MODEL).filter(|v| !v.is_empty()) {
            self.translator.model = model;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.transcriber.base_url = base_url.clone();
            self.translator.base_url = base_url;
        }
        self
    }

    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_translator_model(mut self, model: impl Into<String>) -> Self {
        self.translator.model = model.into();
        self
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        let secs = |s: f64| {
            Duration::from_secs_f64(if s.is_finite() { s.clamp(0.0, 3600.0) } else { 0.0 })
        };
        CaptureSettings {
            listen_timeout: secs(self.voice.listen_timeout_secs),
            phrase_limit: secs(self.voice.phrase_limit_secs),
            pause_threshold: secs(self.voice.pause_threshold_secs),
            energy_threshold: self.voice.energy_threshold,
        }
    }

    /// Shown when the speak trigger fires without credentials
    pub fn voice_unavailable_message(&self) -> String {
        let env = if self.translator.api_key().is_none() {
            &self.translator.api_key_env
        } else {
            &self.transcriber.api_key_env
        };
        format!("Voice AI is not configured. Check {env}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = VoiceosConfig::new();
        let settings = config.capture_settings();
        assert_eq!(settings.listen_timeout, Duration::from_secs(7));
        assert_eq!(settings.phrase_limit, Duration::from_secs(12));
        assert_eq!(config.transcriber.model, "whisper-1");
        assert_eq!(config.translator.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = VoiceosConfig::from_toml_str(
            r#"
            [voice]
            listen_timeout_secs = 3.5

            [translator]
            model = "local-model"
            base_url = "http://localhost:8080/v1"
            "#,
        )
        .unwrap();
        assert_eq!(config.voice.listen_timeout_secs, 3.5);
        assert_eq!(config.voice.phrase_limit_secs, 12.0);
        assert_eq!(config.translator.model, "local-model");
        assert_eq!(config.translator.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.transcriber, default_transcriber());

        let config =
            VoiceosConfig::from_toml_str("[transcriber]\nbase_url = \"http://stt/v1\"\n").unwrap();
        assert_eq!(config.transcriber.model, "whisper-1");
        assert_eq!(config.transcriber.base_url, "http://stt/v1");
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(VoiceosConfig::load(Some(&missing)).is_err());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[voice\nlisten = ").unwrap();
        assert_eq!(VoiceosConfig::load(Some(&bad)).unwrap(), VoiceosConfig::new());

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[voice]\nenergy_threshold = 500.0\n").unwrap();
        let config = VoiceosConfig::load(Some(&good)).unwrap();
        assert_eq!(config.voice.energy_threshold, 500.0);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_TRANSLATOR_MODEL, "gpt-test"),
            (ENV_BASE_URL, "http://proxy/v1"),
        ]
        .into_iter()
        .collect();
        let config = VoiceosConfig::new()
            .apply_env_with(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.translator.model, "gpt-test");
        assert_eq!(config.translator.base_url, "http://proxy/v1");
        assert_eq!(config.transcriber.base_url, "http://proxy/v1");
    }

    #[test]
    fn test_builders() {
        let config = VoiceosConfig::new()
            .with_cwd(PathBuf::from("/tmp"))
            .with_verbose(true)
            .with_translator_model("m");
        assert_eq!(config.cwd, Some(PathBuf::from("/tmp")));
        assert!(config.verbose);
        assert_eq!(config.translator.model, "m");
    }

    #[test]
    fn test_unavailable_message_names_variable() {
        let mut config = VoiceosConfig::new();
        config.translator.api_key_env = "VOICEOS_TEST_UNSET_KEY_1234".to_string();
        assert_eq!(
            config.voice_unavailable_message(),
            "Voice AI is not configured. Check VOICEOS_TEST_UNSET_KEY_1234."
        );
    }
}

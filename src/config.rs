//! Client voice configuration
//!
//! Values are read fresh from [`SharedConfig`] at every decision point, so
//! edits made while sessions run apply from the next packet on.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CLOSE_TIMEOUT_MS, DEFAULT_END_GRACE_MS, DEFAULT_FRAME_SIZE, DEFAULT_SAMPLE_RATE,
};
use crate::error::ConfigError;

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub voice: VoiceSection,
    pub advanced: AdvancedSection,
    pub session: SessionSection,
    pub codec: CodecSection,
}

/// Volume, mute and spatial toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSection {
    /// Master volume applied to every source
    pub volume: f64,
    pub sound_occlusion: bool,
    pub directional_sources: bool,
    /// Volumes by key: line names and `source_<uuid>`
    pub volumes: HashMap<String, f64>,
    /// Mutes by line name
    pub mutes: HashMap<String, bool>,
}

impl Default for VoiceSection {
    fn default() -> Self {
        Self {
            volume: 1.0,
            sound_occlusion: false,
            directional_sources: false,
            volumes: HashMap::new(),
            mutes: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSection {
    pub panning: bool,
    pub stereo_sources_to_mono: bool,
}

impl Default for AdvancedSection {
    fn default() -> Self {
        Self {
            panning: true,
            stereo_sources_to_mono: false,
        }
    }
}

/// Session timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Silence after which an active source resets itself (0 disables)
    pub close_timeout_ms: u64,
    /// Grace period between an end packet and the reset it schedules
    pub end_grace_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            close_timeout_ms: DEFAULT_CLOSE_TIMEOUT_MS,
            end_grace_ms: DEFAULT_END_GRACE_MS,
        }
    }
}

/// Decoder parameters announced by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSection {
    pub sample_rate: u32,
    /// Samples per channel in one frame
    pub frame_size: usize,
}

impl Default for CodecSection {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
        }
    }
}

impl VoiceConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.voice.volume.is_finite() || self.voice.volume < 0.0 {
            return Err(ConfigError::Invalid {
                key: "voice.volume".into(),
                reason: format!("must be a non-negative number, got {}", self.voice.volume),
            });
        }
        if let Some((key, value)) = self
            .voice
            .volumes
            .iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(ConfigError::Invalid {
                key: format!("voice.volumes.{}", key),
                reason: format!("must be a non-negative number, got {}", value),
            });
        }
        if self.codec.sample_rate == 0 || self.codec.frame_size == 0 {
            return Err(ConfigError::Invalid {
                key: "codec".into(),
                reason: "sample rate and frame size must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Thread-safe handle to the live configuration
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<VoiceConfig>>,
}

impl SharedConfig {
    pub fn new(config: VoiceConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Apply an edit to the live configuration
    pub fn update(&self, edit: impl FnOnce(&mut VoiceConfig)) {
        edit(&mut *self.inner.write());
    }

    /// Clone of the current configuration
    pub fn snapshot(&self) -> VoiceConfig {
        self.inner.read().clone()
    }

    pub fn master_volume(&self) -> f64 {
        self.inner.read().voice.volume
    }

    /// Volume for a key, 1.0 when unset
    pub fn volume(&self, key: &str) -> f64 {
        self.inner.read().voice.volumes.get(key).copied().unwrap_or(1.0)
    }

    pub fn set_volume(&self, key: impl Into<String>, volume: f64) {
        self.inner.write().voice.volumes.insert(key.into(), volume);
    }

    /// Mute for a key, false when unset
    pub fn is_muted(&self, key: &str) -> bool {
        self.inner.read().voice.mutes.get(key).copied().unwrap_or(false)
    }

    pub fn set_muted(&self, key: impl Into<String>, muted: bool) {
        self.inner.write().voice.mutes.insert(key.into(), muted);
    }

    pub fn panning(&self) -> bool {
        self.inner.read().advanced.panning
    }

    pub fn stereo_to_mono(&self) -> bool {
        self.inner.read().advanced.stereo_sources_to_mono
    }

    pub fn directional_sources(&self) -> bool {
        self.inner.read().voice.directional_sources
    }

    pub fn sound_occlusion(&self) -> bool {
        self.inner.read().voice.sound_occlusion
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.read().session.close_timeout_ms)
    }

    pub fn end_grace(&self) -> Duration {
        Duration::from_millis(self.inner.read().session.end_grace_ms)
    }

    pub fn codec(&self) -> CodecSection {
        self.inner.read().codec.clone()
    }
}

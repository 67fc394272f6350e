//! Settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// VoiceId
// ---------------------------------------------------------------------------

/// The fixed set of voices offered by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceId {
    Zephyr,
    Puck,
    Charon,
    Kore,
    Fenrir,
}

impl VoiceId {
    /// Every selectable voice, in display order.
    pub const ALL: [VoiceId; 5] = [
        VoiceId::Zephyr,
        VoiceId::Puck,
        VoiceId::Charon,
        VoiceId::Kore,
        VoiceId::Fenrir,
    ];

    /// Human-readable name, as shown by the (external) voice selector.
    pub fn label(&self) -> &'static str {
        match self {
            VoiceId::Zephyr => "Zephyr",
            VoiceId::Puck => "Puck",
            VoiceId::Charon => "Charon",
            VoiceId::Kore => "Kore",
            VoiceId::Fenrir => "Fenrir",
        }
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        VoiceId::Zephyr
    }
}

// ---------------------------------------------------------------------------
// SessionSettings
// ---------------------------------------------------------------------------

/// Configuration handed to the transport when opening a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Which synthesized voice the service should answer with.
    pub voice: VoiceId,
    /// System prompt establishing the assistant's persona.
    pub system_prompt: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            voice: VoiceId::default(),
            system_prompt: "You are a friendly and helpful voice assistant. \
                            Keep your spoken answers concise."
                .into(),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureSettings
// ---------------------------------------------------------------------------

/// Microphone capture parameters.
///
/// The wire format is fixed; these are exposed for visibility, not tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Outbound sample rate in Hz (must be 16 000).
    pub sample_rate: u32,
    /// Samples per encoded block.
    pub block_samples: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            block_samples: 4_096,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackSettings
// ---------------------------------------------------------------------------

/// Playback-side parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Inbound sample rate in Hz (must be 24 000).
    pub sample_rate: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AnalyzerSettings
// ---------------------------------------------------------------------------

/// Tick cadence and tap sizing for the signal analyzers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    /// Engine tick rate in Hz (display-refresh cadence).
    pub tick_hz: u32,
    /// Samples retained by each audio tap.
    pub tap_window: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            tap_window: 4_096,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub session: SessionSettings,
    pub capture: CaptureSettings,
    pub playback: PlaybackSettings,
    pub analyzer: AnalyzerSettings,
}

impl AppConfig {
    /// Load the configuration from the platform settings file.
    ///
    /// A missing file yields `Default::default()` (first run); a present but
    /// malformed file is an error so a typo never silently reverts settings.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new())
    }

    fn load_from(paths: &AppPaths) -> Result<Self> {
        if !paths.settings_file.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&paths.settings_file)
            .with_context(|| format!("reading {}", paths.settings_file.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("parsing {}", paths.settings_file.display()))
    }

    /// Persist the configuration to the platform settings file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new())
    }

    fn save_to(&self, paths: &AppPaths) -> Result<()> {
        std::fs::create_dir_all(&paths.config_dir)
            .with_context(|| format!("creating {}", paths.config_dir.display()))?;
        let text = toml::to_string_pretty(self).context("serializing settings")?;
        std::fs::write(&paths.settings_file, text)
            .with_context(|| format!("writing {}", paths.settings_file.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Configuration — settings structs, the fixed voice set, platform paths,
//! and TOML persistence via [`AppConfig::load`] / [`AppConfig::save`].

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AnalyzerSettings, AppConfig, CaptureSettings, PlaybackSettings, SessionSettings, VoiceId,
};

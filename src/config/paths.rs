//! Cross-platform settings paths using the `dirs` crate.
//!
//! Layout:
//!   Windows: %APPDATA%\live-voice\settings.toml
//!   macOS:   ~/Library/Application Support/live-voice/settings.toml
//!   Linux:   ~/.config/live-voice/settings.toml

use std::path::PathBuf;

/// Resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "live-voice";

    /// Resolve paths via the `dirs` crate, falling back to the current
    /// directory when the platform cannot provide a standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let settings_file = config_dir.join("settings.toml");
        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_lives_in_config_dir() {
        let paths = AppPaths::new();
        assert!(paths.settings_file.starts_with(&paths.config_dir));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }
}

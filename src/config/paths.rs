//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\read-assist\
//!   macOS:   ~/Library/Application Support/read-assist/
//!   Linux:   ~/.config/read-assist/
//!
//! Data dir (downloaded results):
//!   Windows: %LOCALAPPDATA%\read-assist\
//!   macOS:   ~/Library/Application Support/read-assist/
//!   Linux:   ~/.local/share/read-assist/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory where finished job results are saved by default.
    pub results_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "read-assist";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let results_dir = data_dir.join("results");

        Self {
            config_dir,
            settings_file,
            results_dir,
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
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.results_dir.ends_with("results"));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }

    #[test]
    fn settings_file_lives_in_config_dir() {
        let paths = AppPaths::new();
        assert_eq!(paths.settings_file.parent(), Some(paths.config_dir.as_path()));
    }
}

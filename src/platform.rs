//! Platform-specific locations for sslcheck files.
//!
//! All functions fall back to a relative or temporary path when the
//! platform directory cannot be determined; none of them create anything.

use std::path::PathBuf;

const APP_DIR: &str = "sslcheck";

/// File name of the persisted scan database.
pub const STORE_FILE: &str = "scans_db.json";

/// Returns the directory holding persisted scan results.
///
/// Platform-specific locations:
/// - Linux: `~/.local/share/sslcheck/`
/// - macOS: `~/Library/Application Support/sslcheck/`
/// - Windows: `%APPDATA%\sslcheck\`
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Returns the directory holding the configuration file.
///
/// Platform-specific locations:
/// - Linux: `~/.config/sslcheck/`
/// - macOS: `~/Library/Application Support/sslcheck/`
/// - Windows: `%APPDATA%\sslcheck\`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default location of the persisted scan database.
pub fn default_store_path() -> PathBuf {
    data_dir().join(STORE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_path_file_name() {
        let path = default_store_path();
        assert!(path.ends_with("sslcheck/scans_db.json"));
    }

    #[test]
    fn test_config_dir_is_app_scoped() {
        assert!(config_dir().ends_with(APP_DIR));
    }
}

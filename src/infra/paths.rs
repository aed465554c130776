// src/infra/paths.rs — Config and data path management
//
// All paths respect the REGISTA_HOME environment variable for isolation.
// When unset, config lives in ~/.regista/ and data in the platform data dir.

use std::path::PathBuf;

fn regista_home() -> Option<PathBuf> {
    std::env::var_os("REGISTA_HOME").map(PathBuf::from)
}

/// Configuration directory: $REGISTA_HOME/ or ~/.regista/
pub fn config_dir() -> PathBuf {
    if let Some(home) = regista_home() {
        return home;
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".regista")
}

/// Data directory: $REGISTA_HOME/data/ or the platform-local data dir.
pub fn data_dir() -> PathBuf {
    if let Some(home) = regista_home() {
        return home.join("data");
    }
    dirs::data_local_dir()
        .unwrap_or_else(config_dir)
        .join("regista")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Notification queue database path.
pub fn queue_db_path() -> PathBuf {
    data_dir().join("regista.db")
}

use std::path::PathBuf;

/// Environment variable that relocates all Tern data.
pub const DATA_DIR_ENV: &str = "TERN_DATA_DIR";

/// Root data directory for Tern.
///
/// `TERN_DATA_DIR` wins when set; otherwise `~/.tern/`, falling back to a
/// relative `.tern` when no home directory is known.
pub fn tern_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".tern");
    }
    PathBuf::from(".tern")
}

/// Log directory (audit trail lives here).
pub fn tern_log_dir() -> PathBuf {
    tern_data_dir().join("logs")
}

/// State directory (store snapshots live here).
pub fn tern_state_dir() -> PathBuf {
    tern_data_dir().join("state")
}

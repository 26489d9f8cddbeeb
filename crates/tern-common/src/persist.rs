//! JSON file helpers shared by config loading and store snapshots.

use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

fn invalid_data(e: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Read and decode a JSON file. `None` when the file does not exist.
pub fn read_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, io::Error> {
    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str(&json).map(Some).map_err(invalid_data),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read a JSON file, or `T::default()` when it is missing.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, io::Error> {
    Ok(read_json_if_exists(path)?.unwrap_or_default())
}

/// Write `value` as pretty JSON. Readers never observe a partial file:
/// the bytes land in a sibling temp file which is then renamed over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value).map_err(invalid_data)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

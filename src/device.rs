//! Persistent device identity sent as `clientID` on session bootstrap

use std::fs;
use std::path::Path;

use log::info;

use crate::error::{GuideError, Result};

/// Read the device id from `path`, or generate 12 random bytes (hex) and store them.
/// The file holds the id as a JSON string.
pub fn load_or_create(path: &Path) -> Result<String> {
    if path.exists() {
        let content = fs::read_to_string(path).map_err(|e| GuideError::persistence(path, e))?;
        let id: String = serde_json::from_str(&content)
            .map_err(|e| GuideError::Config(format!("{}: {}", path.display(), e)))?;
        return Ok(id);
    }

    let bytes: [u8; 12] = rand::random();
    let id = hex::encode(bytes);
    let content = serde_json::to_string(&id)?;
    fs::write(path, content).map_err(|e| GuideError::persistence(path, e))?;
    info!("Generated new device id in {}", path.display());
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_then_reuses_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pluto-device.json");

        let first = load_or_create(&path).unwrap();
        let second = load_or_create(&path).unwrap();

        assert_eq!(first.len(), 24);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("\"{}\"", first));
    }

    #[test]
    fn test_reads_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, "\"0123456789abcdef01234567\"").unwrap();

        assert_eq!(load_or_create(&path).unwrap(), "0123456789abcdef01234567");
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(load_or_create(&path), Err(GuideError::Config(_))));
    }
}

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::trace;

use super::StorageBackend;
use crate::error::StorageError;

/// Durable storage keeping one `<key>.json` file per key.
///
/// Files are replaced atomically: the text is written to a sibling
/// temporary file which is then renamed over the target. There is no
/// change signal.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Location of the file backing `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{key}.json")))
    }
}

/// Rejects keys that are unsafe as file names: empty keys, path
/// separators, `..`, NUL and other control characters.
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.contains('/') || key.contains('\\') || key.contains("..") || key.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "key contains invalid characters: {key:?}"
        )));
    }
    if key.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidKey(format!(
            "key contains control characters: {key:?}"
        )));
    }
    Ok(())
}

impl StorageBackend for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn store(&self, key: &str, text: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.base_path)?;
        let tmp = self.base_path.join(format!("{key}.json.tmp"));
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        trace!("stored {} bytes at {}", text.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));
        assert_eq!(storage.load("app").unwrap(), None);
        storage.store("app", r#"{"a":1}"#).unwrap();
        assert_eq!(storage.load("app").unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert!(dir.path().join("nested").join("app.json").exists());
        assert!(!dir.path().join("nested").join("app.json.tmp").exists());
    }

    #[test]
    fn dotted_keys_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.store("json-joy-state.client", "{}").unwrap();
        assert!(dir.path().join("json-joy-state.client.json").exists());
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        let storage = FileStorage::new("unused");
        for key in ["", "a/b", "a\\b", "..", "a\0b", "a\nb"] {
            assert!(
                matches!(storage.path_for(key), Err(StorageError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }
}

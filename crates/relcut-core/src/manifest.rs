//! Persisted version record.
//!
//! The record is a JSON document (`package.json` by default) whose top-level
//! `version` field holds the current version string. Every other field, and
//! the order of keys, survives a write.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

/// Name of the field holding the version string.
const VERSION_FIELD: &str = "version";

/// Errors from reading or writing the version record.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The record could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the record.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The record is not a JSON object.
    #[error("{path} is not a valid JSON object: {message}")]
    Parse {
        /// Path of the record.
        path: Utf8PathBuf,
        /// Parser message.
        message: String,
    },

    /// The `version` field is absent or not a string.
    #[error("{path} has no string `version` field")]
    MissingVersion {
        /// Path of the record.
        path: Utf8PathBuf,
    },

    /// The record could not be written back.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path of the record.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Durable storage for the current version string.
pub trait VersionStore {
    /// Read the current version string exactly as stored.
    fn read_version(&self) -> ManifestResult<String>;

    /// Replace the stored version string.
    ///
    /// From the caller's perspective the write is atomic: the record either
    /// holds the old version or the new one.
    fn write_version(&mut self, version: &str) -> ManifestResult<()>;

    /// Path to stage when committing the updated record.
    fn path(&self) -> &Utf8Path;
}

/// A JSON manifest on disk.
#[derive(Debug, Clone)]
pub struct JsonManifest {
    path: Utf8PathBuf,
}

impl JsonManifest {
    /// Point at a manifest file. Nothing is read until [`VersionStore::read_version`].
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> ManifestResult<Map<String, Value>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| ManifestError::Read {
            path: self.path.clone(),
            source,
        })?;

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ManifestError::Parse {
                path: self.path.clone(),
                message: "top-level value is not an object".into(),
            }),
            Err(e) => Err(ManifestError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn write_error(&self, source: std::io::Error) -> ManifestError {
        ManifestError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl VersionStore for JsonManifest {
    #[instrument(skip(self), fields(path = %self.path))]
    fn read_version(&self) -> ManifestResult<String> {
        let doc = self.load()?;
        let version = doc
            .get(VERSION_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| ManifestError::MissingVersion {
                path: self.path.clone(),
            })?;
        debug!(%version, "read stored version");
        Ok(version.to_string())
    }

    #[instrument(skip(self), fields(path = %self.path))]
    fn write_version(&mut self, version: &str) -> ManifestResult<()> {
        let mut doc = self.load()?;
        doc.insert(VERSION_FIELD.to_string(), Value::String(version.to_string()));

        let mut rendered = serde_json::to_string_pretty(&Value::Object(doc))
            .map_err(|e| self.write_error(std::io::Error::other(e)))?;
        rendered.push('\n');

        // Write next to the target so the rename stays on one filesystem
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        tmp.write_all(rendered.as_bytes())
            .map_err(|e| self.write_error(e))?;
        // The temp file starts out 0600; keep the record's original mode
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| self.write_error(e))?;
        }
        tmp.as_file().sync_all().map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        debug!(%version, "wrote stored version");
        Ok(())
    }

    fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// In-memory version store for tests and dry runs.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: Utf8PathBuf,
    version: Option<String>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryStore {
    /// Create a store holding `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            path: Utf8PathBuf::from("package.json"),
            version: Some(version.into()),
            fail_writes: false,
            writes: 0,
        }
    }

    /// Create a store with no version recorded.
    pub fn empty() -> Self {
        Self {
            version: None,
            ..Self::new("")
        }
    }

    /// Make every subsequent write fail.
    pub const fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// The currently stored version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Number of successful writes.
    pub const fn writes(&self) -> usize {
        self.writes
    }
}

impl VersionStore for MemoryStore {
    fn read_version(&self) -> ManifestResult<String> {
        self.version
            .clone()
            .ok_or_else(|| ManifestError::MissingVersion {
                path: self.path.clone(),
            })
    }

    fn write_version(&mut self, version: &str) -> ManifestResult<()> {
        if self.fail_writes {
            return Err(ManifestError::Write {
                path: self.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.version = Some(version.to_string());
        self.writes += 1;
        Ok(())
    }

    fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn manifest_in(tmp: &TempDir, contents: &str) -> JsonManifest {
        let path = tmp.path().join("package.json");
        fs::write(&path, contents).unwrap();
        JsonManifest::new(Utf8PathBuf::try_from(path).unwrap())
    }

    #[test]
    fn reads_version_field() {
        let tmp = TempDir::new().unwrap();
        let manifest = manifest_in(&tmp, r#"{"name": "widget", "version": "1.2.3"}"#);
        assert_eq!(manifest.read_version().unwrap(), "1.2.3");
    }

    #[test]
    fn reads_prefixed_version_verbatim() {
        let tmp = TempDir::new().unwrap();
        let manifest = manifest_in(&tmp, r#"{"version": "v2.4.9"}"#);
        assert_eq!(manifest.read_version().unwrap(), "v2.4.9");
    }

    #[test]
    fn missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("nope.json")).unwrap();
        let err = JsonManifest::new(path).read_version().unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn missing_field_is_reported() {
        let tmp = TempDir::new().unwrap();
        let manifest = manifest_in(&tmp, r#"{"name": "widget"}"#);
        assert!(matches!(
            manifest.read_version().unwrap_err(),
            ManifestError::MissingVersion { .. }
        ));
    }

    #[test]
    fn non_string_field_is_reported() {
        let tmp = TempDir::new().unwrap();
        let manifest = manifest_in(&tmp, r#"{"version": 3}"#);
        assert!(matches!(
            manifest.read_version().unwrap_err(),
            ManifestError::MissingVersion { .. }
        ));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let manifest = manifest_in(&tmp, "{ not json");
        assert!(matches!(
            manifest.read_version().unwrap_err(),
            ManifestError::Parse { .. }
        ));
    }

    #[test]
    fn array_document_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let manifest = manifest_in(&tmp, r#"["1.2.3"]"#);
        assert!(matches!(
            manifest.read_version().unwrap_err(),
            ManifestError::Parse { .. }
        ));
    }

    #[test]
    fn write_preserves_other_fields_and_order() {
        let tmp = TempDir::new().unwrap();
        let mut manifest = manifest_in(
            &tmp,
            r#"{"name": "widget", "version": "1.2.3", "scripts": {"test": "jest"}}"#,
        );
        manifest.write_version("1.3.0").unwrap();

        let written = fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(
            written,
            "{\n  \"name\": \"widget\",\n  \"version\": \"1.3.0\",\n  \"scripts\": {\n    \"test\": \"jest\"\n  }\n}\n"
        );
        assert_eq!(manifest.read_version().unwrap(), "1.3.0");
    }

    #[test]
    fn write_adds_missing_field() {
        let tmp = TempDir::new().unwrap();
        let mut manifest = manifest_in(&tmp, r#"{"name": "widget"}"#);
        manifest.write_version("0.1.0").unwrap();
        assert_eq!(manifest.read_version().unwrap(), "0.1.0");
    }

    #[test]
    fn write_leaves_no_temp_files_behind() {
        let tmp = TempDir::new().unwrap();
        let mut manifest = manifest_in(&tmp, r#"{"version": "1.0.0"}"#);
        manifest.write_version("1.0.1").unwrap();
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn write_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let mut manifest = manifest_in(&tmp, r#"{"version": "1.2.3"}"#);
        fs::set_permissions(manifest.path(), fs::Permissions::from_mode(0o644)).unwrap();

        manifest.write_version("1.3.0").unwrap();

        let mode = fs::metadata(manifest.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        assert_eq!(manifest.read_version().unwrap(), "1.3.0");
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new("1.2.3");
        assert_eq!(store.read_version().unwrap(), "1.2.3");
        store.write_version("1.2.4").unwrap();
        assert_eq!(store.version(), Some("1.2.4"));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn memory_store_empty_and_failing() {
        assert!(MemoryStore::empty().read_version().is_err());

        let mut store = MemoryStore::new("1.0.0").failing_writes();
        assert!(matches!(
            store.write_version("2.0.0").unwrap_err(),
            ManifestError::Write { .. }
        ));
        assert_eq!(store.version(), Some("1.0.0"));
    }
}

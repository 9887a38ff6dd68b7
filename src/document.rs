//! Property list documents.
//!
//! A [`PlistDocument`] is a dictionary-rooted property list together with the
//! encoding it was read in, so it can be written back the same way. Writes go
//! through a temporary file in the target directory and are renamed into
//! place, leaving the original untouched if encoding fails.

use crate::error::{Error, PlistRole, Result};
use plist::{Dictionary, Value};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// Magic prefix of binary property lists.
const BINARY_MAGIC: &[u8] = b"bplist";

/// On-disk encoding of a property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlistFormat {
    /// XML property list.
    #[default]
    Xml,
    /// Binary property list (`bplist00`).
    Binary,
}

impl PlistFormat {
    /// Detect the encoding from the file's leading bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(BINARY_MAGIC) {
            PlistFormat::Binary
        } else {
            PlistFormat::Xml
        }
    }
}

/// A dictionary-rooted property list on disk.
#[derive(Debug, Clone)]
pub struct PlistDocument {
    path: PathBuf,
    format: PlistFormat,
    root: Dictionary,
}

impl PlistDocument {
    /// Open an existing property list.
    ///
    /// Fails with [`Error::PlistNotFound`] if `path` is not a file.
    pub fn open(path: impl Into<PathBuf>, role: PlistRole) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::PlistNotFound { role, path });
        }
        Self::read(path)
    }

    /// Open a property list, or start an empty XML one if it does not exist.
    pub fn open_or_default(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.is_file() {
            Self::read(path)
        } else {
            tracing::debug!(path = %path.display(), "property list not found, starting empty");
            Ok(Self::empty(path))
        }
    }

    /// An empty XML document that will be written to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: PlistFormat::Xml,
            root: Dictionary::new(),
        }
    }

    fn read(path: PathBuf) -> Result<Self> {
        let bytes = std::fs::read(&path).map_err(|e| Error::plist_read(&path, e))?;
        let format = PlistFormat::detect(&bytes);

        let value = Value::from_reader(Cursor::new(&bytes)).map_err(|e| Error::plist_read(&path, e))?;
        let root = value
            .into_dictionary()
            .ok_or_else(|| Error::plist_read(&path, "root object is not a dictionary"))?;

        tracing::debug!(path = %path.display(), format = ?format, keys = root.len(), "loaded property list");
        Ok(Self { path, format, root })
    }

    /// Path the document is read from and written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding used when saving.
    pub fn format(&self) -> PlistFormat {
        self.format
    }

    /// The root dictionary.
    pub fn root(&self) -> &Dictionary {
        &self.root
    }

    /// String value stored under `key`, if any.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.root.get(key).and_then(Value::as_string)
    }

    /// Set `key`, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.root.insert(key.to_string(), value.into());
    }

    /// Encode the document in its format.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let value = Value::Dictionary(self.root.clone());
        let mut buf = Vec::new();
        let encoded = match self.format {
            PlistFormat::Xml => value.to_writer_xml(&mut buf),
            PlistFormat::Binary => value.to_writer_binary(&mut buf),
        };
        encoded.map_err(|e| Error::plist_write(&self.path, e))?;
        Ok(buf)
    }

    /// Render the document as XML for diagnostics.
    pub fn to_xml_string(&self) -> String {
        let mut buf = Vec::new();
        match Value::Dictionary(self.root.clone()).to_writer_xml(&mut buf) {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(e) => format!("<unrenderable: {}>", e),
        }
    }

    /// Write the document back to its path, creating the file if needed.
    pub fn save(&self) -> Result<()> {
        let bytes = self.encode()?;
        let write_err = |e: std::io::Error| Error::plist_write(&self.path, e);

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let existing = std::fs::metadata(&self.path).ok();

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        // Keep the original file mode instead of the temp file's 0600.
        let permissions = match existing {
            Some(meta) => Some(meta.permissions()),
            None => default_permissions(),
        };
        if let Some(permissions) = permissions {
            std::fs::set_permissions(tmp.path(), permissions).map_err(write_err)?;
        }

        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        tracing::info!(path = %self.path.display(), format = ?self.format, "wrote property list");
        Ok(())
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<std::fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("CFBundleIdentifier".to_string(), Value::from("com.example.App"));
        dict.insert(
            "LSMinimumSystemVersion".to_string(),
            Value::from("10.15"),
        );
        dict.insert(
            "CFBundleURLTypes".to_string(),
            Value::Array(vec![Value::from("one"), Value::from("two")]),
        );
        dict
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(PlistFormat::detect(b"bplist00\x00"), PlistFormat::Binary);
        assert_eq!(PlistFormat::detect(b"<?xml version"), PlistFormat::Xml);
        assert_eq!(PlistFormat::detect(b""), PlistFormat::Xml);
    }

    #[test]
    fn test_open_missing_file_reports_role() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlistDocument::open(dir.path().join("Info.plist"), PlistRole::AppInfo)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PlistNotFound {
                role: PlistRole::AppInfo,
                ..
            }
        ));
    }

    #[test]
    fn test_open_garbage_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Info.plist");
        std::fs::write(&path, "not a plist").unwrap();

        let err = PlistDocument::open(&path, PlistRole::AppInfo).unwrap_err();
        assert!(matches!(err, Error::PlistRead { .. }));
    }

    #[test]
    fn test_open_non_dictionary_root_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Info.plist");
        Value::Array(vec![Value::from("x")]).to_file_xml(&path).unwrap();

        let err = PlistDocument::open(&path, PlistRole::HelperInfo).unwrap_err();
        assert!(err.to_string().contains("not a dictionary"));
    }

    #[test]
    fn test_save_preserves_xml_format_and_untouched_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Info.plist");
        Value::Dictionary(sample()).to_file_xml(&path).unwrap();

        let mut doc = PlistDocument::open(&path, PlistRole::AppInfo).unwrap();
        assert_eq!(doc.format(), PlistFormat::Xml);
        doc.set("SMPrivilegedExecutables", Value::from("changed"));
        doc.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("<?xml"));

        let reread = PlistDocument::open(&path, PlistRole::AppInfo).unwrap();
        let mut expected = sample();
        expected.insert("SMPrivilegedExecutables".to_string(), Value::from("changed"));
        assert_eq!(reread.root(), &expected);
    }

    #[test]
    fn test_save_preserves_binary_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Info.plist");
        Value::Dictionary(sample()).to_file_binary(&path).unwrap();

        let mut doc = PlistDocument::open(&path, PlistRole::AppInfo).unwrap();
        assert_eq!(doc.format(), PlistFormat::Binary);
        doc.set("Label", "com.example.App.helper");
        doc.save().unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(BINARY_MAGIC));

        let reread = PlistDocument::open(&path, PlistRole::AppInfo).unwrap();
        assert_eq!(reread.get_str("Label"), Some("com.example.App.helper"));
        assert_eq!(reread.get_str("CFBundleIdentifier"), Some("com.example.App"));
    }

    #[test]
    fn test_open_or_default_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launchd.plist");

        let doc = PlistDocument::open_or_default(&path).unwrap();
        assert!(doc.root().is_empty());
        assert_eq!(doc.format(), PlistFormat::Xml);

        doc.save().unwrap();
        assert!(path.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Info.plist");
        Value::Dictionary(sample()).to_file_xml(&path).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o664)).unwrap();

        let doc = PlistDocument::open(&path, PlistRole::AppInfo).unwrap();
        doc.save().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }

    #[test]
    fn test_to_xml_string_contains_keys() {
        let mut doc = PlistDocument::empty("unused.plist");
        doc.set("Label", "com.example.App.helper");
        let xml = doc.to_xml_string();
        assert!(xml.contains("<key>Label</key>"));
        assert!(xml.contains("com.example.App.helper"));
    }
}

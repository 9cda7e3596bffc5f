//! Dependency manifest discovery and format-preserving JSON patching.
//!
//! Manifests are parsed into their top-level entries, each kept as the raw
//! JSON text it was written with. Only a section that gets patched is parsed
//! further, so untouched values (number literals included) are written back
//! byte for byte. The result keeps the indentation, line endings and trailing
//! newline of the original file. The write replaces the file atomically: the
//! new content goes to a temporary file in the same directory which is then
//! renamed over the original.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

use crate::{Error, Result};

/// Find the nearest file called `file_name` in `start` or any of its parents.
///
/// # Errors
///
/// Returns [`Error::ManifestNotFound`] when the filesystem root is reached
/// without a match.
pub fn find_upward(start: &Path, file_name: &str) -> Result<PathBuf> {
    let start = absolute(start)?;
    let mut dir = start.as_path();
    loop {
        let candidate = dir.join(file_name);
        trace!(?candidate, "Looking for manifest");
        if candidate.is_file() {
            debug!(manifest = %candidate.display(), "Found manifest");
            return Ok(candidate);
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Err(Error::ManifestNotFound { start }),
        }
    }
}

/// Express `target` relative to `base_dir` using forward slashes.
///
/// Both paths are made absolute against the current directory first. If they
/// share no common root (different drives on Windows) the absolute target is
/// returned instead.
///
/// # Errors
///
/// Fails only when the current directory cannot be determined.
pub fn relative_slash_path(base_dir: &Path, target: &Path) -> Result<String> {
    let base = absolute(base_dir)?;
    let target = absolute(target)?;

    let base_parts: Vec<Component<'_>> = base.components().collect();
    let target_parts: Vec<Component<'_>> = target.components().collect();

    let common = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return Ok(to_slash(&target));
    }

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }
    Ok(to_slash(&relative))
}

/// Make a path absolute and lexically normalize `.` and `..` components.
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = std::path::absolute(path)
        .map_err(|e| Error::io(e, path, "resolving absolute path"))?;
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

fn to_slash(path: &Path) -> String {
    let mut rooted = false;
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::RootDir => rooted = true,
            other => parts.push(other.as_os_str().to_string_lossy().replace('\\', "/")),
        }
    }
    let joined = parts.join("/");
    if rooted && !cfg!(windows) {
        format!("/{joined}")
    } else {
        joined
    }
}

fn encoding_failed(path: &Path, source: impl Into<std::io::Error>) -> Error {
    Error::ManifestWrite {
        path: path.to_path_buf(),
        source: source.into(),
    }
}

/// Whitespace conventions detected in an existing document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layout {
    indent: String,
    crlf: bool,
    trailing_newline: bool,
}

impl Layout {
    fn detect(source: &str) -> Self {
        let indent = source
            .lines()
            .skip(1)
            .find_map(|line| {
                let width = line.len() - line.trim_start_matches([' ', '\t']).len();
                (width > 0 && !line.trim().is_empty()).then(|| line[..width].to_string())
            })
            .unwrap_or_else(|| "  ".to_string());
        Self {
            indent,
            crlf: source.contains("\r\n"),
            trailing_newline: source.ends_with('\n'),
        }
    }
}

/// A JSON object whose values are kept as raw text, in document order.
#[derive(Debug, Clone, Default)]
struct RawObject(Vec<(String, Box<RawValue>)>);

impl RawObject {
    fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn get(&self, key: &str) -> Option<&RawValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_ref())
    }
}

impl<'de> Deserialize<'de> for RawObject {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ObjectVisitor;

        impl<'de> Visitor<'de> for ObjectVisitor {
            type Value = RawObject;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<RawObject, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, Box<RawValue>>()? {
                    entries.push(entry);
                }
                Ok(RawObject(entries))
            }
        }

        deserializer.deserialize_map(ObjectVisitor)
    }
}

impl Serialize for RawObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A JSON manifest loaded from disk.
#[derive(Debug, Clone)]
pub struct JsonManifest {
    path: PathBuf,
    document: RawObject,
    layout: Layout,
}

impl JsonManifest {
    /// Load and parse the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read and
    /// [`Error::InvalidManifest`] when it is not a JSON object.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, path, "reading manifest"))?;
        Self::from_source(path, &source)
    }

    fn from_source(path: &Path, source: &str) -> Result<Self> {
        let document = RawObject::parse(source)
            .map_err(|e| Error::invalid_manifest(path, format!("not a JSON object: {e}")))?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
            layout: Layout::detect(source),
        })
    }

    /// Path the manifest was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a string entry from a top-level section.
    #[must_use]
    pub fn entry(&self, section: &str, key: &str) -> Option<String> {
        let entries = RawObject::parse(self.document.get(section)?.get()).ok()?;
        serde_json::from_str(entries.get(key)?.get()).ok()
    }

    /// Insert or overwrite `section[key] = value`, creating the section.
    ///
    /// New keys are appended after existing ones; an existing key keeps its
    /// position. Returns whether the document changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] when `section` exists but is not an
    /// object.
    pub fn upsert(&mut self, section: &str, key: &str, value: &str) -> Result<bool> {
        let mut entries = match self.document.get(section) {
            Some(raw) => RawObject::parse(raw.get()).map_err(|_| {
                Error::invalid_manifest(&self.path, format!("'{section}' must be an object"))
            })?,
            None => RawObject::default(),
        };

        let encoded = serde_json::to_string(value)
            .and_then(RawValue::from_string)
            .map_err(|e| encoding_failed(&self.path, e))?;
        match entries.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, current)) => {
                if serde_json::from_str::<String>(current.get()).is_ok_and(|s| s == value) {
                    return Ok(false);
                }
                *current = encoded;
            }
            None => entries.0.push((key.to_string(), encoded)),
        }

        let section_raw = self.encode_section(&entries)?;
        match self.document.0.iter_mut().find(|(k, _)| k == section) {
            Some((_, slot)) => *slot = section_raw,
            None => self.document.0.push((section.to_string(), section_raw)),
        }
        Ok(true)
    }

    /// Pretty-print a patched top-level section, indented for depth one.
    fn encode_section(&self, entries: &RawObject) -> Result<Box<RawValue>> {
        let indent = &self.layout.indent;
        let text = self.pretty(entries)?;
        RawValue::from_string(text.replace('\n', &format!("\n{indent}")))
            .map_err(|e| encoding_failed(&self.path, e))
    }

    fn pretty(&self, value: &impl Serialize) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(self.layout.indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|e| encoding_failed(&self.path, e))?;
        String::from_utf8(buf).map_err(|e| {
            encoding_failed(&self.path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// Render the document using the original file's layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestWrite`] if the document cannot be encoded.
    pub fn render(&self) -> Result<String> {
        // Raw values carry the source's own line endings.
        let mut rendered = self.pretty(&self.document)?.replace("\r\n", "\n");
        if self.layout.trailing_newline {
            rendered.push('\n');
        }
        if self.layout.crlf {
            rendered = rendered.replace('\n', "\r\n");
        }
        Ok(rendered)
    }

    /// Atomically replace the manifest on disk with the rendered document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestWrite`] on any I/O failure.
    pub fn save(&self) -> Result<()> {
        let rendered = self.render()?;
        let write_error = |source| Error::ManifestWrite {
            path: self.path.clone(),
            source,
        };

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        temp.write_all(rendered.as_bytes()).map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;
        if let Ok(metadata) = std::fs::metadata(&self.path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(write_error)?;
        }
        temp.persist(&self.path)
            .map_err(|e| write_error(e.error))?;

        debug!(manifest = %self.path.display(), bytes = rendered.len(), "Wrote manifest");
        Ok(())
    }
}

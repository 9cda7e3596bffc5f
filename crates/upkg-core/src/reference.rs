//! Artifact reference parsing.
//!
//! A reference has the shape `registry[:port]/[org/]repo[:tag]`. The package
//! name is the final path component and the version is the tag, defaulting
//! to [`DEFAULT_VERSION`] when none is given.
//!
//! A colon may introduce either a registry port or a tag. It is only treated
//! as a tag separator when it appears after the last `/`, so
//! `localhost:5000/pkg` has no tag while `localhost:5000/pkg:1.0.0` does.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Version used when the reference carries no tag.
pub const DEFAULT_VERSION: &str = "latest";

/// A parsed artifact reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageReference {
    raw: String,
    registry: String,
    namespace: Option<String>,
    name: String,
    version: String,
    explicit_tag: bool,
}

impl PackageReference {
    /// Parse a reference string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] when the string is empty, has fewer
    /// than two or more than three path segments, contains an empty segment,
    /// or carries an empty tag or a digest.
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.is_empty() {
            return Err(Error::invalid_reference(reference, "reference is empty"));
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(Error::invalid_reference(
                reference,
                "reference must not contain whitespace",
            ));
        }
        if reference.contains('@') {
            return Err(Error::invalid_reference(
                reference,
                "digest references are not supported, use a tag",
            ));
        }

        let (path, tag) = split_tag(reference);
        if tag == Some("") {
            return Err(Error::invalid_reference(reference, "tag is empty"));
        }

        let segments: Vec<&str> = path.split('/').collect();
        let (registry, namespace, name) = match segments.as_slice() {
            [registry, name] => (*registry, None, *name),
            [registry, namespace, name] => (*registry, Some(*namespace), *name),
            [_] => {
                return Err(Error::invalid_reference(
                    reference,
                    "expected 'registry/repo' or 'registry/org/repo'",
                ));
            }
            _ => {
                return Err(Error::invalid_reference(
                    reference,
                    format!(
                        "expected at most 3 path segments, found {}",
                        segments.len()
                    ),
                ));
            }
        };

        if registry.is_empty() {
            return Err(Error::invalid_reference(reference, "registry host is empty"));
        }
        if namespace.is_some_and(str::is_empty) {
            return Err(Error::invalid_reference(reference, "organization is empty"));
        }
        if name.is_empty() {
            return Err(Error::invalid_reference(
                reference,
                "repository name is empty",
            ));
        }
        for component in namespace.into_iter().chain([name]) {
            if !is_path_component(component) {
                return Err(Error::invalid_reference(
                    reference,
                    format!(
                        "'{component}' is not a valid repository component \
                         (lowercase letters and digits, separated by '.', '_', '__' or dashes)"
                    ),
                ));
            }
        }

        Ok(Self {
            raw: reference.to_string(),
            registry: registry.to_string(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            version: tag.unwrap_or(DEFAULT_VERSION).to_string(),
            explicit_tag: tag.is_some(),
        })
    }

    /// The reference exactly as it was given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Registry host, including the port if one was given.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Path between the registry host and the final component.
    ///
    /// Empty when the reference has no organization.
    #[must_use]
    pub fn repository_path(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }

    /// Full repository: `org/repo`, or just `repo`.
    #[must_use]
    pub fn repository(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Package name inferred from the final path component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package version inferred from the tag.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the version came from an explicit tag.
    #[must_use]
    pub const fn has_explicit_tag(&self) -> bool {
        self.explicit_tag
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository(), self.version)
    }
}

impl FromStr for PackageReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split `path[:tag]`, treating a colon as a tag separator only when it
/// follows the last slash.
fn split_tag(reference: &str) -> (&str, Option<&str>) {
    let Some(colon) = reference.rfind(':') else {
        return (reference, None);
    };
    match reference.rfind('/') {
        Some(slash) if colon < slash => (reference, None),
        _ => (&reference[..colon], Some(&reference[colon + 1..])),
    }
}

/// Whether `component` matches the OCI path component grammar
/// `[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*`.
///
/// This also keeps `.` and `..` out of the repository, which is joined onto
/// the download root.
fn is_path_component(component: &str) -> bool {
    let alphanumeric = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let bytes = component.as_bytes();
    if !bytes.first().is_some_and(alphanumeric) || !bytes.last().is_some_and(alphanumeric) {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        if alphanumeric(&bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !alphanumeric(&bytes[i]) {
            i += 1;
        }
        let separator = &component[start..i];
        let valid = matches!(separator, "." | "_" | "__") || separator.bytes().all(|b| b == b'-');
        if !valid {
            return false;
        }
    }
    true
}

/// Explicit package coordinates that take precedence over the reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOverrides {
    /// Package name to use instead of the inferred one.
    pub name: Option<String>,
    /// Package version to use instead of the inferred one.
    pub version: Option<String>,
}

impl PackageOverrides {
    /// Resolve the effective `(name, version)` for a reference.
    ///
    /// Empty override strings count as absent.
    #[must_use]
    pub fn resolve(&self, reference: &PackageReference) -> (String, String) {
        let pick = |explicit: &Option<String>, inferred: &str| {
            explicit
                .as_deref()
                .filter(|value| !value.is_empty())
                .unwrap_or(inferred)
                .to_string()
        };
        (
            pick(&self.name, reference.name()),
            pick(&self.version, reference.version()),
        )
    }
}

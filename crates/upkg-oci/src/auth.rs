//! Registry credential resolution.
//!
//! Credentials for a registry host are looked up in order:
//!
//! 1. `UPKG_REGISTRY_USERNAME` / `UPKG_REGISTRY_PASSWORD`
//! 2. `GITHUB_TOKEN` or `GH_TOKEN`, for `ghcr.io` only
//! 3. the `auths` entry for the host in the Docker config file
//!    (`$DOCKER_CONFIG/config.json`, else `~/.docker/config.json`)
//!
//! and fall back to anonymous access.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use oci_distribution::secrets::RegistryAuth;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::{Error, Result};

/// Username variable for explicit credentials.
pub const USERNAME_ENV: &str = "UPKG_REGISTRY_USERNAME";
/// Password variable for explicit credentials.
pub const PASSWORD_ENV: &str = "UPKG_REGISTRY_PASSWORD";

const GHCR: &str = "ghcr.io";
const GITHUB_TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];
// Docker stores identity tokens under this placeholder user name.
const IDENTITY_TOKEN_USER: &str = "<token>";

/// Credentials for one registry.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// No credentials.
    Anonymous,
    /// HTTP basic credentials.
    Basic {
        /// User name.
        username: String,
        /// Password or token.
        password: String,
    },
}

impl Credential {
    fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

impl From<&Credential> for RegistryAuth {
    fn from(credential: &Credential) -> Self {
        match credential {
            Credential::Anonymous => Self::Anonymous,
            Credential::Basic { username, password } => {
                Self::Basic(username.clone(), password.clone())
            }
        }
    }
}

/// Resolve credentials for `registry` (host, optionally with port).
///
/// # Errors
///
/// Returns [`Error::AuthConfig`] when the Docker config exists but cannot be
/// parsed or its entry for the host is malformed.
pub fn resolve(registry: &str) -> Result<Credential> {
    if let Some(credential) = from_env(registry) {
        return Ok(credential);
    }

    if let Some(path) = docker_config_path() {
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                if let Some(credential) = from_docker_config(&path, &contents, registry)? {
                    debug!(registry, config = %path.display(), "Using Docker config credentials");
                    return Ok(credential);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(config = %path.display(), "No Docker config");
            }
            Err(e) => return Err(Error::auth_config(path, e.to_string())),
        }
    }

    debug!(registry, "Using anonymous access");
    Ok(Credential::Anonymous)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn from_env(registry: &str) -> Option<Credential> {
    if let (Some(username), Some(password)) = (non_empty_var(USERNAME_ENV), non_empty_var(PASSWORD_ENV)) {
        debug!(registry, "Using credentials from {USERNAME_ENV}");
        return Some(Credential::basic(username, password));
    }

    if registry == GHCR {
        for var in GITHUB_TOKEN_VARS {
            if let Some(token) = non_empty_var(var) {
                debug!(registry, source = var, "Using GitHub token");
                return Some(Credential::basic("", token));
            }
        }
    }
    None
}

/// Location of the Docker CLI config file.
fn docker_config_path() -> Option<PathBuf> {
    match std::env::var_os("DOCKER_CONFIG") {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir).join("config.json")),
        _ => dirs::home_dir().map(|home| home.join(".docker").join("config.json")),
    }
}

#[derive(Debug, Default, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Default, Deserialize)]
struct DockerAuth {
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
    identitytoken: Option<String>,
}

/// Strip the scheme and any path from a Docker `auths` key.
fn auth_key_host(key: &str) -> &str {
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    key.split('/').next().unwrap_or(key)
}

/// Credentials for `registry` from Docker config `contents`, if any.
fn from_docker_config(path: &Path, contents: &str, registry: &str) -> Result<Option<Credential>> {
    let config: DockerConfig =
        serde_json::from_str(contents).map_err(|e| Error::auth_config(path, e.to_string()))?;

    let Some(entry) = config
        .auths
        .iter()
        .find(|(key, _)| auth_key_host(key) == registry)
        .map(|(_, entry)| entry)
    else {
        return Ok(None);
    };

    if let Some(encoded) = entry.auth.as_deref().filter(|a| !a.is_empty()) {
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| Error::auth_config(path, format!("auth for {registry} is not base64: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| Error::auth_config(path, format!("auth for {registry} is not UTF-8")))?;
        let (username, password) = decoded.split_once(':').ok_or_else(|| {
            Error::auth_config(path, format!("auth for {registry} is not 'user:password'"))
        })?;
        return Ok(Some(Credential::basic(username, password)));
    }

    if let (Some(username), Some(password)) = (&entry.username, &entry.password) {
        return Ok(Some(Credential::basic(username.as_str(), password.as_str())));
    }

    if let Some(token) = entry.identitytoken.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Some(Credential::basic(IDENTITY_TOKEN_USER, token)));
    }

    // Entry present without inline secrets (credential helper); nothing usable.
    Ok(None)
}

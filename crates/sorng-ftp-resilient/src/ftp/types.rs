//! Shared types for the FTP crate.

use crate::ftp::auth::UserAuthenticator;
use crate::ftp::error::{FtpError, FtpResult};
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_FTP_PORT: u16 = 21;

/// Literal marker in the root URI that opts into passive data connections.
pub const PASSIVE_MODE_MARKER: &str = "vfs.passive=true";

/// Whether a reply code is a positive completion (2xx).
pub fn is_positive_completion(code: u16) -> bool {
    (200..300).contains(&code)
}

// ─── Location ────────────────────────────────────────────────────────

/// Root location of an FTP file system,
/// `ftp://[user[:password]@]host[:port][/path][?query]`.
///
/// Path and userinfo are percent-decoded; the query is kept exactly as written.
#[derive(Clone, PartialEq, Eq)]
pub struct FtpLocation {
    uri: String,
    host: String,
    port: u16,
    path: String,
    username: Option<String>,
    password: Option<String>,
    query: Option<String>,
}

impl FtpLocation {
    pub fn parse(uri: &str) -> FtpResult<Self> {
        let url = Url::parse(uri)
            .map_err(|e| FtpError::invalid_location(format!("Invalid FTP URI '{}': {}", uri, e)))?;

        if url.scheme() != "ftp" {
            return Err(FtpError::invalid_location(format!(
                "Unsupported scheme '{}' in '{}'",
                url.scheme(),
                uri
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FtpError::invalid_location(format!("No host in '{}'", uri)))?
            .to_string();

        let path = match decode_component(url.path(), "path", uri)? {
            p if p.is_empty() => "/".to_string(),
            p => p,
        };
        let username = match url.username() {
            "" => None,
            u => Some(decode_component(u, "username", uri)?),
        };
        let password = url
            .password()
            .map(|p| decode_component(p, "password", uri))
            .transpose()?;

        Ok(Self {
            uri: uri.to_string(),
            host,
            port: url.port_or_known_default().unwrap_or(DEFAULT_FTP_PORT),
            path,
            username,
            password,
            query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// The URI exactly as it was given.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Remote base path (`/` when the URI has none).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Raw query string, `None` when absent or empty.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn wants_passive_mode(&self) -> bool {
        self.uri.contains(PASSIVE_MODE_MARKER)
    }
}

fn decode_component(raw: &str, what: &str, uri: &str) -> FtpResult<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| FtpError::invalid_location(format!("Invalid UTF-8 in {} of '{}'", what, uri)))
}

impl FromStr for FtpLocation {
    type Err = FtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FtpLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl fmt::Debug for FtpLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpLocation")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("query", &self.query)
            .finish()
    }
}

// ─── File-system options ─────────────────────────────────────────────

/// Transfer type (RFC 959 TYPE command).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferType {
    Ascii,
    Binary,
}

impl Default for TransferType {
    fn default() -> Self {
        Self::Binary
    }
}

/// Options of one FTP file system. Everything except the authenticator is
/// handed to the transport untouched.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpFileSystemOptions {
    /// Asked for username/password before each connect; falls back to the
    /// credentials embedded in the location.
    #[serde(skip)]
    pub authenticator: Option<Arc<dyn UserAuthenticator>>,
    /// Control-connection connect timeout in seconds.
    #[serde(default)]
    pub connect_timeout_sec: Option<u64>,
    /// Data-channel timeout in seconds.
    #[serde(default)]
    pub data_timeout_sec: Option<u64>,
    /// Socket read timeout in seconds once connected.
    #[serde(default)]
    pub so_timeout_sec: Option<u64>,
    #[serde(default)]
    pub control_encoding: Option<String>,
    #[serde(default)]
    pub transfer_type: TransferType,
    /// Treat the login directory as `/`.
    #[serde(default = "default_true")]
    pub user_dir_is_root: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FtpFileSystemOptions {
    fn default() -> Self {
        Self {
            authenticator: None,
            connect_timeout_sec: None,
            data_timeout_sec: None,
            so_timeout_sec: None,
            control_encoding: None,
            transfer_type: TransferType::Binary,
            user_dir_is_root: true,
        }
    }
}

impl FtpFileSystemOptions {
    /// Load options from their JSON form (camelCase keys).
    pub fn from_json(json: &str) -> FtpResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FtpError::invalid_config(format!("Invalid FTP options: {}", e)))
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn UserAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }
}

impl fmt::Debug for FtpFileSystemOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpFileSystemOptions")
            .field("authenticator", &self.authenticator.is_some())
            .field("connect_timeout_sec", &self.connect_timeout_sec)
            .field("data_timeout_sec", &self.data_timeout_sec)
            .field("so_timeout_sec", &self.so_timeout_sec)
            .field("control_encoding", &self.control_encoding)
            .field("transfer_type", &self.transfer_type)
            .field("user_dir_is_root", &self.user_dir_is_root)
            .finish()
    }
}

// ─── Data connection ─────────────────────────────────────────────────

/// Data-connection mode currently selected on a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DataConnectionMode {
    /// Client listens, server connects (PORT). Initial mode of a session.
    ActiveLocal,
    /// Server listens, client connects (PASV).
    PassiveLocal,
    /// Server-to-server transfer, remote side active.
    ActiveRemote,
    /// Server-to-server transfer, remote side passive.
    PassiveRemote,
}

impl Default for DataConnectionMode {
    fn default() -> Self {
        Self::ActiveLocal
    }
}

// ─── Directory Listing ───────────────────────────────────────────────

/// Type of a remote filesystem entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FtpEntryKind {
    File,
    Directory,
    Symlink,
    Unknown,
}

/// One entry from a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FtpEntry {
    pub name: String,
    pub kind: FtpEntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub permissions: Option<String>,
    pub link_target: Option<String>,
}

impl FtpEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: FtpEntryKind::File,
            size,
            modified: None,
            permissions: None,
            link_target: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FtpEntryKind::Directory,
            size: 0,
            modified: None,
            permissions: None,
            link_target: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FtpEntryKind::Directory
    }
}

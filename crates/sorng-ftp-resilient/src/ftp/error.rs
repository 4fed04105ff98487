//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// Session could not be established (TCP, DNS, login).
    ConnectionFailed,
    /// Wrong username/password.
    AuthFailed,
    /// The root URI could not be parsed.
    InvalidLocation,
    /// Options / parameter validation error.
    InvalidConfig,
    /// Server returned a 4xx/5xx for a command.
    CommandRejected,
    /// I/O failure on the control connection.
    Io,
    /// Operation timed out.
    Timeout,
    /// Server closed the connection (421, EOF).
    Disconnected,
    /// Data channel could not be established (PASV/PORT failed).
    DataChannelFailed,
    /// Server sent an un-parseable response.
    ProtocolError,
    /// Could not CWD back after a fallback listing; the session's working
    /// directory is no longer the one relative paths assume.
    DirectoryRestore,
    /// Catch-all.
    Unknown,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn invalid_location(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidLocation, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    pub fn command_rejected(code: u16, msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::CommandRejected, msg).with_code(code)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Io, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Disconnected, msg)
    }

    pub fn data_channel(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::DataChannelFailed, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    pub fn directory_restore(dir: &str) -> Self {
        Self::new(
            FtpErrorKind::DirectoryRestore,
            format!("Could not change back to working directory '{}'", dir),
        )
    }

    /// Whether this error means the session itself is suspect.
    ///
    /// Only these trigger a reconnect-and-retry. Connection failures are
    /// excluded: they already happened while (re)connecting.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            FtpErrorKind::Io
                | FtpErrorKind::Timeout
                | FtpErrorKind::Disconnected
                | FtpErrorKind::DataChannelFailed
                | FtpErrorKind::ProtocolError
        )
    }

    /// Re-categorise any failure raised while establishing a session.
    pub(crate) fn into_connection_failure(self) -> Self {
        match self.kind {
            FtpErrorKind::ConnectionFailed | FtpErrorKind::AuthFailed => self,
            _ => Self {
                kind: FtpErrorKind::ConnectionFailed,
                ..self
            },
        }
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::Disconnected,
            425 | 426 => FtpErrorKind::DataChannelFailed,
            430 | 530 => FtpErrorKind::AuthFailed,
            _ if code >= 400 => FtpErrorKind::CommandRejected,
            _ => FtpErrorKind::Unknown,
        };
        Self {
            kind,
            message: text.to_string(),
            code: Some(code),
        }
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io_error(e.to_string())
        }
    }
}

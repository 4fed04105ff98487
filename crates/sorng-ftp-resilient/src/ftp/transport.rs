//! FTP transport abstraction.
//!
//! The wrapper never speaks the wire protocol itself. A transport opens
//! authenticated sessions, and a session exposes the RFC 959 commands the
//! wrapper needs. Boolean results mirror positive/negative server replies;
//! `Err` is reserved for failures, categorised by [`FtpErrorKind`].
//!
//! [`FtpErrorKind`]: crate::ftp::error::FtpErrorKind

use crate::ftp::auth::Credentials;
use crate::ftp::error::FtpResult;
use crate::ftp::params::ProxyParams;
use crate::ftp::types::{DataConnectionMode, FtpEntry, FtpFileSystemOptions};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a transport needs to open one session.
#[derive(Debug)]
pub struct ConnectRequest<'a> {
    pub host: &'a str,
    pub port: u16,
    pub credentials: &'a Credentials,
    /// Remote base path of the file system.
    pub base_path: &'a str,
    pub options: &'a FtpFileSystemOptions,
    /// Present only when the root URI carries a query string.
    pub proxy: Option<&'a ProxyParams>,
    /// Explicit timeout overriding the transport's default.
    pub timeout: Option<Duration>,
}

/// Opens FTP sessions.
///
/// Implementations must be `Send + Sync` so one transport can serve a
/// wrapper shared across tasks.
#[async_trait::async_trait]
pub trait FtpTransport: Send + Sync {
    type Session: FtpSession;

    /// Connect and log in. The session is ready for commands on return.
    async fn connect(&self, request: ConnectRequest<'_>) -> FtpResult<Self::Session>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One connected, authenticated FTP control connection.
#[async_trait::async_trait]
pub trait FtpSession: Send {
    /// Download stream returned by RETR.
    type ReadStream: Send;
    /// Upload stream returned by STOR / APPE.
    type WriteStream: Send;

    /// Local view of the connection state. Must not talk to the server.
    fn is_connected(&self) -> bool;

    /// QUIT and close the control connection.
    async fn disconnect(&mut self) -> FtpResult<()>;

    /// LIST `path`, or the working directory when `None`. A rejected LIST is
    /// not an error: inspect [`reply_code`](Self::reply_code).
    async fn list(&mut self, path: Option<&str>) -> FtpResult<Vec<FtpEntry>>;

    /// Code of the last server reply.
    fn reply_code(&self) -> u16;

    /// Text of the last server reply.
    fn reply_string(&self) -> String;

    async fn remove_directory(&mut self, path: &str) -> FtpResult<bool>;

    async fn delete_file(&mut self, path: &str) -> FtpResult<bool>;

    async fn rename(&mut self, from: &str, to: &str) -> FtpResult<bool>;

    async fn make_directory(&mut self, path: &str) -> FtpResult<bool>;

    /// Read the completion reply of a finished stream transfer.
    async fn complete_pending_command(&mut self) -> FtpResult<bool>;

    /// RETR, preceded by REST when `restart_offset` is set.
    /// `None` when the server refuses to open the transfer.
    async fn retrieve_file_stream(
        &mut self,
        path: &str,
        restart_offset: Option<u64>,
    ) -> FtpResult<Option<Self::ReadStream>>;

    async fn append_file_stream(&mut self, path: &str) -> FtpResult<Option<Self::WriteStream>>;

    async fn store_file_stream(&mut self, path: &str) -> FtpResult<Option<Self::WriteStream>>;

    async fn print_working_directory(&mut self) -> FtpResult<String>;

    async fn change_working_directory(&mut self, path: &str) -> FtpResult<bool>;

    /// Switch to PASV for subsequent data connections. Local setting only.
    fn enter_local_passive_mode(&mut self);

    fn data_connection_mode(&self) -> DataConnectionMode;
}

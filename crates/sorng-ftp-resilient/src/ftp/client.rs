//! Resilient FTP client: owns at most one session and heals it.
//!
//! Lifecycle: `connect()` opens the first session eagerly (fail fast) →
//! operations reuse it → a transport failure drops it and the operation is
//! retried once on a fresh session → `disconnect()`/`abort()` drop it and the
//! next operation reconnects lazily.
//!
//! The session is never probed (no NOOP) to keep server round-trips down;
//! presence in the slot is the only state tracked.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::factory::SessionFactory;
use crate::ftp::transport::{FtpSession, FtpTransport};
use crate::ftp::types::*;
use futures::future::BoxFuture;
use log::{debug, warn};
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

type Session<T> = <T as FtpTransport>::Session;
type ReadStream<T> = <Session<T> as FtpSession>::ReadStream;
type WriteStream<T> = <Session<T> as FtpSession>::WriteStream;

/// FTP client that reconnects and retries once on connection loss.
pub struct ResilientFtpClient<T: FtpTransport> {
    factory: SessionFactory<T>,
    session: Mutex<Option<Session<T>>>,
}

/// Result of a plain `LIST <path>`.
enum DirectListing {
    /// 2xx reply: the entries are the listing.
    Complete(Vec<FtpEntry>),
    /// The command went through but the server answered with this code.
    Rejected(u16),
}

impl<T: FtpTransport> ResilientFtpClient<T> {
    /// Open the first session immediately; fails if that fails.
    pub async fn connect(
        transport: T,
        root: FtpLocation,
        options: FtpFileSystemOptions,
    ) -> FtpResult<Self> {
        Self::connect_with_timeout(transport, root, options, None).await
    }

    /// Like [`connect`](Self::connect) with a timeout overriding the transport's default.
    pub async fn connect_with_timeout(
        transport: T,
        root: FtpLocation,
        options: FtpFileSystemOptions,
        default_timeout: Option<Duration>,
    ) -> FtpResult<Self> {
        let client = Self {
            factory: SessionFactory::new(transport, root, options, default_timeout),
            session: Mutex::new(None),
        };
        drop(client.session().await?);
        Ok(client)
    }

    pub fn root(&self) -> &FtpLocation {
        self.factory.location()
    }

    pub fn options(&self) -> &FtpFileSystemOptions {
        self.factory.options()
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.factory.default_timeout()
    }

    // ─── Session slot ────────────────────────────────────────────

    /// Current session, connecting first if the slot is empty.
    ///
    /// Holds the slot lock while connecting so concurrent callers end up
    /// sharing one session.
    async fn session(&self) -> FtpResult<MappedMutexGuard<'_, Session<T>>> {
        let mut slot = self.session.lock().await;
        if slot.is_none() {
            *slot = Some(self.factory.create().await?);
        }
        let mut session = MutexGuard::try_map(slot, |s| s.as_mut())
            .map_err(|_| FtpError::disconnected("FTP session slot is empty"))?;

        if self.root().wants_passive_mode()
            && session.data_connection_mode() == DataConnectionMode::ActiveLocal
        {
            debug!("FTP client is entering passive mode for {}", self.root().host());
            session.enter_local_passive_mode();
        }
        Ok(session)
    }

    /// Whether a session exists and reports itself connected. Never connects.
    pub async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.is_connected())
    }

    /// Close the session. The slot is emptied even when closing fails.
    pub async fn disconnect(&self) -> FtpResult<()> {
        let taken = self.session.lock().await.take();
        match taken {
            Some(mut session) => session.disconnect().await,
            None => Ok(()),
        }
    }

    /// Drop a session presumed broken; close errors are expected and ignored.
    async fn discard_session(&self) {
        if let Err(e) = self.disconnect().await {
            warn!("FTP close of broken session to {} failed: {}", self.root().host(), e);
        }
    }

    // ─── Retry envelope ──────────────────────────────────────────

    /// Run `op` on the current session; after a transport failure reconnect
    /// and run it exactly once more.
    async fn with_retry<R, F>(&self, name: &str, mut op: F) -> FtpResult<R>
    where
        F: for<'s> FnMut(&'s mut Session<T>) -> BoxFuture<'s, FtpResult<R>>,
    {
        let first = {
            let mut session = self.session().await?;
            op(&mut *session).await
        };

        match first {
            Err(e) if e.is_transport() => {
                warn!(
                    "FTP {} on {} failed ({}); reconnecting and retrying once",
                    name,
                    self.root().host(),
                    e
                );
                self.discard_session().await;
                let mut session = self.session().await?;
                op(&mut *session).await
            }
            other => other,
        }
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// List `rel_path` (the working directory when `None`).
    ///
    /// `Ok(None)` means the directory could not be entered during the CWD
    /// fallback. A failure to CWD back afterwards is fatal.
    pub async fn list_files(&self, rel_path: Option<&str>) -> FtpResult<Option<Vec<FtpEntry>>> {
        self.with_retry("LIST", |s| {
            let rel_path = rel_path.map(str::to_string);
            Box::pin(async move { list_files_in_directory(s, rel_path.as_deref()).await })
        })
        .await
    }

    // ─── Directory / file commands ───────────────────────────────

    pub async fn remove_directory(&self, rel_path: &str) -> FtpResult<bool> {
        self.with_retry("RMD", |s| {
            let path = rel_path.to_string();
            Box::pin(async move { s.remove_directory(&path).await })
        })
        .await
    }

    pub async fn delete_file(&self, rel_path: &str) -> FtpResult<bool> {
        self.with_retry("DELE", |s| {
            let path = rel_path.to_string();
            Box::pin(async move { s.delete_file(&path).await })
        })
        .await
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> FtpResult<bool> {
        self.with_retry("RENAME", |s| {
            let (from, to) = (old_name.to_string(), new_name.to_string());
            Box::pin(async move { s.rename(&from, &to).await })
        })
        .await
    }

    pub async fn make_directory(&self, rel_path: &str) -> FtpResult<bool> {
        self.with_retry("MKD", |s| {
            let path = rel_path.to_string();
            Box::pin(async move { s.make_directory(&path).await })
        })
        .await
    }

    // ─── Streams ─────────────────────────────────────────────────

    pub async fn retrieve_file_stream(&self, rel_path: &str) -> FtpResult<Option<ReadStream<T>>> {
        self.with_retry("RETR", |s| {
            let path = rel_path.to_string();
            Box::pin(async move { s.retrieve_file_stream(&path, None).await })
        })
        .await
    }

    /// RETR resuming at `restart_offset` bytes.
    pub async fn retrieve_file_stream_from(
        &self,
        rel_path: &str,
        restart_offset: u64,
    ) -> FtpResult<Option<ReadStream<T>>> {
        self.with_retry("RETR", |s| {
            let path = rel_path.to_string();
            Box::pin(async move { s.retrieve_file_stream(&path, Some(restart_offset)).await })
        })
        .await
    }

    pub async fn append_file_stream(&self, rel_path: &str) -> FtpResult<Option<WriteStream<T>>> {
        self.with_retry("APPE", |s| {
            let path = rel_path.to_string();
            Box::pin(async move { s.append_file_stream(&path).await })
        })
        .await
    }

    pub async fn store_file_stream(&self, rel_path: &str) -> FtpResult<Option<WriteStream<T>>> {
        self.with_retry("STOR", |s| {
            let path = rel_path.to_string();
            Box::pin(async move { s.store_file_stream(&path).await })
        })
        .await
    }

    // ─── Not retried ─────────────────────────────────────────────

    /// Finish a stream transfer. Trivially `true` without a session.
    pub async fn complete_pending_command(&self) -> FtpResult<bool> {
        if self.session.lock().await.is_none() {
            return Ok(true);
        }
        self.session().await?.complete_pending_command().await
    }

    /// Cancel a transfer by dropping the connection. ABOR is unreliable
    /// across servers, so the session is simply discarded. Always `true`.
    pub async fn abort(&self) -> bool {
        if let Err(e) = self.disconnect().await {
            debug!("FTP abort: disconnect from {} failed: {}", self.root().host(), e);
        }
        true
    }

    /// Text of the last server reply.
    pub async fn reply_string(&self) -> FtpResult<String> {
        Ok(self.session().await?.reply_string())
    }
}

/// Two-tier listing: plain `LIST <path>`, then CWD + `LIST` + CWD back when
/// the server rejects the path (typically because of spaces in it).
async fn list_files_in_directory<S: FtpSession>(
    session: &mut S,
    rel_path: Option<&str>,
) -> FtpResult<Option<Vec<FtpEntry>>> {
    let code = match list_direct(session, rel_path).await? {
        DirectListing::Complete(entries) => return Ok(Some(entries)),
        DirectListing::Rejected(code) => code,
    };

    // Every listing now costs four commands.
    debug!(
        "FTP LIST {:?} rejected with {}; falling back to CWD + LIST",
        rel_path, code
    );

    let previous_dir = match rel_path {
        Some(path) => {
            let pwd = session.print_working_directory().await?;
            if !session.change_working_directory(path).await? {
                return Ok(None);
            }
            Some(pwd)
        }
        None => None,
    };

    let entries = session.list(None).await?;

    if let Some(dir) = previous_dir {
        if !session.change_working_directory(&dir).await? {
            return Err(FtpError::directory_restore(&dir));
        }
    }
    Ok(Some(entries))
}

async fn list_direct<S: FtpSession>(
    session: &mut S,
    rel_path: Option<&str>,
) -> FtpResult<DirectListing> {
    let entries = session.list(rel_path).await?;
    let code = session.reply_code();
    if is_positive_completion(code) {
        Ok(DirectListing::Complete(entries))
    } else {
        Ok(DirectListing::Rejected(code))
    }
}

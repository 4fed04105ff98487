//! In-memory FTP transport.
//!
//! Models a small server (directory tree, file contents, per-session working
//! directory, last reply) behind the [`FtpTransport`] seam, with knobs to
//! inject failures and counters to observe what the wrapper did. Useful for
//! unit tests and offline demos.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::params::ProxyParams;
use crate::ftp::transport::{ConnectRequest, FtpSession, FtpTransport};
use crate::ftp::types::{DataConnectionMode, FtpEntry};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const SIMULATED_HOME: &str = "/home";

/// Operations whose next calls can be made to fail with an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    Connect,
    Disconnect,
    List,
    PrintWorkingDirectory,
    ChangeWorkingDirectory,
    RemoveDirectory,
    DeleteFile,
    Rename,
    MakeDirectory,
    Retrieve,
    Append,
    Store,
    CompletePendingCommand,
}

/// What the last `connect` call was given.
#[derive(Debug, Clone)]
pub struct ConnectRecord {
    pub host: String,
    pub port: u16,
    pub base_path: String,
    pub username: String,
    pub password: String,
    pub proxy: Option<ProxyParams>,
    pub timeout: Option<Duration>,
}

/// Shared server state. Public fields are the knobs and counters.
#[derive(Debug, Default)]
pub struct SimulatedServer {
    /// Absolute directory path → entries.
    pub directories: HashMap<String, Vec<FtpEntry>>,
    /// Absolute file path → contents.
    pub files: HashMap<String, Vec<u8>>,
    /// Working directory of a fresh session.
    pub home: String,
    /// Answer `LIST <path>` with 550 when the path contains a space.
    pub reject_spaced_list_paths: bool,
    /// CWD targets (as sent, or resolved) answered with 550.
    pub denied_cwd: HashSet<String>,
    /// New sessions start in PASV mode.
    pub start_passive: bool,
    /// Persistent connect failure, until cleared.
    pub connect_error: Option<FtpError>,
    /// Time a connect takes before it is answered.
    pub connect_delay: Option<Duration>,
    faults: HashMap<SimOp, usize>,

    pub connect_attempts: usize,
    pub sessions_opened: usize,
    pub disconnects: usize,
    pub passive_switches: usize,
    /// Every command sent, in order (`LIST a b`, `CWD /home`, ...).
    pub commands: Vec<String>,
    pub last_connect: Option<ConnectRecord>,
}

impl SimulatedServer {
    fn take_fault(&mut self, op: SimOp) -> bool {
        match self.faults.get_mut(&op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    fn add_to_parent(&mut self, path: &str, entry: FtpEntry) {
        let (parent, _) = split_parent(path);
        if let Some(entries) = self.directories.get_mut(&parent) {
            entries.retain(|e| e.name != entry.name);
            entries.push(entry);
        }
    }

    fn remove_from_parent(&mut self, path: &str) {
        let (parent, name) = split_parent(path);
        if let Some(entries) = self.directories.get_mut(&parent) {
            entries.retain(|e| e.name != name);
        }
    }
}

/// Cloneable handle on one simulated server.
#[derive(Clone)]
pub struct SimulatedTransport {
    server: Arc<StdMutex<SimulatedServer>>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    /// A server with an empty home directory.
    pub fn new() -> Self {
        let mut server = SimulatedServer {
            home: SIMULATED_HOME.to_string(),
            ..Default::default()
        };
        server.directories.insert(SIMULATED_HOME.to_string(), Vec::new());
        Self {
            server: Arc::new(StdMutex::new(server)),
        }
    }

    /// Lock the server state for inspection or setup.
    pub fn server(&self) -> MutexGuard<'_, SimulatedServer> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or replace) a directory; `path` is relative to home unless absolute.
    pub fn add_directory(&self, path: &str, entries: Vec<FtpEntry>) {
        let mut server = self.server();
        let abs = resolve(&server.home.clone(), path);
        server.add_to_parent(&abs, FtpEntry::directory(split_parent(&abs).1));
        server.directories.insert(abs, entries);
    }

    pub fn add_file(&self, path: &str, contents: &[u8]) {
        let mut server = self.server();
        let abs = resolve(&server.home.clone(), path);
        server.add_to_parent(&abs, FtpEntry::file(split_parent(&abs).1, contents.len() as u64));
        server.files.insert(abs, contents.to_vec());
    }

    /// Fail the next `times` calls of `op` with an I/O error.
    pub fn fail_next(&self, op: SimOp, times: usize) {
        *self.server().faults.entry(op).or_insert(0) += times;
    }

    /// Fail every connect attempt with `err` until [`allow_connections`](Self::allow_connections).
    pub fn fail_connect_with(&self, err: FtpError) {
        self.server().connect_error = Some(err);
    }

    pub fn allow_connections(&self) {
        self.server().connect_error = None;
    }

    pub fn reject_spaced_list_paths(&self, reject: bool) {
        self.server().reject_spaced_list_paths = reject;
    }

    pub fn deny_cwd(&self, target: &str) {
        self.server().denied_cwd.insert(target.to_string());
    }

    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.server().connect_delay = delay;
    }

    pub fn start_sessions_passive(&self, passive: bool) {
        self.server().start_passive = passive;
    }

    pub fn commands(&self) -> Vec<String> {
        self.server().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.server().commands.clear();
    }

    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        let server = self.server();
        server.files.get(&resolve(&server.home, path)).cloned()
    }
}

#[async_trait::async_trait]
impl FtpTransport for SimulatedTransport {
    type Session = SimulatedSession;

    async fn connect(&self, request: ConnectRequest<'_>) -> FtpResult<SimulatedSession> {
        let delay = self.server().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut server = self.server();
        server.connect_attempts += 1;
        server.last_connect = Some(ConnectRecord {
            host: request.host.to_string(),
            port: request.port,
            base_path: request.base_path.to_string(),
            username: request.credentials.username().to_string(),
            password: request.credentials.password().to_string(),
            proxy: request.proxy.cloned(),
            timeout: request.timeout,
        });

        if let Some(err) = server.connect_error.clone() {
            return Err(err);
        }
        if server.take_fault(SimOp::Connect) {
            return Err(FtpError::io_error("simulated: connection refused"));
        }

        server.sessions_opened += 1;
        let mode = if server.start_passive {
            DataConnectionMode::PassiveLocal
        } else {
            DataConnectionMode::ActiveLocal
        };
        Ok(SimulatedSession {
            server: Arc::clone(&self.server),
            id: server.sessions_opened,
            cwd: server.home.clone(),
            mode,
            connected: true,
            reply: (230, "230 User logged in".to_string()),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct SimulatedSession {
    server: Arc<StdMutex<SimulatedServer>>,
    id: usize,
    cwd: String,
    mode: DataConnectionMode,
    connected: bool,
    reply: (u16, String),
}

impl SimulatedSession {
    /// 1-based serial of this session on its server.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Log `command`, then apply any injected fault for `op`.
    fn begin(&mut self, op: SimOp, command: String) -> FtpResult<MutexGuard<'_, SimulatedServer>> {
        let mut server = self.server.lock().unwrap_or_else(PoisonError::into_inner);
        server.commands.push(command);
        if !self.connected {
            return Err(FtpError::disconnected("simulated: session is closed"));
        }
        if server.take_fault(op) {
            self.connected = false;
            return Err(FtpError::io_error("simulated: connection reset"));
        }
        Ok(server)
    }

    fn set_reply(&mut self, code: u16, text: &str) {
        self.reply = (code, format!("{} {}", code, text));
    }
}

#[async_trait::async_trait]
impl FtpSession for SimulatedSession {
    type ReadStream = Cursor<Vec<u8>>;
    type WriteStream = SimulatedUpload;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> FtpResult<()> {
        let mut server = self.server.lock().unwrap_or_else(PoisonError::into_inner);
        server.commands.push("QUIT".to_string());
        server.disconnects += 1;
        self.connected = false;
        if server.take_fault(SimOp::Disconnect) {
            return Err(FtpError::io_error("simulated: QUIT failed"));
        }
        Ok(())
    }

    async fn list(&mut self, path: Option<&str>) -> FtpResult<Vec<FtpEntry>> {
        let command = match path {
            Some(p) => format!("LIST {}", p),
            None => "LIST".to_string(),
        };
        let cwd = self.cwd.clone();
        let server = self.begin(SimOp::List, command)?;
        let rejected = path.is_some_and(|p| p.contains(' ') && server.reject_spaced_list_paths);
        let listing = if rejected {
            None
        } else {
            let dir = path.map_or_else(|| cwd.clone(), |p| resolve(&cwd, p));
            server.directories.get(&dir).cloned()
        };
        drop(server);

        match listing {
            Some(entries) => {
                self.set_reply(226, "Transfer complete");
                Ok(entries)
            }
            None => {
                self.set_reply(550, "No such file or directory");
                Ok(Vec::new())
            }
        }
    }

    fn reply_code(&self) -> u16 {
        self.reply.0
    }

    fn reply_string(&self) -> String {
        self.reply.1.clone()
    }

    async fn remove_directory(&mut self, path: &str) -> FtpResult<bool> {
        let abs = resolve(&self.cwd, path);
        let mut server = self.begin(SimOp::RemoveDirectory, format!("RMD {}", path))?;
        let removable = server.directories.get(&abs).is_some_and(|e| e.is_empty());
        if removable {
            server.directories.remove(&abs);
            server.remove_from_parent(&abs);
        }
        drop(server);
        self.reply_bool(removable, 250, "Directory removed")
    }

    async fn delete_file(&mut self, path: &str) -> FtpResult<bool> {
        let abs = resolve(&self.cwd, path);
        let mut server = self.begin(SimOp::DeleteFile, format!("DELE {}", path))?;
        let deleted = server.files.remove(&abs).is_some();
        if deleted {
            server.remove_from_parent(&abs);
        }
        drop(server);
        self.reply_bool(deleted, 250, "File deleted")
    }

    async fn rename(&mut self, from: &str, to: &str) -> FtpResult<bool> {
        let (src, dst) = (resolve(&self.cwd, from), resolve(&self.cwd, to));
        let mut server = self.begin(SimOp::Rename, format!("RNFR {}", from))?;
        server.commands.push(format!("RNTO {}", to));
        let renamed = if let Some(data) = server.files.remove(&src) {
            server.remove_from_parent(&src);
            server.add_to_parent(&dst, FtpEntry::file(split_parent(&dst).1, data.len() as u64));
            server.files.insert(dst, data);
            true
        } else if let Some(entries) = server.directories.remove(&src) {
            server.remove_from_parent(&src);
            server.add_to_parent(&dst, FtpEntry::directory(split_parent(&dst).1));
            server.directories.insert(dst, entries);
            true
        } else {
            false
        };
        drop(server);
        self.reply_bool(renamed, 250, "Rename successful")
    }

    async fn make_directory(&mut self, path: &str) -> FtpResult<bool> {
        let abs = resolve(&self.cwd, path);
        let mut server = self.begin(SimOp::MakeDirectory, format!("MKD {}", path))?;
        let created = !server.directories.contains_key(&abs) && !server.files.contains_key(&abs);
        if created {
            server.add_to_parent(&abs, FtpEntry::directory(split_parent(&abs).1));
            server.directories.insert(abs, Vec::new());
        }
        drop(server);
        self.reply_bool(created, 257, "Directory created")
    }

    async fn complete_pending_command(&mut self) -> FtpResult<bool> {
        let server = self.begin(SimOp::CompletePendingCommand, "(pending reply)".to_string())?;
        drop(server);
        self.set_reply(226, "Transfer complete");
        Ok(true)
    }

    async fn retrieve_file_stream(
        &mut self,
        path: &str,
        restart_offset: Option<u64>,
    ) -> FtpResult<Option<Cursor<Vec<u8>>>> {
        let abs = resolve(&self.cwd, path);
        if let Some(offset) = restart_offset {
            self.server
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .commands
                .push(format!("REST {}", offset));
        }
        let server = self.begin(SimOp::Retrieve, format!("RETR {}", path))?;
        let data = server.files.get(&abs).map(|bytes| {
            let start = restart_offset.map_or(0, |o| (o as usize).min(bytes.len()));
            bytes[start..].to_vec()
        });
        drop(server);

        match data {
            Some(bytes) => {
                self.set_reply(150, "Opening BINARY mode data connection");
                Ok(Some(Cursor::new(bytes)))
            }
            None => {
                self.set_reply(550, "No such file or directory");
                Ok(None)
            }
        }
    }

    async fn append_file_stream(&mut self, path: &str) -> FtpResult<Option<SimulatedUpload>> {
        self.open_upload(SimOp::Append, "APPE", path, true)
    }

    async fn store_file_stream(&mut self, path: &str) -> FtpResult<Option<SimulatedUpload>> {
        self.open_upload(SimOp::Store, "STOR", path, false)
    }

    async fn print_working_directory(&mut self) -> FtpResult<String> {
        let server = self.begin(SimOp::PrintWorkingDirectory, "PWD".to_string())?;
        drop(server);
        let cwd = self.cwd.clone();
        self.set_reply(257, &format!("\"{}\" is the current directory", cwd));
        Ok(cwd)
    }

    async fn change_working_directory(&mut self, path: &str) -> FtpResult<bool> {
        let abs = resolve(&self.cwd, path);
        let server = self.begin(SimOp::ChangeWorkingDirectory, format!("CWD {}", path))?;
        let allowed = !server.denied_cwd.contains(path)
            && !server.denied_cwd.contains(&abs)
            && server.directories.contains_key(&abs);
        drop(server);
        if allowed {
            self.cwd = abs;
        }
        self.reply_bool(allowed, 250, "Directory successfully changed")
    }

    fn enter_local_passive_mode(&mut self) {
        self.server
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .passive_switches += 1;
        self.mode = DataConnectionMode::PassiveLocal;
    }

    fn data_connection_mode(&self) -> DataConnectionMode {
        self.mode
    }
}

impl SimulatedSession {
    fn reply_bool(&mut self, ok: bool, code: u16, text: &str) -> FtpResult<bool> {
        if ok {
            self.set_reply(code, text);
        } else {
            self.set_reply(550, "Requested action not taken");
        }
        Ok(ok)
    }

    fn open_upload(
        &mut self,
        op: SimOp,
        verb: &str,
        path: &str,
        append: bool,
    ) -> FtpResult<Option<SimulatedUpload>> {
        let abs = resolve(&self.cwd, path);
        let server = self.begin(op, format!("{} {}", verb, path))?;
        let (parent, _) = split_parent(&abs);
        let writable = server.directories.contains_key(&parent);
        drop(server);

        if !writable {
            self.set_reply(553, "Could not create file");
            return Ok(None);
        }
        self.set_reply(150, "Ok to send data");
        Ok(Some(SimulatedUpload {
            server: Arc::clone(&self.server),
            path: abs,
            append,
            buffer: Vec::new(),
        }))
    }
}

/// Upload opened by STOR/APPE; contents land on the server on [`finish`](Self::finish).
#[derive(Debug)]
pub struct SimulatedUpload {
    server: Arc<StdMutex<SimulatedServer>>,
    path: String,
    append: bool,
    buffer: Vec<u8>,
}

impl SimulatedUpload {
    /// Absolute path being written.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn write(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn finish(self) {
        let mut server = self.server.lock().unwrap_or_else(PoisonError::into_inner);
        let mut contents = if self.append {
            server.files.get(&self.path).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };
        contents.extend_from_slice(&self.buffer);
        server.add_to_parent(
            &self.path,
            FtpEntry::file(split_parent(&self.path).1, contents.len() as u64),
        );
        server.files.insert(self.path, contents);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else if cwd.ends_with('/') {
        format!("{}{}", cwd, path)
    } else {
        format!("{}/{}", cwd, path)
    };
    match joined.trim_end_matches('/') {
        "" => "/".to_string(),
        p => p.to_string(),
    }
}

/// `/a/b c` → (`/a`, `b c`).
fn split_parent(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => ("/".to_string(), path.to_string()),
    }
}

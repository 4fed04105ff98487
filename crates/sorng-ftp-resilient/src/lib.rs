//! # sorng-ftp-resilient: Self-healing FTP session wrapper
//!
//! Sits between the virtual-filesystem layer and an FTP client and keeps
//! transient connection loss away from its callers:
//! - **Lazy connect**: at most one live session, created on demand and
//!   replaced after a failure
//! - **Single retry**: every remote operation is retried exactly once on a
//!   fresh session after a transport failure
//! - **Passive mode**: opt-in via `vfs.passive=true` in the root URI
//! - **LIST fallback**: CWD into the directory and list it when the server
//!   rejects `LIST <path>` (e.g. paths containing spaces)
//!
//! The FTP wire protocol itself is supplied through the
//! [`ftp::FtpTransport`] / [`ftp::FtpSession`] traits.

pub mod ftp;

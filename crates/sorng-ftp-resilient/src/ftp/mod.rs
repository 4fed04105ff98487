//! # FTP session wrapper
//!
//! Architecture:
//! - `types`: location, file-system options, entries, data-connection mode
//! - `error`: FTP-specific error type and retry classification
//! - `params`: query-string parsing and proxy parameters
//! - `auth`: user authenticator seam and credential resolution
//! - `transport`: the `FtpTransport` / `FtpSession` traits the wrapper drives
//! - `factory`: builds one connected, authenticated session
//! - `client`: `ResilientFtpClient` with its session slot, retry envelope, LIST fallback
//! - `simulated`: in-memory transport with fault injection (tests & demos)

pub mod types;
pub mod error;
pub mod params;
pub mod auth;
pub mod transport;
pub mod factory;
pub mod client;
pub mod simulated;

pub use types::*;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use params::{parse_query_params, ProxyParams};
pub use auth::{AuthField, AuthenticationData, Credentials, StaticUserAuthenticator, UserAuthenticator};
pub use transport::{ConnectRequest, FtpSession, FtpTransport};
pub use factory::SessionFactory;
pub use client::ResilientFtpClient;
pub use simulated::{SimOp, SimulatedTransport};

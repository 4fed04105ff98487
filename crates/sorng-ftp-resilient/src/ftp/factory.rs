//! Session factory: turns a location plus options into one connected,
//! authenticated session.

use crate::ftp::auth::resolve_credentials;
use crate::ftp::error::FtpResult;
use crate::ftp::params::ProxyParams;
use crate::ftp::transport::{ConnectRequest, FtpTransport};
use crate::ftp::types::{FtpFileSystemOptions, FtpLocation};
use log::{info, warn};
use std::time::Duration;

pub struct SessionFactory<T: FtpTransport> {
    transport: T,
    location: FtpLocation,
    options: FtpFileSystemOptions,
    default_timeout: Option<Duration>,
}

impl<T: FtpTransport> SessionFactory<T> {
    pub fn new(
        transport: T,
        location: FtpLocation,
        options: FtpFileSystemOptions,
        default_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            location,
            options,
            default_timeout,
        }
    }

    pub fn location(&self) -> &FtpLocation {
        &self.location
    }

    pub fn options(&self) -> &FtpFileSystemOptions {
        &self.options
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open a new session.
    ///
    /// Every failure is reported as a connection failure; callers must not
    /// retry it as a transport error.
    pub async fn create(&self) -> FtpResult<T::Session> {
        let loc = &self.location;
        let credentials = resolve_credentials(&self.options, loc);
        let proxy = loc.query().map(ProxyParams::from_query);

        info!(
            "FTP connecting to {}:{} as {}{}",
            loc.host(),
            loc.port(),
            credentials.username(),
            if proxy.is_some() { " (with URI parameters)" } else { "" }
        );

        let request = ConnectRequest {
            host: loc.host(),
            port: loc.port(),
            credentials: &credentials,
            base_path: loc.path(),
            options: &self.options,
            proxy: proxy.as_ref(),
            timeout: self.default_timeout,
        };

        let result = self.transport.connect(request).await;
        drop(credentials);

        result.map_err(|e| {
            warn!("FTP connect to {}:{} failed: {}", loc.host(), loc.port(), e);
            e.into_connection_failure()
        })
    }
}

//! Credential resolution for new sessions.
//!
//! An optional [`UserAuthenticator`] is asked first; whatever it does not
//! answer is taken from the location, and whatever is still missing falls back
//! to anonymous login. All credential material is wiped when dropped.

use crate::ftp::types::{FtpFileSystemOptions, FtpLocation};
use std::fmt;
use zeroize::Zeroizing;

pub const ANONYMOUS: &str = "anonymous";

/// Fields the FTP provider asks an authenticator for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthField {
    Username,
    Password,
}

pub const FTP_AUTH_FIELDS: &[AuthField] = &[AuthField::Username, AuthField::Password];

/// Answer of a [`UserAuthenticator`]; any field may be left unanswered.
#[derive(Default)]
pub struct AuthenticationData {
    pub username: Option<Zeroizing<String>>,
    pub password: Option<Zeroizing<String>>,
}

impl AuthenticationData {
    pub fn get(&self, field: AuthField) -> Option<&str> {
        match field {
            AuthField::Username => self.username.as_deref().map(String::as_str),
            AuthField::Password => self.password.as_deref().map(String::as_str),
        }
    }
}

/// Supplies credentials at connect time.
pub trait UserAuthenticator: Send + Sync {
    fn request_authentication(&self, fields: &[AuthField]) -> Option<AuthenticationData>;
}

/// Always answers with the same username/password.
pub struct StaticUserAuthenticator {
    username: Option<Zeroizing<String>>,
    password: Option<Zeroizing<String>>,
}

impl StaticUserAuthenticator {
    pub fn new(username: Option<&str>, password: Option<&str>) -> Self {
        Self {
            username: username.map(|u| Zeroizing::new(u.to_string())),
            password: password.map(|p| Zeroizing::new(p.to_string())),
        }
    }
}

impl UserAuthenticator for StaticUserAuthenticator {
    fn request_authentication(&self, fields: &[AuthField]) -> Option<AuthenticationData> {
        let mut data = AuthenticationData::default();
        for field in fields {
            match field {
                AuthField::Username => data.username = self.username.clone(),
                AuthField::Password => data.password = self.password.clone(),
            }
        }
        Some(data)
    }
}

/// Resolved login for one connect attempt.
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: Zeroizing::new(username.to_string()),
            password: Zeroizing::new(password.to_string()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.as_str() == ANONYMOUS
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("password", &"***")
            .finish()
    }
}

pub fn resolve_credentials(options: &FtpFileSystemOptions, location: &FtpLocation) -> Credentials {
    let auth_data = options
        .authenticator
        .as_ref()
        .and_then(|a| a.request_authentication(FTP_AUTH_FIELDS));

    let pick = |field: AuthField, embedded: Option<&str>| -> Zeroizing<String> {
        let value = auth_data
            .as_ref()
            .and_then(|d| d.get(field))
            .or(embedded)
            .unwrap_or(ANONYMOUS);
        Zeroizing::new(value.to_string())
    };

    let credentials = Credentials {
        username: pick(AuthField::Username, location.username()),
        password: pick(AuthField::Password, location.password()),
    };
    drop(auth_data);
    credentials
}

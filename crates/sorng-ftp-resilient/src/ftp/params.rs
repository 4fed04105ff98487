//! Query-string parameters of the root URI.
//!
//! Only proxy and timeout settings are read from the query; values reach the
//! transport verbatim.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PARAM_PROXY_HOST: &str = "proxyHost";
pub const PARAM_PROXY_PORT: &str = "proxyPort";
pub const PARAM_PROXY_USERNAME: &str = "proxyUsername";
pub const PARAM_PROXY_PASSWORD: &str = "proxyPassword";
pub const PARAM_TIMEOUT: &str = "timeout";
pub const PARAM_RETRY_COUNT: &str = "retryCount";

/// Split `a=1&b=2` into a map.
///
/// Tokens without a value are dropped, `a=1=2` keeps `1`, and a repeated
/// key keeps its last value. Nothing is decoded.
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for token in query.split('&') {
        let mut parts: Vec<&str> = token.split('=').collect();
        while parts.last().is_some_and(|p| p.is_empty()) {
            parts.pop();
        }
        if parts.len() >= 2 {
            params.insert(parts[0].to_string(), parts[1].to_string());
        }
    }
    params
}

/// Proxy settings handed to the transport's connect routine.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyParams {
    pub host: Option<String>,
    pub port: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<String>,
    pub retry_count: Option<String>,
}

impl ProxyParams {
    pub fn from_query_params(params: &HashMap<String, String>) -> Self {
        let get = |key: &str| params.get(key).cloned();
        Self {
            host: get(PARAM_PROXY_HOST),
            port: get(PARAM_PROXY_PORT),
            username: get(PARAM_PROXY_USERNAME),
            password: get(PARAM_PROXY_PASSWORD),
            timeout: get(PARAM_TIMEOUT),
            retry_count: get(PARAM_RETRY_COUNT),
        }
    }

    pub fn from_query(query: &str) -> Self {
        Self::from_query_params(&parse_query_params(query))
    }
}

impl std::fmt::Debug for ProxyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_tokens_without_value() {
        let params = parse_query_params("proxyHost=X&proxyPort=Y&bad");
        assert_eq!(params.len(), 2);
        assert_eq!(params["proxyHost"], "X");
        assert_eq!(params["proxyPort"], "Y");
        assert!(!params.contains_key("bad"));
    }

    #[test]
    fn test_last_duplicate_wins() {
        let params = parse_query_params("timeout=10&timeout=30");
        assert_eq!(params["timeout"], "30");
    }

    #[test]
    fn test_values_are_verbatim() {
        let params = parse_query_params("proxyPassword=p%40ss&proxyUsername=a+b");
        assert_eq!(params["proxyPassword"], "p%40ss");
        assert_eq!(params["proxyUsername"], "a+b");
    }

    #[test]
    fn test_extra_equals_and_empty_values() {
        let params = parse_query_params("a=1=2&b=&c==3&&=d");
        assert_eq!(params["a"], "1");
        assert!(!params.contains_key("b"));
        assert_eq!(params["c"], "");
        assert_eq!(params[""], "d");
    }

    #[test]
    fn test_empty_query() {
        assert!(parse_query_params("").is_empty());
    }

    #[test]
    fn test_proxy_params_from_query() {
        let proxy = ProxyParams::from_query(
            "proxyHost=proxy.local&proxyPort=3128&timeout=20&retryCount=2&vfs.passive=true",
        );
        assert_eq!(proxy.host.as_deref(), Some("proxy.local"));
        assert_eq!(proxy.port.as_deref(), Some("3128"));
        assert_eq!(proxy.timeout.as_deref(), Some("20"));
        assert_eq!(proxy.retry_count.as_deref(), Some("2"));
        assert!(proxy.username.is_none());
        assert!(proxy.password.is_none());
    }

    #[test]
    fn test_proxy_debug_hides_password() {
        let proxy = ProxyParams::from_query("proxyUsername=u&proxyPassword=hunter2");
        assert!(!format!("{:?}", proxy).contains("hunter2"));
    }
}

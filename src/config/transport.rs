//! Transport variant configuration.
//!
//! One config struct per transport variant, plus a tagged enum for
//! selecting the variant from configuration files or the environment.

use std::path::PathBuf;

use serde::Deserialize;

use super::error::ValidationError;

/// Transport variant selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Own TLS-terminating server.
    Direct(DirectTransportConfig),
    /// Plain socket on an environment-supplied port, TLS terminated upstream.
    EnvPort(EnvPortTransportConfig),
    /// No socket; requests arrive from a trusted reverse proxy.
    ReverseProxy(ReverseProxyTransportConfig),
    /// No server; a router is mounted into a host application.
    Middleware(MiddlewareTransportConfig),
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Direct(c) => c.validate(),
            Self::EnvPort(c) => c.validate(),
            Self::ReverseProxy(c) => c.validate(),
            Self::Middleware(c) => c.validate(),
        }
    }
}

/// Configuration for the TLS-terminating direct transport.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectTransportConfig {
    /// Externally reachable hostname.
    pub host: String,

    /// Port to bind and advertise.
    #[serde(default = "default_tls_port")]
    pub port: u16,

    /// PEM-encoded certificate chain.
    pub cert_path: PathBuf,

    /// PEM-encoded private key.
    pub key_path: PathBuf,

    /// Path prefix the listener is mounted under.
    #[serde(default)]
    pub path_prefix: String,
}

impl DirectTransportConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::MissingHostname);
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Configuration for the environment-port transport.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvPortTransportConfig {
    /// Externally reachable hostname (the TLS-terminating proxy's).
    pub host: String,

    /// Environment variable holding the port to bind.
    #[serde(default = "default_port_variable")]
    pub variable: String,

    /// Path prefix the listener is mounted under.
    #[serde(default)]
    pub path_prefix: String,
}

impl EnvPortTransportConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::MissingHostname);
        }
        Ok(())
    }
}

/// Configuration for the reverse-proxy transport.
#[derive(Debug, Clone, Deserialize)]
pub struct ReverseProxyTransportConfig {
    /// Externally reachable hostname served by the proxy.
    pub host: String,

    /// When set, only requests whose `x-forwarded-host` names this host
    /// are accepted; requests that bypassed the proxy are rejected.
    #[serde(default = "default_require_forwarded")]
    pub require_forwarded_host: bool,

    /// Path prefix the proxy forwards, as seen by this process.
    #[serde(default)]
    pub path_prefix: String,
}

impl ReverseProxyTransportConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::MissingHostname);
        }
        Ok(())
    }
}

/// Configuration for the middleware transport.
#[derive(Debug, Clone, Deserialize)]
pub struct MiddlewareTransportConfig {
    /// Externally reachable hostname of the host application.
    pub host: String,

    /// Path prefix the host application mounts the router at.
    #[serde(default)]
    pub path_prefix: String,
}

impl MiddlewareTransportConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::MissingHostname);
        }
        Ok(())
    }
}

fn default_tls_port() -> u16 {
    443
}

fn default_port_variable() -> String {
    "PORT".to_string()
}

fn default_require_forwarded() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_selection_from_tagged_value() {
        let config: TransportConfig = serde_json::from_value(serde_json::json!({
            "kind": "env_port",
            "host": "hooks.example.com",
        }))
        .unwrap();
        match config {
            TransportConfig::EnvPort(c) => {
                assert_eq!(c.variable, "PORT");
                assert_eq!(c.host, "hooks.example.com");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn direct_requires_host_and_port() {
        let config = DirectTransportConfig {
            host: String::new(),
            port: 443,
            cert_path: "/tmp/cert.pem".into(),
            key_path: "/tmp/key.pem".into(),
            path_prefix: String::new(),
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingHostname)
        ));
    }
}

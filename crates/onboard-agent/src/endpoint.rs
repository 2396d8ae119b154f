//! The controller endpoint, read from the one-line server file.

use std::fmt;
use std::path::Path;
use thiserror::Error;

const DEFAULT_PORT: u16 = 443;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("failed to read server file {}: {source}", .path.display())]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("server file is empty")]
    Empty,

    #[error("invalid port in {0:?}")]
    InvalidPort(String),

    #[error("invalid host in {0:?}")]
    InvalidHost(String),
}

/// Host and port of the controller. The host doubles as the TLS server name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    host: String,
    port: u16,
}

impl ServerEndpoint {
    /// Parses `host`, `host:port`, `[v6]` or `[v6]:port`.
    pub fn parse(text: &str) -> Result<Self, EndpointError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EndpointError::Empty);
        }

        let (host, port) = if let Some(rest) = text.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| EndpointError::InvalidHost(text.to_string()))?;
            let port = match after {
                "" => None,
                p => Some(
                    p.strip_prefix(':')
                        .ok_or_else(|| EndpointError::InvalidPort(text.to_string()))?,
                ),
            };
            (host, port)
        } else {
            match text.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (text, None),
            }
        };

        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(EndpointError::InvalidHost(text.to_string()));
        }
        let port = match port {
            None => DEFAULT_PORT,
            Some(p) => p
                .parse()
                .map_err(|_| EndpointError::InvalidPort(text.to_string()))?,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Reads the first non-blank line of the server file.
    pub fn load(path: &Path) -> Result<Self, EndpointError> {
        let text = std::fs::read_to_string(path).map_err(|source| EndpointError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let line = text
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or_default();
        let endpoint = Self::parse(line)?;
        tracing::info!(server = %endpoint, "loaded controller endpoint");
        Ok(endpoint)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// HTTPS URL of `path` on this controller.
    pub fn url(&self, path: &str) -> String {
        format!("https://{self}{path}")
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

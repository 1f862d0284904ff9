//! Cache connectivity probe.
//!
//! The gateway never talks to the cache itself; `/health` only reports
//! whether a TCP connection to it can be opened.

use std::time::Duration;

use tokio::net::TcpStream;
use url::Url;

use crate::config::CacheConfig;

const DEFAULT_PORT: u16 = 6379;

#[derive(Debug, Clone)]
pub struct CacheProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl CacheProbe {
    pub fn from_config(config: &CacheConfig) -> Result<Self, url::ParseError> {
        let url = Url::parse(&config.url)?;
        let host = url
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub async fn is_connected(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(address = %self.address(), error = %e, "Cache unreachable");
                false
            }
            Err(_) => {
                tracing::debug!(address = %self.address(), "Cache probe timed out");
                false
            }
        }
    }
}

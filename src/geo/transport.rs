//! HTTP transport seam. The engine only sees `Transport::fetch`.

use super::types::TransportError;
use std::error::Error as _;
use std::io::{self, Read};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on a single response body.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

const USER_AGENT: &str = concat!("ipinformer/", env!("CARGO_PKG_VERSION"));

/// Performs one plain GET and hands back the raw body.
///
/// Implementations are called from the blocking thread pool, one call per
/// provider, possibly concurrently.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// Blocking HTTP transport with a mandatory timeout.
pub struct HttpTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirects(0)
            .build();
        Self { agent, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => TransportError::Status(code),
            ureq::Error::Transport(t) => classify(&t),
        })?;

        // Redirects are not followed, so a 3xx arrives here as Ok.
        let status = response.status();
        if !(200..=299).contains(&status) {
            return Err(TransportError::Status(status));
        }

        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut body)
            .map_err(|e| {
                if is_timeout(&e) {
                    TransportError::Timeout
                } else {
                    TransportError::Body(e.to_string())
                }
            })?;
        Ok(body)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn classify(t: &ureq::Transport) -> TransportError {
    let timed_out = t
        .source()
        .and_then(|s| s.downcast_ref::<io::Error>())
        .is_some_and(is_timeout);
    if timed_out {
        TransportError::Timeout
    } else {
        TransportError::Network(t.to_string())
    }
}

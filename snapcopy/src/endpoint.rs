use std::{fmt, net::SocketAddr, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Address of a remote file service.
///
/// The port is range-checked on construction, so an `Endpoint` can't hold
/// a port outside of `0..=65535`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    address: String,
    port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u32) -> crate::Result<Self> {
        let address = address.into();
        if address.is_empty() {
            return Err(Error::InvalidEndpoint("empty address".into()));
        }
        let port = u16::try_from(port)
            .map_err(|_| Error::InvalidEndpoint(format!("port {port} is out of range")))?;
        Ok(Self { address, port })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to the first socket address of the endpoint.
    pub async fn resolve(&self) -> crate::Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.address.as_str(), self.port))
            .await
            .map_err(|err| Error::InvalidEndpoint(format!("{self}: {err}")))?;
        addrs
            .next()
            .ok_or_else(|| Error::InvalidEndpoint(format!("{self} resolves to no address")))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(value: SocketAddr) -> Self {
        Self {
            address: value.ip().to_string(),
            port: value.port(),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidEndpoint(format!("expected host:port, got {s:?}")))?;
        let address = address
            .strip_prefix('[')
            .and_then(|a| a.strip_suffix(']'))
            .unwrap_or(address);
        let port: u32 = port
            .parse()
            .map_err(|_| Error::InvalidEndpoint(format!("invalid port in {s:?}")))?;
        Self::new(address, port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

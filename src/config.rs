//! Client configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! timeout_ms = 3000
//! datagram = false
//! privileged_port = false
//! portmap_port = 111
//! # mount_port = 20048
//! # nfs_port = 2049
//! readdir_dircount = 8192
//! readdir_maxcount = 32768
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::protocol::xdr::portmap::PMAP_PORT;
use crate::transport::DialOptions;
use crate::Result;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on connection setup and on each call, in milliseconds.
    pub timeout_ms: u64,
    /// Talk UDP instead of TCP.
    pub datagram: bool,
    /// Originate connections from a reserved port (665..=1023).
    pub privileged_port: bool,
    /// Port of the portmapper on the server.
    pub portmap_port: u16,
    /// Skip portmapper resolution of the MOUNT service.
    pub mount_port: Option<u16>,
    /// Skip portmapper resolution of the NFS service.
    pub nfs_port: Option<u16>,
    /// Override the READ size the server prefers.
    pub read_size: Option<u32>,
    /// Override the WRITE size the server prefers.
    pub write_size: Option<u32>,
    /// READDIRPLUS `dircount`: bytes of names and cookies per page.
    pub readdir_dircount: u32,
    /// READDIRPLUS `maxcount`: bytes of the whole reply per page.
    pub readdir_maxcount: u32,
    /// Machine name for AUTH_UNIX credentials built by the client.
    pub machine_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            datagram: false,
            privileged_port: false,
            portmap_port: PMAP_PORT,
            mount_port: None,
            nfs_port: None,
            read_size: None,
            write_size: None,
            readdir_dircount: 8192,
            readdir_maxcount: 32768,
            machine_name: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_datagram(mut self, datagram: bool) -> Self {
        self.datagram = datagram;
        self
    }

    pub fn dial_options(&self) -> DialOptions {
        DialOptions {
            datagram: self.datagram,
            timeout: self.timeout(),
            privileged_port: self.privileged_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert!(!config.datagram);
        assert!(!config.privileged_port);
        assert_eq!(config.portmap_port, 111);
        assert_eq!(config.readdir_dircount, 8192);
        assert_eq!(config.readdir_maxcount, 32768);
        assert!(config.mount_port.is_none());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = ClientConfig::from_toml_str(
            "timeout_ms = 500\ndatagram = true\nnfs_port = 2049\nmachine_name = \"box\"\n",
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert!(config.datagram);
        assert_eq!(config.nfs_port, Some(2049));
        assert_eq!(config.machine_name.as_deref(), Some("box"));
        assert_eq!(config.portmap_port, 111);
    }

    #[test]
    fn test_bad_document() {
        let err = ClientConfig::from_toml_str("timeout_ms = \"soon\"").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }
}

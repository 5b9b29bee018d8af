//! Entry point of the client: talks to the MOUNT service of a host and turns
//! an export path into a [`Target`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use tracing_attributes::instrument;

use crate::config::ClientConfig;
use crate::handle::FileHandle;
use crate::protocol::nfs::{mount as mountproc, portmap};
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::mount;
use crate::protocol::xdr::nfs3;
use crate::protocol::xdr::rpc::auth_stat;
use crate::target::Target;
use crate::{Error, Result, RpcError};

/// One entry of the server's export list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Export {
    pub dir: String,
    /// Hosts or netgroups allowed to mount `dir`; empty means everyone.
    pub groups: Vec<String>,
}

/// A connection to the MOUNT service of one host.
#[derive(Debug)]
pub struct MountClient {
    client: RpcClient,
    host: String,
    config: ClientConfig,
}

impl MountClient {
    /// Finds the MOUNT service through the host's portmapper and connects to it.
    pub async fn dial_mount(host: &str, use_datagram: bool, timeout: Duration) -> Result<Self> {
        let config = ClientConfig::default().with_datagram(use_datagram).with_timeout(timeout);
        Self::dial_with_config(host, &config).await
    }

    #[instrument(skip(config))]
    pub async fn dial_with_config(host: &str, config: &ClientConfig) -> Result<Self> {
        let opts = config.dial_options();
        let port = match config.mount_port {
            Some(port) => port,
            None => {
                portmap::resolve_port(
                    host,
                    config.portmap_port,
                    mount::PROGRAM,
                    mount::VERSION,
                    &opts,
                )
                .await?
            }
        };
        debug!(host, port, "MOUNT service located");
        let client = RpcClient::dial_with(host, port, &opts).await?;
        Ok(MountClient { client, host: host.to_string(), config: config.clone() })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The connection to the MOUNT service.
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub async fn null(&self) -> Result<()> {
        mountproc::mountproc3_null(&self.client).await
    }

    pub async fn list_exports(&self, auth: &Auth) -> Result<Vec<Export>> {
        let nodes = mountproc::mountproc3_export(&self.client, auth).await?;
        Ok(nodes
            .into_iter()
            .map(|node| Export {
                dir: String::from_utf8_lossy(&node.ex_dir).into_owned(),
                groups: node
                    .ex_groups
                    .0
                    .iter()
                    .map(|g| String::from_utf8_lossy(g).into_owned())
                    .collect(),
            })
            .collect())
    }

    /// Mounts `path`, connecting to the NFS service over the given transport.
    pub async fn mount(
        &self,
        path: &str,
        auth: &Auth,
        use_datagram: bool,
        timeout: Duration,
    ) -> Result<Target> {
        let config = self.config.clone().with_datagram(use_datagram).with_timeout(timeout);
        self.mount_with_config(path, auth, &config).await
    }

    /// Mounts `path`: obtains the root handle, checks the credential against
    /// the flavors the server accepts, connects to the NFS service and sizes
    /// transfers from FSINFO. The returned target owns its NFS connection.
    #[instrument(skip(self, auth, config), fields(host = %self.host))]
    pub async fn mount_with_config(
        &self,
        path: &str,
        auth: &Auth,
        config: &ClientConfig,
    ) -> Result<Target> {
        let res = mountproc::mountproc3_mnt(&self.client, auth, path).await?;
        check_flavor(auth, &res.auth_flavors)?;
        let root = FileHandle::new(&res.fhandle)?;

        let opts = config.dial_options();
        let port = match config.nfs_port {
            Some(port) => port,
            None => {
                portmap::resolve_port(
                    &self.host,
                    config.portmap_port,
                    nfs3::PROGRAM,
                    nfs3::VERSION,
                    &opts,
                )
                .await?
            }
        };
        let client = Arc::new(RpcClient::dial_with(&self.host, port, &opts).await?);
        match Target::establish(client.clone(), root, auth.clone(), config, true).await {
            Ok(target) => {
                info!(path, port, "mounted");
                Ok(target)
            }
            Err(e) => {
                // Nothing else holds the connection yet.
                let _ = client.close().await;
                Err(e)
            }
        }
    }

    /// Tells the server `path` is no longer mounted by this client.
    pub async fn unmount(&self, path: &str, auth: &Auth) -> Result<()> {
        mountproc::mountproc3_umnt(&self.client, auth, path).await
    }

    /// Closes the MOUNT connection. Targets already mounted keep working.
    pub async fn close(&self) -> Result<()> {
        self.client.close().await
    }
}

/// An empty flavor list means the server accepts any flavor.
fn check_flavor(auth: &Auth, flavors: &[u32]) -> Result<()> {
    let flavor = auth.flavor() as u32;
    if flavors.is_empty() || flavors.contains(&flavor) {
        return Ok(());
    }
    debug!(?flavor, ?flavors, "credential flavor not accepted by export");
    Err(Error::Rpc(RpcError::AuthError(auth_stat::AUTH_TOOWEAK)))
}
